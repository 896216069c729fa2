//! Engine-wide tuning loaded from JSON, with validated defaults.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DAILY_RECORD_RETENTION, MAX_LEVEL, MAX_TOTAL_WILL, MIN_LEVEL};

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("max_level must be between {min} and {max} (got {value})")]
    LevelBounds { min: u32, max: u32, value: u32 },
    #[error("milestone table `{archetype}` is missing level {level}")]
    MissingLevel { archetype: String, level: u32 },
    #[error("milestone table `{archetype}` level {level} has a zero-day threshold")]
    ZeroThreshold { archetype: String, level: u32 },
    #[error("milestone table `{archetype}` level {level} grants negative will ({will_gain:.2})")]
    NegativeWill {
        archetype: String,
        level: u32,
        will_gain: f64,
    },
    #[error("default archetype `{0}` is not present in the catalog")]
    UnknownDefaultArchetype(String),
    #[error("sub-milestone day must be positive")]
    ZeroSubMilestoneDay,
}

/// Tuning knobs for the reset and progression engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on a path's cumulative Will.
    #[serde(default = "EngineConfig::default_max_total_will")]
    pub max_total_will: f64,
    /// Highest reachable path level.
    #[serde(default = "EngineConfig::default_max_level")]
    pub max_level: u32,
    /// Number of daily records retained per user.
    #[serde(default = "EngineConfig::default_record_retention")]
    pub record_retention: usize,
    /// Keep optimistic in-memory progression when a store write fails.
    #[serde(default)]
    pub tolerate_write_failure: bool,
}

impl EngineConfig {
    const fn default_max_total_will() -> f64 {
        MAX_TOTAL_WILL
    }

    const fn default_max_level() -> u32 {
        MAX_LEVEL
    }

    const fn default_record_retention() -> usize {
        DAILY_RECORD_RETENTION
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a bound is violated.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_total_will.is_finite() || self.max_total_will < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "max_total_will",
                min: 0.0,
                value: self.max_total_will,
            });
        }
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&self.max_level) {
            return Err(ConfigError::LevelBounds {
                min: MIN_LEVEL,
                max: MAX_LEVEL,
                value: self.max_level,
            });
        }
        if self.record_retention == 0 {
            return Err(ConfigError::MinViolation {
                field: "record_retention",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_total_will: Self::default_max_total_will(),
            max_level: Self::default_max_level(),
            record_retention: Self::default_record_retention(),
            tolerate_write_failure: false,
        }
    }
}
