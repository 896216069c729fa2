//! Milestone tables: per-level streak thresholds, reward bundles, and Will grants.
//!
//! The catalog ships as a JSON asset keyed by path archetype. Thresholds
//! follow `2 * level + 1` by convention, but the table is authoritative:
//! reward tuples are tuned per level and cannot be derived from a formula.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::config::ConfigError;
use crate::constants::{
    DEFAULT_ARCHETYPE, MIN_LEVEL, SUB_MILESTONE_COINS, SUB_MILESTONE_FIRST_DAY,
    SUB_MILESTONE_FIRST_LEVEL, SUB_MILESTONE_SECOND_DAY, SUB_MILESTONE_SECOND_LEVEL,
    SUB_MILESTONE_STARS, SUB_MILESTONE_WILL,
};

static STANDARD_CATALOG: OnceLock<MilestoneCatalog> = OnceLock::new();

/// Coins, stars, and an optional ticket granted by a main milestone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBundle {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub stars: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
}

impl RewardBundle {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins == 0 && self.stars == 0 && self.ticket.is_none()
    }
}

/// Configuration for a single progression level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneConfig {
    pub level: u32,
    pub milestone_days: u32,
    #[serde(default)]
    pub rewards: RewardBundle,
    #[serde(default)]
    pub will_gain: f64,
}

/// Per-level milestone configuration for one archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneTable {
    pub levels: Vec<MilestoneConfig>,
}

impl MilestoneTable {
    /// Configuration for `level`, if the table defines it.
    #[must_use]
    pub fn config(&self, level: u32) -> Option<&MilestoneConfig> {
        self.levels.iter().find(|cfg| cfg.level == level)
    }

    /// Streak threshold for `level`. Levels missing from the table fall back
    /// to the documented `2 * level + 1` convention.
    #[must_use]
    pub fn milestone_days(&self, level: u32) -> u32 {
        self.config(level).map_or_else(
            || level.saturating_mul(2).saturating_add(1),
            |cfg| cfg.milestone_days,
        )
    }

    /// Will grant for completing `level`'s milestone.
    #[must_use]
    pub fn will_gain(&self, level: u32) -> f64 {
        self.config(level).map_or(0.0, |cfg| cfg.will_gain)
    }

    /// Every level from [`MIN_LEVEL`] through `max_level` must be present, and
    /// every defined level must carry a usable threshold and Will grant.
    fn validate(&self, archetype: &str, max_level: u32) -> Result<(), ConfigError> {
        if let Some(level) = (MIN_LEVEL..=max_level).find(|&level| self.config(level).is_none()) {
            return Err(ConfigError::MissingLevel {
                archetype: archetype.to_string(),
                level,
            });
        }
        for cfg in &self.levels {
            let level = cfg.level;
            if cfg.milestone_days == 0 {
                return Err(ConfigError::ZeroThreshold {
                    archetype: archetype.to_string(),
                    level,
                });
            }
            if !cfg.will_gain.is_finite() || cfg.will_gain < 0.0 {
                return Err(ConfigError::NegativeWill {
                    archetype: archetype.to_string(),
                    level,
                    will_gain: cfg.will_gain,
                });
            }
        }
        Ok(())
    }
}

/// A streak day that grants the sub-milestone bonus from `min_level` upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMilestoneDay {
    pub day: u32,
    pub min_level: u32,
}

/// Fixed bonus granted on a sub-milestone day, independent of level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubMilestoneReward {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub stars: i64,
    #[serde(default)]
    pub will_gain: f64,
}

/// Mid-streak bonus rule shared by every archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMilestoneRule {
    pub days: SmallVec<[SubMilestoneDay; 2]>,
    pub reward: SubMilestoneReward,
}

impl SubMilestoneRule {
    /// Whether `streak` is a bonus day at `level`. Does not consider whether
    /// the main milestone lands on the same day.
    #[must_use]
    pub fn is_bonus_day(&self, streak: u32, level: u32) -> bool {
        self.days
            .iter()
            .any(|rule| rule.day == streak && level >= rule.min_level)
    }
}

impl Default for SubMilestoneRule {
    fn default() -> Self {
        let mut days = SmallVec::new();
        days.push(SubMilestoneDay {
            day: SUB_MILESTONE_FIRST_DAY,
            min_level: SUB_MILESTONE_FIRST_LEVEL,
        });
        days.push(SubMilestoneDay {
            day: SUB_MILESTONE_SECOND_DAY,
            min_level: SUB_MILESTONE_SECOND_LEVEL,
        });
        Self {
            days,
            reward: SubMilestoneReward {
                coins: SUB_MILESTONE_COINS,
                stars: SUB_MILESTONE_STARS,
                will_gain: SUB_MILESTONE_WILL,
            },
        }
    }
}

/// Milestone tables for every path archetype plus the shared sub-milestone rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneCatalog {
    #[serde(default = "MilestoneCatalog::default_archetype_name")]
    pub default_archetype: String,
    #[serde(default)]
    pub sub_milestone: SubMilestoneRule,
    pub archetypes: BTreeMap<String, MilestoneTable>,
}

impl MilestoneCatalog {
    fn default_archetype_name() -> String {
        DEFAULT_ARCHETYPE.to_string()
    }

    /// Parse and validate a catalog from JSON. Level coverage beyond
    /// [`MIN_LEVEL`] depends on the engine configuration and is checked by
    /// [`MilestoneCatalog::validate_levels`].
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any table is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate every table and the sub-milestone rule.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_levels(MIN_LEVEL)
    }

    /// Validate the catalog and require every table to define each level up
    /// to `max_level`, normally [`EngineConfig::max_level`](crate::EngineConfig).
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate_levels(&self, max_level: u32) -> Result<(), ConfigError> {
        if !self.archetypes.contains_key(&self.default_archetype) {
            return Err(ConfigError::UnknownDefaultArchetype(
                self.default_archetype.clone(),
            ));
        }
        for (name, table) in &self.archetypes {
            table.validate(name, max_level)?;
        }
        if self.sub_milestone.days.iter().any(|rule| rule.day == 0) {
            return Err(ConfigError::ZeroSubMilestoneDay);
        }
        Ok(())
    }

    /// The catalog embedded in the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded asset is malformed, which the test suite guards.
    #[must_use]
    pub fn standard() -> &'static Self {
        STANDARD_CATALOG.get_or_init(Self::load_from_static)
    }

    fn load_from_static() -> Self {
        Self::from_json(include_str!("../assets/milestones.json"))
            .unwrap_or_else(|err| panic!("embedded milestone catalog is invalid: {err}"))
    }

    /// Table for `archetype`, falling back to the default archetype.
    #[must_use]
    pub fn table_for(&self, archetype: &str) -> &MilestoneTable {
        self.archetypes
            .get(archetype)
            .or_else(|| self.archetypes.get(&self.default_archetype))
            .or_else(|| self.archetypes.values().next())
            .unwrap_or_else(|| &Self::standard().archetypes[DEFAULT_ARCHETYPE])
    }

    /// Archetype names in the catalog.
    pub fn archetype_names(&self) -> impl Iterator<Item = &str> {
        self.archetypes.keys().map(String::as_str)
    }
}
