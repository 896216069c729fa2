//! Streak state machine: increments, milestones, sub-milestones, Will accounting,
//! prestige, and the visual stage classifier.
//!
//! Every transition takes a [`StreakState`] by reference and returns a new
//! value; inputs are never mutated and no I/O happens here.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EngineConfig;
use crate::constants::{
    ADVANCED_STAGE_MIN_LEVEL, DEFAULT_ARCHETYPE, EMBER_MAX_STREAK, MAX_LEVEL, MAX_TOTAL_WILL,
    MIN_LEVEL, SINGULARITY_WINDOW_DAYS,
};
use crate::milestones::{MilestoneCatalog, MilestoneTable, RewardBundle, SubMilestoneRule};
use crate::numbers::{floor_to_hundredths, rounded_percentage};

/// Archived summary of one completed level, appended on prestige.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakHistoryEntry {
    pub level: u32,
    pub max_streak: u32,
    pub completed_at: DateTime<Utc>,
    pub will_earned: f64,
}

/// Streak progression owned by a single path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive fully-completed days at the current level.
    pub current_streak: u32,
    /// High-water mark since the last prestige.
    pub max_streak: u32,
    pub current_level: u32,
    /// Cumulative Will; survives prestige.
    pub total_will_earned: f64,
    #[serde(default)]
    pub streak_history: Vec<StreakHistoryEntry>,
}

impl Default for StreakState {
    fn default() -> Self {
        Self {
            current_streak: 0,
            max_streak: 0,
            current_level: MIN_LEVEL,
            total_will_earned: 0.0,
            streak_history: Vec::new(),
        }
    }
}

impl StreakState {
    /// Fresh state at `level` with the given streak; used by fixtures and imports.
    #[must_use]
    pub fn at(level: u32, current_streak: u32) -> Self {
        Self {
            current_streak,
            max_streak: current_streak,
            current_level: level,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_will(mut self, total_will_earned: f64) -> Self {
        self.total_will_earned = total_will_earned;
        self
    }
}

/// Sub-milestone bonus actually granted on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMilestoneGrant {
    pub coins: i64,
    pub stars: i64,
}

/// Result of a single streak increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementOutcome {
    pub state: StreakState,
    pub milestone_reached: bool,
    pub sub_milestone_reached: bool,
    /// Main-milestone bundle, present only when `milestone_reached`.
    pub rewards: Option<RewardBundle>,
    /// Sub-milestone bonus, present only when `sub_milestone_reached`.
    pub sub_rewards: Option<SubMilestoneGrant>,
    /// Will actually credited this tick, after cap enforcement.
    pub will_gain: f64,
}

/// Flame progression shown next to a path's streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStage {
    Ember,
    Flame,
    Singularity,
    Explosion,
}

impl VisualStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ember => "ember",
            Self::Flame => "flame",
            Self::Singularity => "singularity",
            Self::Explosion => "explosion",
        }
    }
}

impl fmt::Display for VisualStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived presentation state for a streak at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakVisualState {
    pub stage: VisualStage,
    pub days_until_milestone: u32,
    pub progress_percent: u8,
    pub is_sub_milestone_day: bool,
}

/// Pure streak transitions bound to one milestone table and its limits.
#[derive(Debug, Clone, Copy)]
pub struct StreakEngine<'a> {
    table: &'a MilestoneTable,
    sub_milestone: &'a SubMilestoneRule,
    max_total_will: f64,
    max_level: u32,
}

impl<'a> StreakEngine<'a> {
    #[must_use]
    pub const fn new(
        table: &'a MilestoneTable,
        sub_milestone: &'a SubMilestoneRule,
        config: &EngineConfig,
    ) -> Self {
        Self {
            table,
            sub_milestone,
            max_total_will: config.max_total_will,
            max_level: config.max_level,
        }
    }

    /// Engine for `archetype` from `catalog`.
    #[must_use]
    pub fn for_archetype(
        catalog: &'a MilestoneCatalog,
        archetype: &str,
        config: &EngineConfig,
    ) -> Self {
        Self::new(catalog.table_for(archetype), &catalog.sub_milestone, config)
    }

    #[must_use]
    pub const fn max_total_will(&self) -> f64 {
        self.max_total_will
    }

    #[must_use]
    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    #[must_use]
    pub const fn table(&self) -> &'a MilestoneTable {
        self.table
    }

    #[must_use]
    pub fn milestone_days(&self, level: u32) -> u32 {
        self.table.milestone_days(level)
    }

    #[must_use]
    pub fn has_reached_milestone(&self, streak: u32, level: u32) -> bool {
        streak >= self.milestone_days(level)
    }

    /// Whether `streak` earns the sub-milestone bonus at `level`. Never true on
    /// the day the main milestone lands.
    #[must_use]
    pub fn is_sub_milestone_day(&self, streak: u32, level: u32) -> bool {
        self.sub_milestone.is_bonus_day(streak, level) && streak != self.milestone_days(level)
    }

    /// Will that may actually be credited on top of `current_total`.
    #[must_use]
    pub fn enforce_will_cap(&self, current_total: f64, proposed_gain: f64) -> f64 {
        if !proposed_gain.is_finite() || !current_total.is_finite() {
            return 0.0;
        }
        let headroom = (self.max_total_will - current_total).max(0.0);
        floor_to_hundredths(proposed_gain.clamp(0.0, headroom))
    }

    /// Count one more fully-completed day.
    #[must_use]
    pub fn increment_streak(&self, state: &StreakState) -> IncrementOutcome {
        let level = state.current_level;
        let new_streak = state.current_streak.saturating_add(1);
        let mut running_will = state.total_will_earned;
        let mut will_gain = 0.0;

        let sub_milestone_reached = self.is_sub_milestone_day(new_streak, level);
        let sub_rewards = if sub_milestone_reached {
            let reward = self.sub_milestone.reward;
            let granted = self.enforce_will_cap(running_will, reward.will_gain);
            running_will = floor_to_hundredths(running_will + granted);
            will_gain += granted;
            log::debug!(
                "{}: day {new_streak} level {level} will +{granted:.2}",
                crate::constants::LOG_SUB_MILESTONE
            );
            Some(SubMilestoneGrant {
                coins: reward.coins,
                stars: reward.stars,
            })
        } else {
            None
        };

        let threshold = self.milestone_days(level);
        let milestone_reached = state.current_streak < threshold && threshold <= new_streak;
        let rewards = if milestone_reached {
            let granted = self.enforce_will_cap(running_will, self.table.will_gain(level));
            running_will = floor_to_hundredths(running_will + granted);
            will_gain += granted;
            log::debug!(
                "{}: level {level} reached at day {new_streak}, will +{granted:.2}",
                crate::constants::LOG_MILESTONE
            );
            Some(
                self.table
                    .config(level)
                    .map(|cfg| cfg.rewards.clone())
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        IncrementOutcome {
            state: StreakState {
                current_streak: new_streak,
                max_streak: state.max_streak.max(new_streak),
                current_level: level,
                total_will_earned: running_will.min(self.max_total_will),
                streak_history: state.streak_history.clone(),
            },
            milestone_reached,
            sub_milestone_reached,
            rewards,
            sub_rewards,
            will_gain: floor_to_hundredths(will_gain),
        }
    }

    /// Archive the current level and advance to the next one.
    ///
    /// Callers must have verified [`Self::has_reached_milestone`] first. The
    /// level saturates at the configured maximum.
    #[must_use]
    pub fn handle_prestige_reset(&self, state: &StreakState, now: DateTime<Utc>) -> StreakState {
        let mut streak_history = state.streak_history.clone();
        streak_history.push(StreakHistoryEntry {
            level: state.current_level,
            max_streak: state.max_streak,
            completed_at: now,
            will_earned: self.table.will_gain(state.current_level),
        });
        StreakState {
            current_streak: 0,
            max_streak: 0,
            current_level: state
                .current_level
                .saturating_add(1)
                .min(self.max_level.max(MIN_LEVEL)),
            total_will_earned: state.total_will_earned,
            streak_history,
        }
    }

    /// Break the streak after a missed day; the high-water mark is kept.
    #[must_use]
    pub fn reset_streak(&self, state: &StreakState) -> StreakState {
        StreakState {
            current_streak: 0,
            ..state.clone()
        }
    }

    /// Classify `streak` at `level` for display.
    #[must_use]
    pub fn streak_visual_state(&self, streak: u32, level: u32) -> StreakVisualState {
        let threshold = self.milestone_days(level);
        let advanced = level >= ADVANCED_STAGE_MIN_LEVEL;
        let stage = if streak >= threshold {
            if advanced {
                VisualStage::Explosion
            } else {
                VisualStage::Flame
            }
        } else if streak <= EMBER_MAX_STREAK {
            VisualStage::Ember
        } else if threshold - streak <= SINGULARITY_WINDOW_DAYS && advanced {
            VisualStage::Singularity
        } else {
            VisualStage::Flame
        };

        StreakVisualState {
            stage,
            days_until_milestone: threshold.saturating_sub(streak),
            progress_percent: rounded_percentage(streak, threshold),
            is_sub_milestone_day: self.is_sub_milestone_day(streak, level),
        }
    }
}

impl StreakEngine<'static> {
    /// Engine over the embedded catalog's default archetype and default limits.
    #[must_use]
    pub fn standard() -> Self {
        let catalog = MilestoneCatalog::standard();
        Self {
            table: catalog.table_for(DEFAULT_ARCHETYPE),
            sub_milestone: &catalog.sub_milestone,
            max_total_will: MAX_TOTAL_WILL,
            max_level: MAX_LEVEL,
        }
    }
}
