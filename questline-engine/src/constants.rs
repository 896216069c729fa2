//! Centralized progression constants for Questline engine logic.
//!
//! These values are the defaults behind [`crate::config::EngineConfig`].
//! Reward tables live in the milestone catalog asset instead.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_RESET_START: &str = "log.reset.start";
pub(crate) const LOG_RESET_PATH: &str = "log.reset.path";
pub(crate) const LOG_RESET_PATH_FAILED: &str = "log.reset.path-failed";
pub(crate) const LOG_RESET_RECORD_FAILED: &str = "log.reset.record-failed";
pub(crate) const LOG_RECORD_KEPT: &str = "log.reset.record-kept";
pub(crate) const LOG_RECORD_PRUNED: &str = "log.reset.record-pruned";
pub(crate) const LOG_RESET_QUEST_FAILED: &str = "log.reset.quest-failed";
pub(crate) const LOG_RESET_WATERMARK_FAILED: &str = "log.reset.watermark-failed";
pub(crate) const LOG_RESET_DONE: &str = "log.reset.done";
pub(crate) const LOG_WATERMARK_INIT: &str = "log.watermark.init";
pub(crate) const LOG_STREAK_INCREMENT: &str = "log.streak.increment";
pub(crate) const LOG_MILESTONE: &str = "log.streak.milestone";
pub(crate) const LOG_SUB_MILESTONE: &str = "log.streak.sub-milestone";
pub(crate) const LOG_PRESTIGE: &str = "log.streak.prestige";
pub(crate) const LOG_WRITE_TOLERATED: &str = "log.store.write-tolerated";

// Progression bounds -------------------------------------------------------
pub const MAX_TOTAL_WILL: f64 = 5.0;
pub const MIN_LEVEL: u32 = 1;
pub const MAX_LEVEL: u32 = 10;

// Sub-milestone rule -------------------------------------------------------
pub(crate) const SUB_MILESTONE_FIRST_DAY: u32 = 7;
pub(crate) const SUB_MILESTONE_FIRST_LEVEL: u32 = 4;
pub(crate) const SUB_MILESTONE_SECOND_DAY: u32 = 14;
pub(crate) const SUB_MILESTONE_SECOND_LEVEL: u32 = 7;
pub(crate) const SUB_MILESTONE_COINS: i64 = 25;
pub(crate) const SUB_MILESTONE_STARS: i64 = 1;
pub(crate) const SUB_MILESTONE_WILL: f64 = 0.1;

// Visual stages ------------------------------------------------------------
pub(crate) const EMBER_MAX_STREAK: u32 = 2;
pub(crate) const SINGULARITY_WINDOW_DAYS: u32 = 2;
pub(crate) const ADVANCED_STAGE_MIN_LEVEL: u32 = 4;

// History ------------------------------------------------------------------
pub const DAILY_RECORD_RETENTION: usize = 30;
pub const COMPLETE_PERCENTAGE: u8 = 100;

// Archetypes ---------------------------------------------------------------
pub const DEFAULT_ARCHETYPE: &str = "default";
