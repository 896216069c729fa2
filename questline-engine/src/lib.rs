//! Questline Progression Engine
//!
//! Platform-agnostic streak, milestone and day-boundary logic for the Questline
//! habit tracker. Persistence and time are injected through [`ProgressStore`]
//! and [`Clock`]; this crate performs no I/O of its own.

pub mod chronos;
pub mod clock;
pub mod completion;
pub mod config;
pub mod constants;
pub mod history;
pub mod ledger;
pub mod milestones;
pub mod model;
pub mod numbers;
pub mod progression;
pub mod store;
pub mod streak;

// Re-export commonly used types
pub use chronos::{
    ChronosManager, DawnSummary, DayChangeOutcome, ResetError, ResetPhase, ResetReport,
    migration_for,
};
pub use clock::{Clock, FixedClock, SystemClock, previous_day};
pub use completion::{
    ChecklistItem, CompletionTracker, PathOverview, ProgressionError, QuestCompletion,
    ToggleOutcome,
};
pub use config::{ConfigError, EngineConfig};
pub use history::{TrendPoint, average_task_rate, completion_trend};
pub use ledger::{DailyProgressEntry, DailyProgressLedger, ProgressStatus, ProgressUpsert};
pub use milestones::{MilestoneCatalog, MilestoneConfig, MilestoneTable, RewardBundle};
pub use model::{
    Checklist, CustomRewards, DailyEarnings, DailyRecord, PathDailyStat, PathInstance, PathTask,
    ProfileUpdate, Quest, QuestCompletionStamp, QuestStatus, QuestUpdate, Subtask, UserProfile,
    Wallet,
};
pub use progression::{
    AggregatedRewards, DailyCompletion, LevelUpOutcome, LevelUpRejection, ProgressionService,
    ProgressionViolation, WillAward, XpGauge, aggregate_rewards,
};
pub use store::{MemoryStore, ProgressStore, StoreError, StoreSnapshot};
pub use streak::{
    IncrementOutcome, StreakEngine, StreakHistoryEntry, StreakState, StreakVisualState,
    VisualStage,
};

/// Trait for abstracting configuration loading
/// Platform-specific implementations should provide this
pub trait ConfigLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load engine tuning knobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error>;

    /// Load the milestone catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or is invalid.
    fn load_catalog(&self) -> Result<MilestoneCatalog, Self::Error>;

    /// Load both documents and check that every catalog table defines each
    /// level up to the configured `max_level`.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or the catalog's coverage violation.
    fn load_all(&self) -> Result<(EngineConfig, MilestoneCatalog), anyhow::Error> {
        let config = self.load_engine_config()?;
        let catalog = self.load_catalog()?;
        catalog.validate_levels(config.max_level)?;
        Ok((config, catalog))
    }
}

/// Loader serving the defaults and the catalog embedded in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticConfig;

impl ConfigLoader for StaticConfig {
    type Error = std::convert::Infallible;

    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
        Ok(EngineConfig::default())
    }

    fn load_catalog(&self) -> Result<MilestoneCatalog, Self::Error> {
        Ok(MilestoneCatalog::standard().clone())
    }
}

/// Main engine binding a store and clock to one configuration
pub struct QuestlineEngine<S, C>
where
    S: ProgressStore,
    C: Clock,
{
    store: S,
    clock: C,
    config: EngineConfig,
    catalog: MilestoneCatalog,
}

impl<S, C> QuestlineEngine<S, C>
where
    S: ProgressStore,
    C: Clock,
{
    /// Create an engine with explicit configuration
    pub const fn new(store: S, clock: C, config: EngineConfig, catalog: MilestoneCatalog) -> Self {
        Self {
            store,
            clock,
            config,
            catalog,
        }
    }

    /// Create an engine from whatever `loader` provides
    ///
    /// # Errors
    ///
    /// Returns an error if either document cannot be loaded or the catalog
    /// stops short of the configured `max_level`.
    pub fn load<L: ConfigLoader>(loader: &L, store: S, clock: C) -> Result<Self, anyhow::Error> {
        let (config, catalog) = loader.load_all()?;
        Ok(Self::new(store, clock, config, catalog))
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn catalog(&self) -> &MilestoneCatalog {
        &self.catalog
    }

    /// Intra-day operations against this engine's store.
    pub const fn tracker(&self) -> CompletionTracker<'_, S, C> {
        CompletionTracker::new(&self.store, &self.clock, &self.catalog, &self.config)
    }

    /// Day-change reconciler for `user_id`. Keep one per session so the
    /// latch and dawn summary persist across checks.
    pub fn chronos(&self, user_id: &str) -> ChronosManager<'_, S, &C> {
        ChronosManager::new(
            &self.store,
            &self.clock,
            user_id,
            &self.catalog,
            &self.config,
        )
    }

    /// Completion trend over the user's retained records
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be read.
    pub fn history(&self, user_id: &str) -> Result<Vec<TrendPoint>, anyhow::Error> {
        let records = self.store.list_daily_records(user_id)?;
        Ok(completion_trend(&records))
    }

    /// Streak engine for `archetype` under this engine's configuration.
    pub fn streak_engine(&self, archetype: &str) -> StreakEngine<'_> {
        StreakEngine::for_archetype(&self.catalog, archetype, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::convert::Infallible;

    struct TightLoader;

    impl ConfigLoader for TightLoader {
        type Error = Infallible;

        fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
            Ok(EngineConfig {
                max_total_will: 0.15,
                ..EngineConfig::default()
            })
        }

        fn load_catalog(&self) -> Result<MilestoneCatalog, Self::Error> {
            Ok(MilestoneCatalog::standard().clone())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    /// Serves a catalog that stops at level 3.
    struct ShortLoader {
        max_level: u32,
    }

    impl ConfigLoader for ShortLoader {
        type Error = ConfigError;

        fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
            Ok(EngineConfig {
                max_level: self.max_level,
                ..EngineConfig::default()
            })
        }

        fn load_catalog(&self) -> Result<MilestoneCatalog, Self::Error> {
            let mut catalog = MilestoneCatalog::standard().clone();
            for table in catalog.archetypes.values_mut() {
                table.levels.retain(|cfg| cfg.level <= 3);
            }
            catalog.validate()?;
            Ok(catalog)
        }
    }

    #[test]
    fn engine_runs_a_day_end_to_end() {
        let store = MemoryStore::new();
        store.insert_profile(UserProfile::new("u1")).unwrap();
        store.put_path(
            PathInstance::new("p1", "u1", "Read")
                .with_task("t1", "Chapter")
                .with_streak(StreakState::at(1, 1)),
        );
        let engine = QuestlineEngine::load(&StaticConfig, store, FixedClock::new(day(1))).unwrap();

        let mut chronos = engine.chronos("u1");
        assert!(matches!(
            chronos.check_day_change(),
            DayChangeOutcome::WatermarkInitialized { .. }
        ));
        let toggled = engine
            .tracker()
            .toggle_item("u1", "p1", &ChecklistItem::Task("t1".into()), true)
            .unwrap();
        assert!(toggled.streak_incremented());

        engine.clock().advance_days(1);
        let DayChangeOutcome::Reset(report) = chronos.check_day_change() else {
            panic!("expected a reset");
        };
        assert_eq!(report.streaks_maintained, vec!["p1".to_string()]);
        assert_eq!(engine.store().get_path("p1").unwrap().unwrap().current_streak(), 2);

        let history = engine.history("u1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task_rate, 100);
    }

    #[test]
    fn loader_config_flows_into_streak_engine() {
        let engine =
            QuestlineEngine::load(&TightLoader, MemoryStore::new(), FixedClock::new(day(2)))
                .unwrap();
        let streaks = engine.streak_engine("unknown-archetype");
        assert!((streaks.enforce_will_cap(0.1, 0.3) - 0.05).abs() < 1e-9);
        assert_eq!(streaks.milestone_days(1), 3);
    }

    #[test]
    fn catalog_must_cover_the_configured_max_level() {
        let engine = QuestlineEngine::load(
            &ShortLoader { max_level: 3 },
            MemoryStore::new(),
            FixedClock::new(day(3)),
        )
        .unwrap();
        assert_eq!(engine.config().max_level, 3);

        let err = ShortLoader { max_level: 4 }.load_all().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingLevel { level: 4, .. })
        ));
    }
}
