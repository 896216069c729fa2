//! Day-boundary reconciliation.
//!
//! [`ChronosManager`] compares the clock's calendar day with the profile's
//! `last_reset_date` watermark. On a change it decides every active path's
//! streak from yesterday's ledger entry, snapshots yesterday into a
//! [`DailyRecord`], clears checklists, migrates quests, and advances the
//! watermark. Failures after the profile and path list are loaded are
//! collected into the [`ResetReport`] rather than aborting the run.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::clock::{Clock, previous_day};
use crate::config::EngineConfig;
use crate::constants::{
    LOG_RECORD_KEPT, LOG_RECORD_PRUNED, LOG_RESET_DONE, LOG_RESET_PATH, LOG_RESET_PATH_FAILED,
    LOG_RESET_QUEST_FAILED, LOG_RESET_RECORD_FAILED, LOG_RESET_START, LOG_RESET_WATERMARK_FAILED,
    LOG_WATERMARK_INIT,
};
use crate::ledger::DailyProgressLedger;
use crate::milestones::MilestoneCatalog;
use crate::model::{
    Checklist, DailyEarnings, DailyRecord, PathDailyStat, PathInstance, ProfileUpdate, Quest,
    QuestStatus, QuestUpdate, UserProfile,
};
use crate::numbers::len_to_u32;
use crate::store::ProgressStore;
use crate::streak::StreakEngine;

/// A failure observed during a reset.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResetError {
    #[error("no profile for user `{user_id}`")]
    MissingProfile { user_id: String },
    #[error("failed to load {what}: {message}")]
    Load { what: &'static str, message: String },
    #[error("failed to read ledger for path `{path_id}`: {message}")]
    LedgerRead { path_id: String, message: String },
    #[error("failed to persist streak for path `{path_id}`: {message}")]
    PathPersist { path_id: String, message: String },
    #[error("failed to clear checklist for path `{path_id}`: {message}")]
    ChecklistClear { path_id: String, message: String },
    #[error("failed to read daily record for {date}: {message}")]
    RecordRead { date: NaiveDate, message: String },
    #[error("failed to save daily record for {date}: {message}")]
    RecordPersist { date: NaiveDate, message: String },
    #[error("failed to prune daily records: {message}")]
    RecordPrune { message: String },
    #[error("failed to load quests: {message}")]
    QuestLoad { message: String },
    #[error("failed to migrate quest `{quest_id}`: {message}")]
    QuestMigration { quest_id: String, message: String },
    #[error("failed to advance watermark to {date}: {message}")]
    WatermarkPersist { date: NaiveDate, message: String },
}

impl ResetError {
    /// Fatal errors abort the reset before any write.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingProfile { .. } | Self::Load { .. })
    }
}

/// Outcome of one reset run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// True once the watermark advanced, even if `errors` is non-empty.
    pub success: bool,
    pub forced: bool,
    pub date: NaiveDate,
    pub paths_processed: u32,
    pub quests_processed: u32,
    /// Ids of paths whose streak was broken.
    pub streaks_reset: Vec<String>,
    /// Ids of paths whose streak was kept.
    pub streaks_maintained: Vec<String>,
    pub daily_record: Option<DailyRecord>,
    pub errors: Vec<ResetError>,
}

impl ResetReport {
    fn empty(date: NaiveDate, forced: bool) -> Self {
        Self {
            success: false,
            forced,
            date,
            paths_processed: 0,
            quests_processed: 0,
            streaks_reset: Vec::new(),
            streaks_maintained: Vec::new(),
            daily_record: None,
            errors: Vec::new(),
        }
    }

    fn fatal(date: NaiveDate, forced: bool, error: ResetError) -> Self {
        let mut report = Self::empty(date, forced);
        report.errors.push(error);
        report
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.errors.iter().any(ResetError::is_fatal)
    }
}

/// Result of a day-change check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayChangeOutcome {
    /// This session already checked today.
    Latched,
    /// The watermark already equals today.
    UpToDate,
    /// First run for the profile; the watermark was set without a reset.
    WatermarkInitialized {
        date: NaiveDate,
        error: Option<ResetError>,
    },
    Reset(ResetReport),
}

/// Reconciler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ResetPhase {
    #[default]
    Idle,
    Resetting,
}

/// Recap of yesterday awaiting display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DawnSummary {
    pub pending: bool,
    pub record: Option<DailyRecord>,
}

/// Per-user day-change state machine.
pub struct ChronosManager<'a, S: ProgressStore, C: Clock> {
    store: &'a S,
    clock: C,
    user_id: String,
    catalog: &'a MilestoneCatalog,
    config: &'a EngineConfig,
    phase: ResetPhase,
    latched_on: Option<NaiveDate>,
    dawn: DawnSummary,
}

impl<'a, S: ProgressStore, C: Clock> ChronosManager<'a, S, C> {
    #[must_use]
    pub fn new(
        store: &'a S,
        clock: C,
        user_id: impl Into<String>,
        catalog: &'a MilestoneCatalog,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            user_id: user_id.into(),
            catalog,
            config,
            phase: ResetPhase::Idle,
            latched_on: None,
            dawn: DawnSummary::default(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub const fn phase(&self) -> ResetPhase {
        self.phase
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Whether this session has already checked the current day.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.latched_on == Some(self.clock.today())
    }

    /// Compare today with the watermark and reset when the day changed.
    ///
    /// Runs at most once per calendar day per manager. A later day (for
    /// example after midnight in a long-lived session) checks again.
    pub fn check_day_change(&mut self) -> DayChangeOutcome {
        let today = self.clock.today();
        if self.latched_on == Some(today) {
            return DayChangeOutcome::Latched;
        }
        self.latched_on = Some(today);

        let profile = match self.load_profile(today, false) {
            Ok(profile) => profile,
            Err(report) => {
                self.latched_on = None;
                return DayChangeOutcome::Reset(report);
            }
        };

        match profile.last_reset_date {
            Some(watermark) if watermark == today => DayChangeOutcome::UpToDate,
            Some(watermark) => {
                if watermark > today {
                    log::warn!(
                        "{LOG_RESET_START}: watermark {watermark} is ahead of today {today}"
                    );
                }
                DayChangeOutcome::Reset(self.run(profile, today, false))
            }
            None => {
                let error = self
                    .store
                    .update_profile(
                        &self.user_id,
                        &ProfileUpdate {
                            last_reset_date: Some(today),
                            ..ProfileUpdate::default()
                        },
                    )
                    .err()
                    .map(|err| ResetError::WatermarkPersist {
                        date: today,
                        message: err.to_string(),
                    });
                match &error {
                    None => log::info!("{LOG_WATERMARK_INIT}: user {} at {today}", self.user_id),
                    Some(err) => log::warn!("{LOG_RESET_WATERMARK_FAILED}: {err}"),
                }
                DayChangeOutcome::WatermarkInitialized { date: today, error }
            }
        }
    }

    /// Run the reset unconditionally, ignoring the watermark and the latch.
    pub fn force_reset(&mut self) -> ResetReport {
        let today = self.clock.today();
        match self.load_profile(today, true) {
            Ok(profile) => self.run(profile, today, true),
            Err(report) => report,
        }
    }

    /// Consume the pending dawn summary, if any.
    pub fn take_dawn_summary(&mut self) -> Option<DailyRecord> {
        if !self.dawn.pending {
            return None;
        }
        self.dawn.pending = false;
        self.dawn.record.clone()
    }

    /// Clear the pending flag, keeping the last record for redisplay.
    pub fn dismiss_dawn_summary(&mut self) {
        self.dawn.pending = false;
    }

    #[must_use]
    pub const fn dawn_summary(&self) -> &DawnSummary {
        &self.dawn
    }

    fn load_profile(&self, today: NaiveDate, forced: bool) -> Result<UserProfile, ResetReport> {
        match self.store.get_profile(&self.user_id) {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                let error = ResetError::MissingProfile {
                    user_id: self.user_id.clone(),
                };
                log::error!("{LOG_RESET_START}: {error}");
                Err(ResetReport::fatal(today, forced, error))
            }
            Err(err) => {
                let error = ResetError::Load {
                    what: "profile",
                    message: err.to_string(),
                };
                log::error!("{LOG_RESET_START}: {error}");
                Err(ResetReport::fatal(today, forced, error))
            }
        }
    }

    fn run(&mut self, profile: UserProfile, today: NaiveDate, forced: bool) -> ResetReport {
        self.phase = ResetPhase::Resetting;
        let report = self.reconcile(&profile, today, forced);
        self.phase = ResetPhase::Idle;
        if report.success {
            self.dawn = DawnSummary {
                pending: true,
                record: report.daily_record.clone(),
            };
        }
        report
    }

    fn reconcile(&self, profile: &UserProfile, today: NaiveDate, forced: bool) -> ResetReport {
        let yesterday = previous_day(today);
        let now = self.clock.now();
        log::info!(
            "{LOG_RESET_START}: user {} {} -> {today}{}",
            self.user_id,
            profile
                .last_reset_date
                .map_or_else(|| "never".to_string(), |date| date.to_string()),
            if forced { " (forced)" } else { "" }
        );

        let paths = match self.store.get_active_paths(&self.user_id) {
            Ok(paths) => paths,
            Err(err) => {
                let error = ResetError::Load {
                    what: "active paths",
                    message: err.to_string(),
                };
                log::error!("{LOG_RESET_START}: {error}");
                return ResetReport::fatal(today, forced, error);
            }
        };

        let mut report = ResetReport::empty(today, forced);
        let mut stats = Vec::with_capacity(paths.len());
        for path in &paths {
            if let Some(stat) = self.reconcile_path(path, yesterday, &mut report) {
                stats.push(stat);
            }
        }

        let quests = match self.store.get_quests(&self.user_id) {
            Ok(quests) => quests,
            Err(err) => {
                let error = ResetError::QuestLoad {
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_QUEST_FAILED}: {error}");
                report.errors.push(error);
                Vec::new()
            }
        };

        let record = self.settle_record(profile, yesterday, stats, &quests, now, &mut report);
        report.daily_record = Some(record);

        for quest in &quests {
            self.migrate_quest(quest, today, &mut report);
        }

        let fresh_earnings = (profile.earnings.date != Some(today)).then(|| DailyEarnings {
            date: Some(today),
            ..DailyEarnings::default()
        });
        match self.store.update_profile(
            &self.user_id,
            &ProfileUpdate {
                last_reset_date: Some(today),
                earnings: fresh_earnings,
                ..ProfileUpdate::default()
            },
        ) {
            Ok(()) => report.success = true,
            Err(err) => {
                let error = ResetError::WatermarkPersist {
                    date: today,
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_WATERMARK_FAILED}: {error}");
                report.errors.push(error);
            }
        }

        log::info!(
            "{LOG_RESET_DONE}: success={} paths={} reset={} maintained={} quests={} errors={}",
            report.success,
            report.paths_processed,
            report.streaks_reset.len(),
            report.streaks_maintained.len(),
            report.quests_processed,
            report.errors.len()
        );
        report
    }

    /// Decide one path's streak from yesterday's ledger entry. The streak is
    /// kept only for a 100% entry; it is never incremented here.
    fn reconcile_path(
        &self,
        path: &PathInstance,
        yesterday: NaiveDate,
        report: &mut ResetReport,
    ) -> Option<PathDailyStat> {
        let ledger = DailyProgressLedger::new(self.store);
        let entry = match ledger.get_entry(&self.user_id, &path.id, yesterday) {
            Ok(entry) => entry,
            Err(err) => {
                let error = ResetError::LedgerRead {
                    path_id: path.id.clone(),
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_PATH_FAILED}: {error}");
                report.errors.push(error);
                return None;
            }
        };
        report.paths_processed += 1;

        let completed = entry.as_ref().is_some_and(|entry| entry.is_complete());
        let before = path.current_streak();
        let after = if completed {
            before
        } else {
            StreakEngine::for_archetype(self.catalog, &path.archetype, self.config)
                .reset_streak(&path.streak)
                .current_streak
        };
        log::debug!(
            "{LOG_RESET_PATH}: path {} {} streak {before} -> {after}",
            path.id,
            entry.as_ref().map_or_else(
                || "untracked".to_string(),
                |entry| format!("{}%", entry.percentage)
            ),
        );

        if completed {
            report.streaks_maintained.push(path.id.clone());
        } else {
            report.streaks_reset.push(path.id.clone());
        }
        if after != before
            && let Err(err) = self.store.update_path_streak(&path.id, after)
        {
            let error = ResetError::PathPersist {
                path_id: path.id.clone(),
                message: err.to_string(),
            };
            log::warn!("{LOG_RESET_PATH_FAILED}: {error}");
            report.errors.push(error);
        }

        if !path.checklist.is_empty()
            && let Err(err) = self
                .store
                .update_path_checklist(&path.id, &Checklist::default())
        {
            let error = ResetError::ChecklistClear {
                path_id: path.id.clone(),
                message: err.to_string(),
            };
            log::warn!("{LOG_RESET_PATH_FAILED}: {error}");
            report.errors.push(error);
        }

        let (tasks_total, _) = path.task_counts();
        Some(PathDailyStat {
            path_id: path.id.clone(),
            path_name: path.name.clone(),
            completed_count: entry.as_ref().map_or(0, |entry| entry.tasks_completed),
            total_count: entry.as_ref().map_or(tasks_total, |entry| entry.tasks_total),
            streak_before: before,
            streak_after: after,
            was_reset: !completed,
        })
    }

    /// Yesterday's record is written once. A rerun for the same day reuses
    /// the stored snapshot instead of rebuilding it from mutated state.
    fn settle_record(
        &self,
        profile: &UserProfile,
        yesterday: NaiveDate,
        stats: Vec<PathDailyStat>,
        quests: &[Quest],
        now: DateTime<Utc>,
        report: &mut ResetReport,
    ) -> DailyRecord {
        match self.store.get_daily_record(&self.user_id, yesterday) {
            Ok(Some(existing)) => {
                log::debug!("{LOG_RECORD_KEPT}: record for {yesterday} already written");
                self.prune_records(report);
                existing
            }
            Ok(None) => {
                let record = build_record(profile, yesterday, stats, quests, now);
                if self.persist_record(&record, report) {
                    self.prune_records(report);
                }
                record
            }
            Err(err) => {
                // Absence is unknown, so nothing is written.
                let error = ResetError::RecordRead {
                    date: yesterday,
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_RECORD_FAILED}: {error}");
                report.errors.push(error);
                build_record(profile, yesterday, stats, quests, now)
            }
        }
    }

    fn persist_record(&self, record: &DailyRecord, report: &mut ResetReport) -> bool {
        let Err(err) = self.store.save_daily_record(record) else {
            return true;
        };
        let error = ResetError::RecordPersist {
            date: record.date,
            message: err.to_string(),
        };
        log::warn!("{LOG_RESET_RECORD_FAILED}: {error}");
        report.errors.push(error);
        false
    }

    fn prune_records(&self, report: &mut ResetReport) {
        match self
            .store
            .prune_daily_records(&self.user_id, self.config.record_retention)
        {
            Ok(0) => {}
            Ok(pruned) => log::debug!("{LOG_RECORD_PRUNED}: {pruned} old records"),
            Err(err) => {
                let error = ResetError::RecordPrune {
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_RECORD_FAILED}: {error}");
                report.errors.push(error);
            }
        }
    }

    fn migrate_quest(&self, quest: &Quest, today: NaiveDate, report: &mut ResetReport) {
        let Some(update) = migration_for(quest, today) else {
            return;
        };
        match self.store.update_quest(&quest.id, &update) {
            Ok(()) => report.quests_processed += 1,
            Err(err) => {
                let error = ResetError::QuestMigration {
                    quest_id: quest.id.clone(),
                    message: err.to_string(),
                };
                log::warn!("{LOG_RESET_QUEST_FAILED}: {error}");
                report.errors.push(error);
            }
        }
    }
}

/// The forward move for `quest`, or `None` when it is terminal or already
/// scheduled for today. Completion history is never touched.
#[must_use]
pub fn migration_for(quest: &Quest, today: NaiveDate) -> Option<QuestUpdate> {
    if quest.is_terminal() || (quest.date == today && quest.status == QuestStatus::Today) {
        return None;
    }
    Some(QuestUpdate {
        date: Some(today),
        status: Some(QuestStatus::Today),
        completed_at: None,
    })
}

fn build_record(
    profile: &UserProfile,
    date: NaiveDate,
    path_stats: Vec<PathDailyStat>,
    quests: &[Quest],
    now: DateTime<Utc>,
) -> DailyRecord {
    let quests_completed = quests.iter().filter(|quest| quest.completed_on(date)).count();
    let quests_total = quests
        .iter()
        .filter(|quest| quest.completed_on(date) || (quest.date == date && !quest.is_terminal()))
        .count();
    let (coins_earned, stars_earned) = profile.earnings.for_date(date);
    DailyRecord {
        user_id: profile.user_id.clone(),
        date,
        path_stats,
        quests_completed: len_to_u32(quests_completed),
        quests_total: len_to_u32(quests_total),
        coins_earned,
        stars_earned,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::{ProgressUpsert, merge_entry};
    use crate::model::QuestCompletionStamp;
    use crate::store::MemoryStore;
    use crate::streak::StreakState;
    use std::collections::BTreeSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    fn store_with_watermark(watermark: Option<NaiveDate>) -> MemoryStore {
        let store = MemoryStore::new();
        let mut profile = UserProfile::new("u1");
        profile.last_reset_date = watermark;
        store.insert_profile(profile).unwrap();
        store
    }

    fn ledger(store: &MemoryStore, path_id: &str, date: NaiveDate, completed: u32, total: u32) {
        let entry = merge_entry(
            None,
            ProgressUpsert {
                user_id: "u1".into(),
                path_id: path_id.into(),
                date,
                tasks_total: total,
                tasks_completed: completed,
                completed_task_ids: BTreeSet::new(),
                completed_subtask_ids: BTreeSet::new(),
            },
            date.and_hms_opt(20, 0, 0).unwrap().and_utc(),
        );
        store.upsert_daily_progress(&entry).unwrap();
    }

    #[test]
    fn missing_watermark_only_initializes() {
        let store = store_with_watermark(None);
        store.put_path(PathInstance::new("p1", "u1", "Run").with_streak(StreakState::at(1, 2)));
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );
        assert_eq!(
            chronos.check_day_change(),
            DayChangeOutcome::WatermarkInitialized {
                date: day(5),
                error: None
            }
        );
        assert_eq!(store.get_path("p1").unwrap().unwrap().current_streak(), 2);
        assert_eq!(
            store.get_profile("u1").unwrap().unwrap().last_reset_date,
            Some(day(5))
        );
        assert!(chronos.take_dawn_summary().is_none());
    }

    #[test]
    fn day_change_keeps_complete_and_breaks_incomplete() {
        let store = store_with_watermark(Some(day(4)));
        store.put_path(PathInstance::new("full", "u1", "Read").with_streak(StreakState::at(4, 6)));
        store.put_path(PathInstance::new("part", "u1", "Lift").with_streak(StreakState::at(4, 6)));
        store.put_path(PathInstance::new("none", "u1", "Nap").with_streak(StreakState::at(2, 3)));
        ledger(&store, "full", day(4), 3, 3);
        ledger(&store, "part", day(4), 2, 3);
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );

        let DayChangeOutcome::Reset(report) = chronos.check_day_change() else {
            panic!("expected a reset");
        };
        assert!(report.success);
        assert!(report.errors.is_empty());
        assert_eq!(report.paths_processed, 3);
        assert_eq!(report.streaks_maintained, vec!["full".to_string()]);
        let mut broken = report.streaks_reset.clone();
        broken.sort();
        assert_eq!(broken, vec!["none".to_string(), "part".to_string()]);
        assert_eq!(store.get_path("full").unwrap().unwrap().current_streak(), 6);
        assert_eq!(store.get_path("part").unwrap().unwrap().current_streak(), 0);
        assert_eq!(store.get_path("none").unwrap().unwrap().current_streak(), 0);

        let record = report.daily_record.expect("record");
        assert_eq!(record.date, day(4));
        assert_eq!(record.perfect_paths(), 1);
        assert_eq!(chronos.phase(), ResetPhase::Idle);
        assert_eq!(chronos.take_dawn_summary(), Some(record));
        assert!(chronos.take_dawn_summary().is_none());
    }

    #[test]
    fn untracked_path_at_zero_is_still_a_reset() {
        let store = store_with_watermark(Some(day(4)));
        store.put_path(PathInstance::new("idle", "u1", "Stretch"));
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );

        let DayChangeOutcome::Reset(report) = chronos.check_day_change() else {
            panic!("expected a reset");
        };
        assert_eq!(report.streaks_reset, vec!["idle".to_string()]);
        assert!(report.streaks_maintained.is_empty());
        let record = report.daily_record.unwrap();
        let stat = &record.path_stats[0];
        assert_eq!(stat.streak_before, 0);
        assert_eq!(stat.streak_after, 0);
        assert!(stat.was_reset);
    }

    #[test]
    fn rerun_for_the_same_day_keeps_the_first_record() {
        let store = store_with_watermark(Some(day(4)));
        store.put_path(PathInstance::new("p1", "u1", "Lift").with_streak(StreakState::at(4, 6)));
        ledger(&store, "p1", day(4), 2, 3);
        store
            .update_profile(
                "u1",
                &ProfileUpdate {
                    earnings: Some(DailyEarnings {
                        date: Some(day(4)),
                        coins: 30,
                        stars: 0,
                    }),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();
        let config = EngineConfig::default();
        let clock = FixedClock::new(day(5));
        let mut chronos =
            ChronosManager::new(&store, &clock, "u1", MilestoneCatalog::standard(), &config);

        let first = chronos.force_reset();
        let stored = store.get_daily_record("u1", day(4)).unwrap().unwrap();
        assert_eq!(first.daily_record.as_ref(), Some(&stored));
        assert_eq!(stored.path_stats[0].streak_before, 6);
        assert_eq!(stored.coins_earned, 30);

        assert_eq!(store.get_path("p1").unwrap().unwrap().current_streak(), 0);
        let second = chronos.force_reset();
        assert!(second.success);
        assert!(second.errors.is_empty());
        assert_eq!(second.daily_record, first.daily_record);
        assert_eq!(store.get_daily_record("u1", day(4)).unwrap(), Some(stored));
        assert_eq!(store.list_daily_records("u1").unwrap().len(), 1);
        assert_eq!(chronos.take_dawn_summary(), first.daily_record);
    }

    #[test]
    fn latch_blocks_second_check_same_day() {
        let store = store_with_watermark(Some(day(4)));
        let config = EngineConfig::default();
        let clock = FixedClock::new(day(5));
        let mut chronos =
            ChronosManager::new(&store, &clock, "u1", MilestoneCatalog::standard(), &config);
        assert!(matches!(chronos.check_day_change(), DayChangeOutcome::Reset(_)));
        assert!(chronos.has_run());
        assert_eq!(chronos.check_day_change(), DayChangeOutcome::Latched);

        clock.advance_days(1);
        assert!(!chronos.has_run());
        assert!(matches!(chronos.check_day_change(), DayChangeOutcome::Reset(_)));
    }

    #[test]
    fn up_to_date_watermark_does_nothing() {
        let store = store_with_watermark(Some(day(5)));
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );
        assert_eq!(chronos.check_day_change(), DayChangeOutcome::UpToDate);
    }

    #[test]
    fn forced_reset_ignores_watermark_and_dismiss_keeps_record() {
        let store = store_with_watermark(Some(day(5)));
        store.put_path(PathInstance::new("p1", "u1", "Run").with_streak(StreakState::at(1, 2)));
        ledger(&store, "p1", day(4), 2, 2);
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );

        let report = chronos.force_reset();
        assert!(report.forced);
        assert!(report.success);
        assert_eq!(report.streaks_maintained, vec!["p1".to_string()]);
        assert!(chronos.dawn_summary().pending);

        chronos.dismiss_dawn_summary();
        assert!(!chronos.dawn_summary().pending);
        assert!(chronos.dawn_summary().record.is_some());
        assert!(chronos.take_dawn_summary().is_none());
    }

    #[test]
    fn missing_profile_is_fatal_and_not_latched() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "ghost",
            MilestoneCatalog::standard(),
            &config,
        );
        let DayChangeOutcome::Reset(report) = chronos.check_day_change() else {
            panic!("expected a fatal report");
        };
        assert!(!report.success);
        assert!(report.is_fatal());
        assert!(!chronos.has_run());
        assert!(!chronos.force_reset().success);
    }

    #[test]
    fn quest_migration_rules() {
        let store = store_with_watermark(Some(day(4)));
        store.put_quest(Quest::new("late", "u1", "Call bank", day(2)));
        store.put_quest(
            Quest::new("done", "u1", "Pay rent", day(3)).with_status(QuestStatus::Completed),
        );
        let mut daily = Quest::new("daily", "u1", "Water plants", day(4))
            .recurring()
            .with_status(QuestStatus::Completed);
        daily.completions.push(QuestCompletionStamp {
            day: day(4),
            at: day(4).and_hms_opt(9, 0, 0).unwrap().and_utc(),
        });
        store.put_quest(daily);
        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );
        let report = chronos.force_reset();
        assert!(report.success);
        assert!(report.forced);
        assert_eq!(report.quests_processed, 2);

        let quests = store.get_quests("u1").unwrap();
        let find = |id: &str| quests.iter().find(|quest| quest.id == id).unwrap();
        assert_eq!(find("late").date, day(5));
        assert_eq!(find("late").status, QuestStatus::Today);
        assert_eq!(find("done").date, day(3));
        assert_eq!(find("done").status, QuestStatus::Completed);
        assert_eq!(find("daily").status, QuestStatus::Today);
        assert_eq!(find("daily").completions.len(), 1);

        let record = report.daily_record.unwrap();
        assert_eq!(record.quests_completed, 1);
        assert_eq!(record.quests_total, 1);
    }

    #[test]
    fn reset_clears_checklists_and_rolls_earnings() {
        let store = store_with_watermark(Some(day(4)));
        let mut path = PathInstance::new("p1", "u1", "Read").with_task("t1", "Chapter");
        path.checklist.completed_task_ids.insert("t1".into());
        store.put_path(path);
        ledger(&store, "p1", day(4), 1, 1);
        let mut profile = store.get_profile("u1").unwrap().unwrap();
        profile.earnings = DailyEarnings {
            date: Some(day(4)),
            coins: 30,
            stars: 1,
        };
        store
            .update_profile(
                "u1",
                &ProfileUpdate {
                    earnings: Some(profile.earnings),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        let config = EngineConfig::default();
        let mut chronos = ChronosManager::new(
            &store,
            FixedClock::new(day(5)),
            "u1",
            MilestoneCatalog::standard(),
            &config,
        );
        let DayChangeOutcome::Reset(report) = chronos.check_day_change() else {
            panic!("expected a reset");
        };
        let record = report.daily_record.unwrap();
        assert_eq!((record.coins_earned, record.stars_earned), (30, 1));
        assert!(store.get_path("p1").unwrap().unwrap().checklist.is_empty());
        let profile = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.earnings.date, Some(day(5)));
        assert_eq!(profile.earnings.coins, 0);
        assert_eq!(profile.wallet, crate::model::Wallet::default());
    }
}
