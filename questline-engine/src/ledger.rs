//! Per (user, path, day) completion ledger.
//!
//! The ledger is written on every checklist toggle during a day and read the
//! next day to decide whether a streak survives. A missing entry ("the path
//! was not tracked that day") is distinct from a 0% entry.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constants::COMPLETE_PERCENTAGE;
use crate::numbers::rounded_percentage;
use crate::store::ProgressStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressStatus {
    #[default]
    Pending,
    Completed,
}

/// Ledger key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub user_id: String,
    pub path_id: String,
    pub date: NaiveDate,
}

impl LedgerKey {
    #[must_use]
    pub fn new(user_id: &str, path_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            path_id: path_id.to_string(),
            date,
        }
    }
}

/// One path's progress on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgressEntry {
    pub user_id: String,
    pub path_id: String,
    pub date: NaiveDate,
    pub tasks_total: u32,
    pub tasks_completed: u32,
    pub percentage: u8,
    pub status: ProgressStatus,
    #[serde(default)]
    pub completed_task_ids: BTreeSet<String>,
    #[serde(default)]
    pub completed_subtask_ids: BTreeSet<String>,
    /// First instant the entry reached 100% on its day. Never cleared once
    /// set, so toggling around the boundary cannot re-trigger the increment.
    #[serde(default)]
    pub first_completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl DailyProgressEntry {
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(&self.user_id, &self.path_id, self.date)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.percentage >= COMPLETE_PERCENTAGE
    }
}

/// Values supplied on each ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpsert {
    pub user_id: String,
    pub path_id: String,
    pub date: NaiveDate,
    pub tasks_total: u32,
    pub tasks_completed: u32,
    pub completed_task_ids: BTreeSet<String>,
    pub completed_subtask_ids: BTreeSet<String>,
}

/// Status derived from a percentage.
#[must_use]
pub fn status_for(percentage: u8) -> ProgressStatus {
    if percentage >= COMPLETE_PERCENTAGE {
        ProgressStatus::Completed
    } else {
        ProgressStatus::Pending
    }
}

/// Build the entry that results from applying `upsert` on top of `previous`.
///
/// Percentage and status are recomputed from the counts on every call; the
/// first-completion marker carries over from `previous` when present.
#[must_use]
pub fn merge_entry(
    previous: Option<&DailyProgressEntry>,
    upsert: ProgressUpsert,
    now: DateTime<Utc>,
) -> DailyProgressEntry {
    let percentage = rounded_percentage(upsert.tasks_completed, upsert.tasks_total);
    let status = status_for(percentage);
    let first_completed_at = previous
        .and_then(|entry| entry.first_completed_at)
        .or_else(|| (status == ProgressStatus::Completed).then_some(now));
    DailyProgressEntry {
        user_id: upsert.user_id,
        path_id: upsert.path_id,
        date: upsert.date,
        tasks_total: upsert.tasks_total,
        tasks_completed: upsert.tasks_completed.min(upsert.tasks_total),
        percentage,
        status,
        completed_task_ids: upsert.completed_task_ids,
        completed_subtask_ids: upsert.completed_subtask_ids,
        first_completed_at,
        updated_at: now,
    }
}

/// Ledger operations over a [`ProgressStore`].
pub struct DailyProgressLedger<'s, S: ProgressStore> {
    store: &'s S,
}

impl<'s, S: ProgressStore> DailyProgressLedger<'s, S> {
    #[must_use]
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Idempotent write keyed by (user, path, date). Returns the previous
    /// entry alongside the stored one so callers can detect transitions.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read or write fails.
    pub fn upsert(
        &self,
        upsert: ProgressUpsert,
        now: DateTime<Utc>,
    ) -> Result<(Option<DailyProgressEntry>, DailyProgressEntry), S::Error> {
        let previous =
            self.store
                .get_daily_progress(&upsert.user_id, &upsert.path_id, upsert.date)?;
        let entry = merge_entry(previous.as_ref(), upsert, now);
        self.store.upsert_daily_progress(&entry)?;
        Ok((previous, entry))
    }

    /// Point lookup; `Ok(None)` means the path was not tracked that day.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub fn get_entry(
        &self,
        user_id: &str,
        path_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyProgressEntry>, S::Error> {
        self.store.get_daily_progress(user_id, path_id, date)
    }
}
