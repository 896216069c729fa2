//! Persistence seam and the in-memory adapter.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::ledger::DailyProgressEntry;
use crate::model::{
    Checklist, DailyRecord, PathInstance, ProfileUpdate, Quest, QuestUpdate, UserProfile,
};
use crate::streak::StreakState;

/// Trait for abstracting the remote relational store.
/// Platform-specific implementations should provide this.
///
/// Every call is an independent request/response; the engine never holds a
/// lock across calls.
pub trait ProgressStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a user profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error>;

    /// Load one ledger entry; `Ok(None)` when the path was not tracked that day.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_daily_progress(
        &self,
        user_id: &str,
        path_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyProgressEntry>, Self::Error>;

    /// Load every active path owned by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_active_paths(&self, user_id: &str) -> Result<Vec<PathInstance>, Self::Error>;

    /// Load a single path by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_path(&self, path_id: &str) -> Result<Option<PathInstance>, Self::Error>;

    /// Load every quest owned by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_quests(&self, user_id: &str) -> Result<Vec<Quest>, Self::Error>;

    /// Load retained daily records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn list_daily_records(&self, user_id: &str) -> Result<Vec<DailyRecord>, Self::Error>;

    /// Load the daily record for (user, date), if one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_daily_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>, Self::Error>;

    /// Overwrite a path's current streak.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is unknown or the write fails.
    fn update_path_streak(&self, path_id: &str, streak: u32) -> Result<(), Self::Error>;

    /// Persist a path's full streak state and completion timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is unknown or the write fails.
    fn save_path_progress(
        &self,
        path_id: &str,
        streak: &StreakState,
        last_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), Self::Error>;

    /// Replace a path's checklist for the current day.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is unknown or the write fails.
    fn update_path_checklist(&self, path_id: &str, checklist: &Checklist)
    -> Result<(), Self::Error>;

    /// Insert or replace a ledger entry keyed by (user, path, date).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_daily_progress(&self, entry: &DailyProgressEntry) -> Result<(), Self::Error>;

    /// Write the daily record keyed by (user, date). Callers check
    /// [`ProgressStore::get_daily_record`] first; records are never rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_daily_record(&self, record: &DailyRecord) -> Result<(), Self::Error>;

    /// Drop all but the newest `keep` records; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn prune_daily_records(&self, user_id: &str, keep: usize) -> Result<usize, Self::Error>;

    /// Apply a partial quest update.
    ///
    /// # Errors
    ///
    /// Returns an error if the quest is unknown or the write fails.
    fn update_quest(&self, quest_id: &str, update: &QuestUpdate) -> Result<(), Self::Error>;

    /// Apply a partial profile update.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is unknown or the write fails.
    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), Self::Error>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for &S {
    type Error = S::Error;

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error> {
        (**self).get_profile(user_id)
    }

    fn get_daily_progress(
        &self,
        user_id: &str,
        path_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyProgressEntry>, Self::Error> {
        (**self).get_daily_progress(user_id, path_id, date)
    }

    fn get_active_paths(&self, user_id: &str) -> Result<Vec<PathInstance>, Self::Error> {
        (**self).get_active_paths(user_id)
    }

    fn get_path(&self, path_id: &str) -> Result<Option<PathInstance>, Self::Error> {
        (**self).get_path(path_id)
    }

    fn get_quests(&self, user_id: &str) -> Result<Vec<Quest>, Self::Error> {
        (**self).get_quests(user_id)
    }

    fn list_daily_records(&self, user_id: &str) -> Result<Vec<DailyRecord>, Self::Error> {
        (**self).list_daily_records(user_id)
    }

    fn get_daily_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>, Self::Error> {
        (**self).get_daily_record(user_id, date)
    }

    fn update_path_streak(&self, path_id: &str, streak: u32) -> Result<(), Self::Error> {
        (**self).update_path_streak(path_id, streak)
    }

    fn save_path_progress(
        &self,
        path_id: &str,
        streak: &StreakState,
        last_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), Self::Error> {
        (**self).save_path_progress(path_id, streak, last_completed_at)
    }

    fn update_path_checklist(
        &self,
        path_id: &str,
        checklist: &Checklist,
    ) -> Result<(), Self::Error> {
        (**self).update_path_checklist(path_id, checklist)
    }

    fn upsert_daily_progress(&self, entry: &DailyProgressEntry) -> Result<(), Self::Error> {
        (**self).upsert_daily_progress(entry)
    }

    fn save_daily_record(&self, record: &DailyRecord) -> Result<(), Self::Error> {
        (**self).save_daily_record(record)
    }

    fn prune_daily_records(&self, user_id: &str, keep: usize) -> Result<usize, Self::Error> {
        (**self).prune_daily_records(user_id, keep)
    }

    fn update_quest(&self, quest_id: &str, update: &QuestUpdate) -> Result<(), Self::Error> {
        (**self).update_quest(quest_id, update)
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), Self::Error> {
        (**self).update_profile(user_id, update)
    }
}

/// Errors raised by [`MemoryStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` already exists")]
    Duplicate { kind: &'static str, id: String },
}

impl StoreError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub profiles: BTreeMap<String, UserProfile>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathInstance>,
    #[serde(default)]
    pub quests: BTreeMap<String, Quest>,
    #[serde(default)]
    pub progress: Vec<DailyProgressEntry>,
    #[serde(default)]
    pub records: Vec<DailyRecord>,
}

/// Single-threaded in-memory store backing tests and the CLI file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<StoreSnapshot>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RefCell::new(snapshot),
        }
    }

    /// Clone the current contents.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.borrow().clone()
    }

    /// Replace the entire contents.
    pub fn restore(&self, snapshot: StoreSnapshot) {
        *self.data.borrow_mut() = snapshot;
    }

    /// Insert a new profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the user already exists.
    pub fn insert_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        let mut data = self.data.borrow_mut();
        if data.profiles.contains_key(&profile.user_id) {
            return Err(StoreError::Duplicate {
                kind: "profile",
                id: profile.user_id,
            });
        }
        data.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    /// Insert or replace a path.
    pub fn put_path(&self, path: PathInstance) {
        self.data.borrow_mut().paths.insert(path.id.clone(), path);
    }

    /// Insert or replace a quest.
    pub fn put_quest(&self, quest: Quest) {
        self.data.borrow_mut().quests.insert(quest.id.clone(), quest);
    }

    /// Every path owned by `user_id`, active or not.
    #[must_use]
    pub fn paths_for(&self, user_id: &str) -> Vec<PathInstance> {
        self.data
            .borrow()
            .paths
            .values()
            .filter(|path| path.user_id == user_id)
            .cloned()
            .collect()
    }

    fn with_path<R>(
        &self,
        path_id: &str,
        f: impl FnOnce(&mut PathInstance) -> R,
    ) -> Result<R, StoreError> {
        let mut data = self.data.borrow_mut();
        let path = data
            .paths
            .get_mut(path_id)
            .ok_or_else(|| StoreError::not_found("path", path_id))?;
        Ok(f(path))
    }
}

impl ProgressStore for MemoryStore {
    type Error = StoreError;

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error> {
        Ok(self.data.borrow().profiles.get(user_id).cloned())
    }

    fn get_daily_progress(
        &self,
        user_id: &str,
        path_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyProgressEntry>, Self::Error> {
        Ok(self
            .data
            .borrow()
            .progress
            .iter()
            .find(|entry| entry.user_id == user_id && entry.path_id == path_id && entry.date == date)
            .cloned())
    }

    fn get_active_paths(&self, user_id: &str) -> Result<Vec<PathInstance>, Self::Error> {
        Ok(self
            .paths_for(user_id)
            .into_iter()
            .filter(|path| path.is_active)
            .collect())
    }

    fn get_path(&self, path_id: &str) -> Result<Option<PathInstance>, Self::Error> {
        Ok(self.data.borrow().paths.get(path_id).cloned())
    }

    fn get_quests(&self, user_id: &str) -> Result<Vec<Quest>, Self::Error> {
        Ok(self
            .data
            .borrow()
            .quests
            .values()
            .filter(|quest| quest.user_id == user_id)
            .cloned()
            .collect())
    }

    fn list_daily_records(&self, user_id: &str) -> Result<Vec<DailyRecord>, Self::Error> {
        let mut records: Vec<_> = self
            .data
            .borrow()
            .records
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.date);
        Ok(records)
    }

    fn get_daily_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>, Self::Error> {
        Ok(self
            .data
            .borrow()
            .records
            .iter()
            .find(|record| record.user_id == user_id && record.date == date)
            .cloned())
    }

    fn update_path_streak(&self, path_id: &str, streak: u32) -> Result<(), Self::Error> {
        self.with_path(path_id, |path| path.streak.current_streak = streak)
    }

    fn save_path_progress(
        &self,
        path_id: &str,
        streak: &StreakState,
        last_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), Self::Error> {
        self.with_path(path_id, |path| {
            path.streak = streak.clone();
            if last_completed_at.is_some() {
                path.last_completed_at = last_completed_at;
            }
        })
    }

    fn update_path_checklist(
        &self,
        path_id: &str,
        checklist: &Checklist,
    ) -> Result<(), Self::Error> {
        self.with_path(path_id, |path| path.checklist = checklist.clone())
    }

    fn upsert_daily_progress(&self, entry: &DailyProgressEntry) -> Result<(), Self::Error> {
        let mut data = self.data.borrow_mut();
        let key = entry.key();
        if let Some(existing) = data.progress.iter_mut().find(|row| row.key() == key) {
            *existing = entry.clone();
        } else {
            data.progress.push(entry.clone());
        }
        Ok(())
    }

    fn save_daily_record(&self, record: &DailyRecord) -> Result<(), Self::Error> {
        let mut data = self.data.borrow_mut();
        if let Some(existing) = data
            .records
            .iter_mut()
            .find(|row| row.user_id == record.user_id && row.date == record.date)
        {
            *existing = record.clone();
        } else {
            data.records.push(record.clone());
        }
        Ok(())
    }

    fn prune_daily_records(&self, user_id: &str, keep: usize) -> Result<usize, Self::Error> {
        let mut data = self.data.borrow_mut();
        let mut dates: Vec<NaiveDate> = data
            .records
            .iter()
            .filter(|record| record.user_id == user_id)
            .map(|record| record.date)
            .collect();
        if dates.len() <= keep {
            return Ok(0);
        }
        dates.sort_unstable();
        let cutoff = dates[dates.len() - keep.max(1)];
        let before = data.records.len();
        data.records
            .retain(|record| record.user_id != user_id || record.date >= cutoff);
        Ok(before - data.records.len())
    }

    fn update_quest(&self, quest_id: &str, update: &QuestUpdate) -> Result<(), Self::Error> {
        let mut data = self.data.borrow_mut();
        let quest = data
            .quests
            .get_mut(quest_id)
            .ok_or_else(|| StoreError::not_found("quest", quest_id))?;
        if let Some(date) = update.date {
            quest.date = date;
        }
        if let Some(status) = update.status {
            quest.status = status;
        }
        if let Some(stamp) = update.completed_at {
            quest.completions.push(stamp);
        }
        Ok(())
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), Self::Error> {
        let mut data = self.data.borrow_mut();
        let profile = data
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found("profile", user_id))?;
        if let Some(date) = update.last_reset_date {
            profile.last_reset_date = Some(date);
        }
        if let Some(wallet) = &update.wallet {
            profile.wallet = wallet.clone();
        }
        if let Some(earnings) = update.earnings {
            profile.earnings = earnings;
        }
        Ok(())
    }
}
