//! JSON-file persistence for the CLI.
//!
//! The whole store is loaded into a [`MemoryStore`] on open and rewritten
//! after every successful write call.
use chrono::{DateTime, NaiveDate, Utc};
use questline_engine::{
    Checklist, DailyProgressEntry, DailyRecord, MemoryStore, PathInstance, ProfileUpdate,
    ProgressStore, Quest, QuestUpdate, StoreError, StoreSnapshot, StreakState, UserProfile,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let path = path.into();
        let snapshot = read_snapshot(&path)?;
        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// Re-read the file, picking up changes from other processes.
    pub fn reload(&self) -> Result<(), FileStoreError> {
        self.inner.restore(read_snapshot(&self.path)?);
        Ok(())
    }

    /// Write the current contents to disk.
    pub fn flush(&self) -> Result<(), FileStoreError> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot()).map_err(|source| {
            FileStoreError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| FileStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, json).map_err(|source| FileStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn persist<T>(&self, result: Result<T, StoreError>) -> Result<T, FileStoreError> {
        let value = result?;
        self.flush()?;
        Ok(value)
    }
}

fn read_snapshot(path: &Path) -> Result<StoreSnapshot, FileStoreError> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(StoreSnapshot::default()),
        Ok(text) => serde_json::from_str(&text).map_err(|source| FileStoreError::Malformed {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreSnapshot::default()),
        Err(source) => Err(FileStoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ProgressStore for FileStore {
    type Error = FileStoreError;

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error> {
        Ok(self.inner.get_profile(user_id)?)
    }

    fn get_daily_progress(
        &self,
        user_id: &str,
        path_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyProgressEntry>, Self::Error> {
        Ok(self.inner.get_daily_progress(user_id, path_id, date)?)
    }

    fn get_active_paths(&self, user_id: &str) -> Result<Vec<PathInstance>, Self::Error> {
        Ok(self.inner.get_active_paths(user_id)?)
    }

    fn get_path(&self, path_id: &str) -> Result<Option<PathInstance>, Self::Error> {
        Ok(self.inner.get_path(path_id)?)
    }

    fn get_quests(&self, user_id: &str) -> Result<Vec<Quest>, Self::Error> {
        Ok(self.inner.get_quests(user_id)?)
    }

    fn list_daily_records(&self, user_id: &str) -> Result<Vec<DailyRecord>, Self::Error> {
        Ok(self.inner.list_daily_records(user_id)?)
    }

    fn get_daily_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>, Self::Error> {
        Ok(self.inner.get_daily_record(user_id, date)?)
    }

    fn update_path_streak(&self, path_id: &str, streak: u32) -> Result<(), Self::Error> {
        self.persist(self.inner.update_path_streak(path_id, streak))
    }

    fn save_path_progress(
        &self,
        path_id: &str,
        streak: &StreakState,
        last_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), Self::Error> {
        self.persist(
            self.inner
                .save_path_progress(path_id, streak, last_completed_at),
        )
    }

    fn update_path_checklist(
        &self,
        path_id: &str,
        checklist: &Checklist,
    ) -> Result<(), Self::Error> {
        self.persist(self.inner.update_path_checklist(path_id, checklist))
    }

    fn upsert_daily_progress(&self, entry: &DailyProgressEntry) -> Result<(), Self::Error> {
        self.persist(self.inner.upsert_daily_progress(entry))
    }

    fn save_daily_record(&self, record: &DailyRecord) -> Result<(), Self::Error> {
        self.persist(self.inner.save_daily_record(record))
    }

    fn prune_daily_records(&self, user_id: &str, keep: usize) -> Result<usize, Self::Error> {
        self.persist(self.inner.prune_daily_records(user_id, keep))
    }

    fn update_quest(&self, quest_id: &str, update: &QuestUpdate) -> Result<(), Self::Error> {
        self.persist(self.inner.update_quest(quest_id, update))
    }

    fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), Self::Error> {
        self.persist(self.inner.update_profile(user_id, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "questline-store-{label}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn writes_survive_reopen() {
        let path = temp_path("reopen");
        let store = FileStore::open(&path).unwrap();
        store.memory().insert_profile(UserProfile::new("u1")).unwrap();
        store.memory().put_path(PathInstance::new("p1", "u1", "Run"));
        store.update_path_streak("p1", 4).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_path("p1").unwrap().unwrap().current_streak(), 4);
        assert!(reopened.get_profile("u1").unwrap().is_some());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_reported() {
        let path = temp_path("malformed");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(FileStoreError::Malformed { .. })
        ));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn failed_writes_do_not_touch_disk() {
        let path = temp_path("failed");
        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.update_path_streak("ghost", 1),
            Err(FileStoreError::Store(StoreError::NotFound { .. }))
        ));
        assert!(!path.exists());
    }
}
