//! Intra-day operations: checklist toggles, quest completion, and level-ups.
//!
//! A path's streak is incremented the first time its ledger entry reaches
//! 100% on a day. The gate is the entry's `first_completed_at` marker, so
//! unchecking and re-checking the last task never counts the day twice.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::constants::{LOG_STREAK_INCREMENT, LOG_WRITE_TOLERATED};
use crate::ledger::{DailyProgressEntry, ProgressUpsert, merge_entry};
use crate::milestones::MilestoneCatalog;
use crate::model::{
    PathInstance, ProfileUpdate, Quest, QuestCompletionStamp, QuestStatus, QuestUpdate,
};
use crate::progression::{AggregatedRewards, LevelUpOutcome, ProgressionService};
use crate::store::ProgressStore;
use crate::streak::{IncrementOutcome, StreakEngine, StreakVisualState};

/// Errors raised by intra-day operations.
#[derive(Debug, Error)]
pub enum ProgressionError<E: std::error::Error + 'static> {
    #[error("path `{0}` not found")]
    UnknownPath(String),
    #[error("path `{path_id}` has no checklist item `{item_id}`")]
    UnknownItem { path_id: String, item_id: String },
    #[error("quest `{0}` not found")]
    UnknownQuest(String),
    #[error("quest `{0}` is already completed")]
    QuestAlreadyCompleted(String),
    #[error("profile `{0}` not found")]
    UnknownProfile(String),
    #[error("store failure while {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: E,
    },
}

/// A checkbox on a path's daily checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ChecklistItem {
    Task(String),
    Subtask(String),
}

impl ChecklistItem {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Task(id) | Self::Subtask(id) => id,
        }
    }
}

/// Result of toggling a checklist item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub entry: DailyProgressEntry,
    /// Present when this toggle completed the day for the first time.
    pub increment: Option<IncrementOutcome>,
    pub rewards: AggregatedRewards,
    pub visual: StreakVisualState,
    /// Writes that failed but were tolerated by configuration.
    pub tolerated_failures: Vec<String>,
}

impl ToggleOutcome {
    #[must_use]
    pub const fn streak_incremented(&self) -> bool {
        self.increment.is_some()
    }
}

/// Result of completing a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCompletion {
    pub quest_id: String,
    pub rewards: AggregatedRewards,
    pub tolerated_failures: Vec<String>,
}

/// Per-path view for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOverview {
    pub path: PathInstance,
    pub today: Option<DailyProgressEntry>,
    pub visual: StreakVisualState,
    pub milestone_days: u32,
}

/// Applies intra-day changes through a [`ProgressStore`].
pub struct CompletionTracker<'a, S: ProgressStore, C: Clock> {
    store: &'a S,
    clock: &'a C,
    catalog: &'a MilestoneCatalog,
    config: &'a EngineConfig,
}

type TrackerResult<T, S> = Result<T, ProgressionError<<S as ProgressStore>::Error>>;

impl<'a, S: ProgressStore, C: Clock> CompletionTracker<'a, S, C> {
    #[must_use]
    pub const fn new(
        store: &'a S,
        clock: &'a C,
        catalog: &'a MilestoneCatalog,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            catalog,
            config,
        }
    }

    fn service(&self, archetype: &str) -> ProgressionService<'a> {
        ProgressionService::new(StreakEngine::for_archetype(
            self.catalog,
            archetype,
            self.config,
        ))
    }

    fn read<T>(&self, action: &'static str, result: Result<T, S::Error>) -> TrackerResult<T, S> {
        result.map_err(|source| ProgressionError::Store { action, source })
    }

    /// Propagate a failed write, or log and record it when tolerated.
    fn write(
        &self,
        action: &'static str,
        result: Result<(), S::Error>,
        tolerated: &mut Vec<String>,
    ) -> TrackerResult<(), S> {
        match result {
            Ok(()) => Ok(()),
            Err(source) if self.config.tolerate_write_failure => {
                log::warn!("{LOG_WRITE_TOLERATED}: {action}: {source}");
                tolerated.push(format!("{action}: {source}"));
                Ok(())
            }
            Err(source) => Err(ProgressionError::Store { action, source }),
        }
    }

    fn load_path(&self, user_id: &str, path_id: &str) -> TrackerResult<PathInstance, S> {
        self.read("loading path", self.store.get_path(path_id))?
            .filter(|path| path.user_id == user_id)
            .ok_or_else(|| ProgressionError::UnknownPath(path_id.to_string()))
    }

    /// Check or uncheck an item on a path's checklist for today.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown paths or items, for failed reads, and for
    /// failed writes unless `tolerate_write_failure` is set.
    pub fn toggle_item(
        &self,
        user_id: &str,
        path_id: &str,
        item: &ChecklistItem,
        done: bool,
    ) -> TrackerResult<ToggleOutcome, S> {
        let mut path = self.load_path(user_id, path_id)?;
        apply_toggle(&mut path, item, done)?;

        let mut tolerated = Vec::new();
        self.write(
            "saving checklist",
            self.store.update_path_checklist(path_id, &path.checklist),
            &mut tolerated,
        )?;

        let today = self.clock.today();
        let now = self.clock.now();
        let (tasks_total, tasks_completed) = path.task_counts();
        let previous = self.read(
            "loading ledger entry",
            self.store.get_daily_progress(user_id, path_id, today),
        )?;
        let entry = merge_entry(
            previous.as_ref(),
            ProgressUpsert {
                user_id: user_id.to_string(),
                path_id: path_id.to_string(),
                date: today,
                tasks_total,
                tasks_completed,
                completed_task_ids: path.checklist.completed_task_ids.clone(),
                completed_subtask_ids: path.checklist.completed_subtask_ids.clone(),
            },
            now,
        );
        self.write(
            "saving ledger entry",
            self.store.upsert_daily_progress(&entry),
            &mut tolerated,
        )?;

        let service = self.service(&path.archetype);
        let first_completion = previous
            .as_ref()
            .is_none_or(|prev| prev.first_completed_at.is_none())
            && entry.first_completed_at.is_some();

        let completion = service.process_daily_completion(&path.streak, first_completion);
        let rewards = completion
            .increment
            .as_ref()
            .map(IncrementOutcome::aggregated_rewards)
            .unwrap_or_default();

        if let Some(increment) = &completion.increment {
            log::info!(
                "{LOG_STREAK_INCREMENT}: path {path_id} streak {} -> {} (level {})",
                path.streak.current_streak,
                increment.state.current_streak,
                increment.state.current_level
            );
            self.write(
                "saving path progress",
                self.store
                    .save_path_progress(path_id, &increment.state, Some(now)),
                &mut tolerated,
            )?;
            if !rewards.is_empty() {
                self.credit(user_id, today, &rewards, &mut tolerated)?;
            }
        }

        Ok(ToggleOutcome {
            entry,
            increment: completion.increment,
            rewards,
            visual: completion.visual,
            tolerated_failures: tolerated,
        })
    }

    fn credit(
        &self,
        user_id: &str,
        today: NaiveDate,
        rewards: &AggregatedRewards,
        tolerated: &mut Vec<String>,
    ) -> TrackerResult<(), S> {
        let mut profile = self
            .read("loading profile", self.store.get_profile(user_id))?
            .ok_or_else(|| ProgressionError::UnknownProfile(user_id.to_string()))?;
        profile.wallet.credit(rewards);
        profile.earnings.record(today, rewards);
        self.write(
            "crediting rewards",
            self.store.update_profile(
                user_id,
                &ProfileUpdate {
                    wallet: Some(profile.wallet),
                    earnings: Some(profile.earnings),
                    ..ProfileUpdate::default()
                },
            ),
            tolerated,
        )
    }

    /// Prestige a path whose milestone has been reached.
    ///
    /// A refused level-up is reported through [`LevelUpOutcome::success`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown paths, failed reads, and failed writes
    /// unless `tolerate_write_failure` is set.
    pub fn level_up_path(&self, user_id: &str, path_id: &str) -> TrackerResult<LevelUpOutcome, S> {
        let path = self.load_path(user_id, path_id)?;
        let outcome = self
            .service(&path.archetype)
            .process_level_up(&path.streak, self.clock.now());
        if outcome.success {
            let mut tolerated = Vec::new();
            self.write(
                "saving prestige",
                self.store.save_path_progress(path_id, &outcome.state, None),
                &mut tolerated,
            )?;
        }
        Ok(outcome)
    }

    /// Mark a quest completed for today and credit its custom rewards.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or already-completed quests, failed
    /// reads, and failed writes unless `tolerate_write_failure` is set.
    pub fn complete_quest(&self, user_id: &str, quest_id: &str) -> TrackerResult<QuestCompletion, S> {
        let quest = self
            .read("loading quests", self.store.get_quests(user_id))?
            .into_iter()
            .find(|quest| quest.id == quest_id)
            .ok_or_else(|| ProgressionError::UnknownQuest(quest_id.to_string()))?;
        let today = self.clock.today();
        if quest.status == QuestStatus::Completed || quest.completed_on(today) {
            return Err(ProgressionError::QuestAlreadyCompleted(quest_id.to_string()));
        }

        let mut tolerated = Vec::new();
        self.write(
            "completing quest",
            self.store.update_quest(
                quest_id,
                &QuestUpdate {
                    status: Some(QuestStatus::Completed),
                    completed_at: Some(QuestCompletionStamp {
                        day: today,
                        at: self.clock.now(),
                    }),
                    ..QuestUpdate::default()
                },
            ),
            &mut tolerated,
        )?;

        let rewards = quest_rewards(&quest);
        if !rewards.is_empty() {
            self.credit(user_id, today, &rewards, &mut tolerated)?;
        }
        Ok(QuestCompletion {
            quest_id: quest_id.to_string(),
            rewards,
            tolerated_failures: tolerated,
        })
    }

    /// Status view of every active path for today.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn path_overviews(&self, user_id: &str) -> TrackerResult<Vec<PathOverview>, S> {
        let today = self.clock.today();
        let paths = self.read("loading paths", self.store.get_active_paths(user_id))?;
        let mut overviews = Vec::with_capacity(paths.len());
        for path in paths {
            let engine = StreakEngine::for_archetype(self.catalog, &path.archetype, self.config);
            let today_entry = self.read(
                "loading ledger entry",
                self.store.get_daily_progress(user_id, &path.id, today),
            )?;
            overviews.push(PathOverview {
                visual: engine
                    .streak_visual_state(path.current_streak(), path.current_level()),
                milestone_days: engine.milestone_days(path.current_level()),
                today: today_entry,
                path,
            });
        }
        Ok(overviews)
    }
}

fn quest_rewards(quest: &Quest) -> AggregatedRewards {
    AggregatedRewards {
        coins: quest.custom_rewards.coins,
        stars: quest.custom_rewards.stars,
        ticket: None,
    }
}

/// Apply a checkbox change to the path's in-memory checklist. Checking every
/// subtask of a task checks the task; unchecking one unchecks it.
fn apply_toggle<E: std::error::Error + 'static>(
    path: &mut PathInstance,
    item: &ChecklistItem,
    done: bool,
) -> Result<(), ProgressionError<E>> {
    let unknown = || ProgressionError::UnknownItem {
        path_id: path.id.clone(),
        item_id: item.id().to_string(),
    };
    match item {
        ChecklistItem::Task(task_id) => {
            if !path.has_task(task_id) {
                return Err(unknown());
            }
            set_membership(&mut path.checklist.completed_task_ids, task_id, done);
        }
        ChecklistItem::Subtask(subtask_id) => {
            let Some(owner) = path.subtask_owner(subtask_id).cloned() else {
                return Err(unknown());
            };
            set_membership(&mut path.checklist.completed_subtask_ids, subtask_id, done);
            let all_done = owner.subtasks.iter().all(|sub| {
                path.checklist.completed_subtask_ids.contains(&sub.id)
            });
            set_membership(&mut path.checklist.completed_task_ids, &owner.id, all_done);
        }
    }
    Ok(())
}

fn set_membership(set: &mut std::collections::BTreeSet<String>, id: &str, present: bool) {
    if present {
        set.insert(id.to_string());
    } else {
        set.remove(id);
    }
}
