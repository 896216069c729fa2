//! Records read and written through [`crate::store::ProgressStore`].
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::constants::DEFAULT_ARCHETYPE;
use crate::numbers::len_to_u32;
use crate::progression::AggregatedRewards;
use crate::streak::StreakState;

/// Spendable balances on a user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub coins: i64,
    pub stars: i64,
    #[serde(default)]
    pub tickets: Vec<String>,
}

impl Wallet {
    pub fn credit(&mut self, rewards: &AggregatedRewards) {
        self.coins = self.coins.saturating_add(rewards.coins);
        self.stars = self.stars.saturating_add(rewards.stars);
        if let Some(ticket) = &rewards.ticket {
            self.tickets.push(ticket.clone());
        }
    }
}

/// Rewards credited on a single calendar day, summarized into the daily record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEarnings {
    pub date: Option<NaiveDate>,
    pub coins: i64,
    pub stars: i64,
}

impl DailyEarnings {
    /// Add `rewards` to the counter for `date`, restarting it on a new day.
    pub fn record(&mut self, date: NaiveDate, rewards: &AggregatedRewards) {
        if self.date != Some(date) {
            *self = Self {
                date: Some(date),
                ..Self::default()
            };
        }
        self.coins = self.coins.saturating_add(rewards.coins);
        self.stars = self.stars.saturating_add(rewards.stars);
    }

    /// Totals earned on `date`, zero when the counter belongs to another day.
    #[must_use]
    pub fn for_date(&self, date: NaiveDate) -> (i64, i64) {
        if self.date == Some(date) {
            (self.coins, self.stars)
        } else {
            (0, 0)
        }
    }
}

/// Per-user profile carrying the day-boundary watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Last calendar day the reset ran for this user.
    #[serde(default)]
    pub last_reset_date: Option<NaiveDate>,
    #[serde(default)]
    pub wallet: Wallet,
    #[serde(default)]
    pub earnings: DailyEarnings,
}

impl UserProfile {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            display_name: user_id.clone(),
            user_id,
            last_reset_date: None,
            wallet: Wallet::default(),
            earnings: DailyEarnings::default(),
        }
    }
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub last_reset_date: Option<NaiveDate>,
    pub wallet: Option<Wallet>,
    pub earnings: Option<DailyEarnings>,
}

/// One checklist item on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
}

/// Checkbox state for the current day; cleared by the reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default)]
    pub completed_task_ids: BTreeSet<String>,
    #[serde(default)]
    pub completed_subtask_ids: BTreeSet<String>,
}

impl Checklist {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed_task_ids.is_empty() && self.completed_subtask_ids.is_empty()
    }
}

/// A recurring habit track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathInstance {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default = "default_archetype")]
    pub archetype: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub tasks: Vec<PathTask>,
    #[serde(default)]
    pub checklist: Checklist,
    #[serde(default)]
    pub streak: StreakState,
    /// Instant of the most recent fully-completed day.
    #[serde(default)]
    pub last_completed_at: Option<DateTime<Utc>>,
}

fn default_archetype() -> String {
    DEFAULT_ARCHETYPE.to_string()
}

const fn default_active() -> bool {
    true
}

impl PathInstance {
    #[must_use]
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            archetype: default_archetype(),
            is_active: true,
            tasks: Vec::new(),
            checklist: Checklist::default(),
            streak: StreakState::default(),
            last_completed_at: None,
        }
    }

    #[must_use]
    pub fn with_task(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.tasks.push(PathTask {
            id: id.into(),
            title: title.into(),
            subtasks: Vec::new(),
        });
        self
    }

    #[must_use]
    pub fn with_streak(mut self, streak: StreakState) -> Self {
        self.streak = streak;
        self
    }

    #[must_use]
    pub const fn current_streak(&self) -> u32 {
        self.streak.current_streak
    }

    #[must_use]
    pub const fn current_level(&self) -> u32 {
        self.streak.current_level
    }

    #[must_use]
    pub fn has_task(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|task| task.id == task_id)
    }

    /// The task owning `subtask_id`, if any.
    #[must_use]
    pub fn subtask_owner(&self, subtask_id: &str) -> Option<&PathTask> {
        self.tasks
            .iter()
            .find(|task| task.subtasks.iter().any(|sub| sub.id == subtask_id))
    }

    /// `(total, completed)` task counts against the current checklist.
    #[must_use]
    pub fn task_counts(&self) -> (u32, u32) {
        let completed = self
            .tasks
            .iter()
            .filter(|task| self.checklist.completed_task_ids.contains(&task.id))
            .count();
        (len_to_u32(self.tasks.len()), len_to_u32(completed))
    }
}

/// Lifecycle position of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    #[default]
    Backlog,
    Today,
    Completed,
}

impl QuestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Today => "today",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(Self::Backlog),
            "today" => Ok(Self::Today),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestSubtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Rewards a user attached to a quest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRewards {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub stars: i64,
}

/// A one-off or recurring task outside the streak system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: QuestStatus,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub subtasks: Vec<QuestSubtask>,
    #[serde(default)]
    pub custom_rewards: CustomRewards,
    /// Completion stamps; recurring quests accumulate one per completed day.
    #[serde(default)]
    pub completions: Vec<QuestCompletionStamp>,
}

/// A quest completion, keyed by the user's local day rather than the UTC date of `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCompletionStamp {
    pub day: NaiveDate,
    pub at: DateTime<Utc>,
}

impl Quest {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            date,
            status: QuestStatus::Today,
            is_recurring: false,
            subtasks: Vec::new(),
            custom_rewards: CustomRewards::default(),
            completions: Vec::new(),
        }
    }

    #[must_use]
    pub const fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: QuestStatus) -> Self {
        self.status = status;
        self
    }

    /// Completed one-off quests never move again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_recurring && matches!(self.status, QuestStatus::Completed)
    }

    /// Whether the quest was completed on `date`.
    #[must_use]
    pub fn completed_on(&self, date: NaiveDate) -> bool {
        self.completions
            .iter()
            .any(|stamp| stamp.day == date)
    }
}

/// Partial quest update written by migration and completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestUpdate {
    pub date: Option<NaiveDate>,
    pub status: Option<QuestStatus>,
    pub completed_at: Option<QuestCompletionStamp>,
}

/// One path's line in a daily record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDailyStat {
    pub path_id: String,
    pub path_name: String,
    pub completed_count: u32,
    pub total_count: u32,
    pub streak_before: u32,
    pub streak_after: u32,
    /// Yesterday's entry was missing or short of 100%, so the streak was broken,
    /// even when it was already zero.
    #[serde(default)]
    pub was_reset: bool,
}

/// Immutable snapshot of a finished day, shown in the dawn summary and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub path_stats: Vec<PathDailyStat>,
    pub quests_completed: u32,
    pub quests_total: u32,
    pub coins_earned: i64,
    pub stars_earned: i64,
    pub created_at: DateTime<Utc>,
}

impl DailyRecord {
    /// Paths whose every task was completed that day.
    #[must_use]
    pub fn perfect_paths(&self) -> usize {
        self.path_stats
            .iter()
            .filter(|stat| stat.total_count > 0 && stat.completed_count >= stat.total_count)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn earnings_restart_on_new_day() {
        let mut earnings = DailyEarnings::default();
        let rewards = AggregatedRewards {
            coins: 30,
            stars: 1,
            ticket: None,
        };
        earnings.record(day(1), &rewards);
        earnings.record(day(1), &rewards);
        assert_eq!(earnings.for_date(day(1)), (60, 2));
        earnings.record(day(2), &rewards);
        assert_eq!(earnings.for_date(day(2)), (30, 1));
        assert_eq!(earnings.for_date(day(1)), (0, 0));
    }

    #[test]
    fn wallet_credits_tickets() {
        let mut wallet = Wallet::default();
        wallet.credit(&AggregatedRewards {
            coins: 5,
            stars: 0,
            ticket: Some("ticket.treat".to_string()),
        });
        assert_eq!(wallet.coins, 5);
        assert_eq!(wallet.tickets, vec!["ticket.treat".to_string()]);
    }

    #[test]
    fn task_counts_ignore_unknown_ids() {
        let mut path = PathInstance::new("p1", "u1", "Morning")
            .with_task("t1", "Stretch")
            .with_task("t2", "Read");
        path.checklist.completed_task_ids.insert("t1".to_string());
        path.checklist.completed_task_ids.insert("ghost".to_string());
        assert_eq!(path.task_counts(), (2, 1));
    }

    #[test]
    fn quest_status_parses() {
        assert_eq!("today".parse::<QuestStatus>(), Ok(QuestStatus::Today));
        assert!("later".parse::<QuestStatus>().is_err());
        let quest = Quest::new("q", "u", "Call", day(3)).with_status(QuestStatus::Completed);
        assert!(quest.is_terminal());
        assert!(!quest.clone().recurring().is_terminal());
    }

    #[test]
    fn path_deserializes_with_defaults() {
        let json = r#"{ "id": "p", "user_id": "u", "name": "Run" }"#;
        let path: PathInstance = serde_json::from_str(json).unwrap();
        assert!(path.is_active);
        assert_eq!(path.archetype, DEFAULT_ARCHETYPE);
        assert_eq!(path.current_level(), 1);
        assert_eq!(path.current_streak(), 0);
    }
}
