//! Business rules layered over [`StreakEngine`]: daily completion, level-up
//! preconditions, reward aggregation, and structural validation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MIN_LEVEL;
use crate::milestones::RewardBundle;
use crate::streak::{
    IncrementOutcome, StreakEngine, StreakHistoryEntry, StreakState, StreakVisualState,
    SubMilestoneGrant,
};

/// Result of processing a day's completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCompletion {
    /// Present only when the day counted toward the streak.
    pub increment: Option<IncrementOutcome>,
    pub state: StreakState,
    pub visual: StreakVisualState,
}

/// Result of a level-up request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpOutcome {
    pub success: bool,
    pub state: StreakState,
    pub archived: Option<StreakHistoryEntry>,
    pub reason: Option<LevelUpRejection>,
}

/// Why a level-up was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelUpRejection {
    MilestoneNotReached { streak: u32, required: u32 },
    MaxLevel { level: u32 },
}

impl fmt::Display for LevelUpRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MilestoneNotReached { streak, required } => {
                write!(f, "streak {streak} has not reached the {required}-day milestone")
            }
            Self::MaxLevel { level } => write!(f, "level {level} is already the maximum"),
        }
    }
}

/// Cap-aware Will award preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WillAward {
    pub actual_gain: f64,
    pub capped: bool,
    pub new_total: f64,
}

/// Optional experience gauge checked alongside the streak state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpGauge {
    pub current: i64,
    pub max: i64,
}

/// A structural invariant that a progression state violates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionViolation {
    LevelOutOfRange { level: u32, max: u32 },
    XpOutOfRange { xp: i64, max: i64 },
    StreakAboveHighWater { current: u32, max: u32 },
    WillAboveCap { total: f64, cap: f64 },
    WillInvalid { total: f64 },
}

impl fmt::Display for ProgressionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelOutOfRange { level, max } => {
                write!(f, "level {level} outside 1..={max}")
            }
            Self::XpOutOfRange { xp, max } => write!(f, "xp {xp} outside 0..={max}"),
            Self::StreakAboveHighWater { current, max } => {
                write!(f, "current streak {current} exceeds high-water mark {max}")
            }
            Self::WillAboveCap { total, cap } => {
                write!(f, "will {total:.2} exceeds cap {cap:.2}")
            }
            Self::WillInvalid { total } => write!(f, "will {total} is negative or not finite"),
        }
    }
}

/// Rewards combined across whichever milestones fired on a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRewards {
    pub coins: i64,
    pub stars: i64,
    pub ticket: Option<String>,
}

impl AggregatedRewards {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins == 0 && self.stars == 0 && self.ticket.is_none()
    }
}

/// Orchestration wrapper applying business rules around a [`StreakEngine`].
#[derive(Debug, Clone, Copy)]
pub struct ProgressionService<'a> {
    engine: StreakEngine<'a>,
}

impl<'a> ProgressionService<'a> {
    #[must_use]
    pub const fn new(engine: StreakEngine<'a>) -> Self {
        Self { engine }
    }

    #[must_use]
    pub const fn engine(&self) -> &StreakEngine<'a> {
        &self.engine
    }

    /// Count the day toward the streak when every task was completed.
    #[must_use]
    pub fn process_daily_completion(
        &self,
        state: &StreakState,
        all_tasks_complete: bool,
    ) -> DailyCompletion {
        if !all_tasks_complete {
            return DailyCompletion {
                increment: None,
                state: state.clone(),
                visual: self
                    .engine
                    .streak_visual_state(state.current_streak, state.current_level),
            };
        }
        let outcome = self.engine.increment_streak(state);
        DailyCompletion {
            visual: self.engine.streak_visual_state(
                outcome.state.current_streak,
                outcome.state.current_level,
            ),
            state: outcome.state.clone(),
            increment: Some(outcome),
        }
    }

    /// Prestige the path if its milestone has been reached.
    #[must_use]
    pub fn process_level_up(&self, state: &StreakState, now: DateTime<Utc>) -> LevelUpOutcome {
        let required = self.engine.milestone_days(state.current_level);
        let rejection = if !self
            .engine
            .has_reached_milestone(state.current_streak, state.current_level)
        {
            Some(LevelUpRejection::MilestoneNotReached {
                streak: state.current_streak,
                required,
            })
        } else if state.current_level >= self.engine.max_level() {
            Some(LevelUpRejection::MaxLevel {
                level: state.current_level,
            })
        } else {
            None
        };

        if let Some(reason) = rejection {
            return LevelUpOutcome {
                success: false,
                state: state.clone(),
                archived: None,
                reason: Some(reason),
            };
        }

        let next = self.engine.handle_prestige_reset(state, now);
        log::info!(
            "{}: level {} -> {}",
            crate::constants::LOG_PRESTIGE,
            state.current_level,
            next.current_level
        );
        LevelUpOutcome {
            success: true,
            archived: next.streak_history.last().cloned(),
            state: next,
            reason: None,
        }
    }

    #[must_use]
    pub fn calculate_will_award(&self, current_total: f64, proposed_gain: f64) -> WillAward {
        let actual_gain = self.engine.enforce_will_cap(current_total, proposed_gain);
        WillAward {
            actual_gain,
            capped: actual_gain < proposed_gain,
            new_total: crate::numbers::floor_to_hundredths(current_total + actual_gain),
        }
    }

    /// Structural invariant check; an empty list means the state is valid.
    #[must_use]
    pub fn validate_progression_state(
        &self,
        state: &StreakState,
        xp: Option<XpGauge>,
    ) -> Vec<ProgressionViolation> {
        let mut violations = Vec::new();
        let max_level = self.engine.max_level();
        if !(MIN_LEVEL..=max_level).contains(&state.current_level) {
            violations.push(ProgressionViolation::LevelOutOfRange {
                level: state.current_level,
                max: max_level,
            });
        }
        if let Some(gauge) = xp
            && (gauge.current < 0 || gauge.current > gauge.max)
        {
            violations.push(ProgressionViolation::XpOutOfRange {
                xp: gauge.current,
                max: gauge.max,
            });
        }
        if state.current_streak > state.max_streak {
            violations.push(ProgressionViolation::StreakAboveHighWater {
                current: state.current_streak,
                max: state.max_streak,
            });
        }
        let will = state.total_will_earned;
        if !will.is_finite() || will < 0.0 {
            violations.push(ProgressionViolation::WillInvalid { total: will });
        } else if will > self.engine.max_total_will() {
            violations.push(ProgressionViolation::WillAboveCap {
                total: will,
                cap: self.engine.max_total_will(),
            });
        }
        violations
    }
}

/// Sum the bundles that fired on one tick. Tickets only come from the main milestone.
#[must_use]
pub fn aggregate_rewards(
    milestone: Option<&RewardBundle>,
    sub_milestone: Option<&SubMilestoneGrant>,
) -> AggregatedRewards {
    let mut total = AggregatedRewards::default();
    if let Some(bundle) = milestone {
        total.coins += bundle.coins;
        total.stars += bundle.stars;
        total.ticket.clone_from(&bundle.ticket);
    }
    if let Some(bonus) = sub_milestone {
        total.coins += bonus.coins;
        total.stars += bonus.stars;
    }
    total
}

impl IncrementOutcome {
    /// Rewards earned by this increment.
    #[must_use]
    pub fn aggregated_rewards(&self) -> AggregatedRewards {
        aggregate_rewards(self.rewards.as_ref(), self.sub_rewards.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_TOTAL_WILL;
    use crate::streak::VisualStage;
    use chrono::TimeZone;

    fn service() -> ProgressionService<'static> {
        ProgressionService::new(StreakEngine::standard())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn incomplete_day_is_a_no_op() {
        let state = StreakState::at(4, 6);
        let result = service().process_daily_completion(&state, false);
        assert!(result.increment.is_none());
        assert_eq!(result.state, state);
        assert_eq!(result.visual.stage, VisualStage::Flame);
    }

    #[test]
    fn complete_day_increments() {
        let state = StreakState::at(1, 2);
        let result = service().process_daily_completion(&state, true);
        let increment = result.increment.expect("increment");
        assert!(increment.milestone_reached);
        assert_eq!(result.state.current_streak, 3);
        assert_eq!(result.visual.stage, VisualStage::Flame);
    }

    #[test]
    fn level_up_requires_milestone() {
        let state = StreakState::at(3, 5);
        let outcome = service().process_level_up(&state, now());
        assert!(!outcome.success);
        assert_eq!(outcome.state, state);
        assert_eq!(
            outcome.reason,
            Some(LevelUpRejection::MilestoneNotReached {
                streak: 5,
                required: 7
            })
        );
    }

    #[test]
    fn level_up_surfaces_archived_entry() {
        let state = StreakState::at(3, 7).with_will(2.4);
        let outcome = service().process_level_up(&state, now());
        assert!(outcome.success);
        assert_eq!(outcome.state.current_level, 4);
        let archived = outcome.archived.expect("history entry");
        assert_eq!(archived.level, 3);
        assert_eq!(archived.max_streak, 7);
    }

    #[test]
    fn level_up_refused_at_max_level() {
        let state = StreakState::at(10, 21);
        let outcome = service().process_level_up(&state, now());
        assert!(!outcome.success);
        assert_eq!(outcome.reason, Some(LevelUpRejection::MaxLevel { level: 10 }));
    }

    #[test]
    fn will_award_reports_capping() {
        let award = service().calculate_will_award(4.8, 0.5);
        assert!(award.capped);
        assert!((award.actual_gain - 0.2).abs() < 1e-9);
        assert!((award.new_total - MAX_TOTAL_WILL).abs() < 1e-9);

        let free = service().calculate_will_award(1.0, 0.3);
        assert!(!free.capped);
        assert!((free.new_total - 1.3).abs() < 1e-9);
    }

    #[test]
    fn validation_lists_every_violation() {
        let mut state = StreakState::at(0, 3);
        state.max_streak = 1;
        state.total_will_earned = 9.0;
        let violations =
            service().validate_progression_state(&state, Some(XpGauge { current: 12, max: 10 }));
        assert_eq!(violations.len(), 4);
        assert!(
            violations
                .iter()
                .any(|v| matches!(v, ProgressionViolation::WillAboveCap { .. }))
        );

        let healthy = StreakState::at(2, 1);
        assert!(service().validate_progression_state(&healthy, None).is_empty());

        let mut broken = StreakState::at(2, 1);
        broken.total_will_earned = f64::NAN;
        let violations = service().validate_progression_state(&broken, None);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("not finite"));
    }

    #[test]
    fn aggregation_sums_and_keeps_main_ticket() {
        let bundle = RewardBundle {
            coins: 80,
            stars: 2,
            ticket: Some("ticket.rest-day".to_string()),
        };
        let bonus = SubMilestoneGrant { coins: 25, stars: 1 };
        let both = aggregate_rewards(Some(&bundle), Some(&bonus));
        assert_eq!(both.coins, 105);
        assert_eq!(both.stars, 3);
        assert_eq!(both.ticket.as_deref(), Some("ticket.rest-day"));

        let only_sub = aggregate_rewards(None, Some(&bonus));
        assert_eq!(only_sub.ticket, None);
        assert!(aggregate_rewards(None, None).is_empty());
    }
}
