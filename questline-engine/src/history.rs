//! Trend figures derived from retained daily records.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::DailyRecord;
use crate::numbers::{len_to_u32, rounded_percentage};

/// One day's completion figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub paths_total: u32,
    pub paths_perfect: u32,
    /// Share of tracked tasks completed across every path.
    pub task_rate: u8,
    pub quests_completed: u32,
    pub streaks_broken: u32,
}

/// Per-day completion rates, oldest first.
#[must_use]
pub fn completion_trend(records: &[DailyRecord]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = records
        .iter()
        .map(|record| {
            let (done, total) = record.path_stats.iter().fold((0u32, 0u32), |acc, stat| {
                (
                    acc.0.saturating_add(stat.completed_count.min(stat.total_count)),
                    acc.1.saturating_add(stat.total_count),
                )
            });
            TrendPoint {
                date: record.date,
                paths_total: len_to_u32(record.path_stats.len()),
                paths_perfect: len_to_u32(record.perfect_paths()),
                task_rate: rounded_percentage(done, total),
                quests_completed: record.quests_completed,
                streaks_broken: len_to_u32(
                    record
                        .path_stats
                        .iter()
                        .filter(|stat| stat.was_reset)
                        .count(),
                ),
            }
        })
        .collect();
    points.sort_by_key(|point| point.date);
    points
}

/// Mean task rate across `points`, rounded; zero for an empty slice.
#[must_use]
pub fn average_task_rate(points: &[TrendPoint]) -> u8 {
    let sum: u32 = points.iter().map(|point| u32::from(point.task_rate)).sum();
    rounded_percentage(sum, len_to_u32(points.len()).saturating_mul(100))
}
