//! Seeded multi-day simulation over an in-memory store.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use questline_engine::numbers::len_to_u32;
use questline_engine::{
    ChecklistItem, DayChangeOutcome, EngineConfig, FixedClock, MemoryStore, MilestoneCatalog,
    PathInstance, ProgressStore, QuestlineEngine, UserProfile, average_task_rate,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

const SIM_USER: &str = "sim";

/// Configuration for a simulation session.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub days: u32,
    pub completion_rate: f64,
    pub paths: u32,
    pub tasks_per_path: u32,
    pub auto_level_up: bool,
    pub start: NaiveDate,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(seed: u64, start: NaiveDate) -> Self {
        Self {
            seed,
            days: 30,
            completion_rate: 0.8,
            paths: 3,
            tasks_per_path: 3,
            auto_level_up: true,
            start,
        }
    }

    #[must_use]
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    #[must_use]
    pub fn with_completion_rate(mut self, rate: f64) -> Self {
        self.completion_rate = rate.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_paths(mut self, paths: u32) -> Self {
        self.paths = paths.max(1);
        self
    }
}

/// Final state of one simulated path.
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedPath {
    pub id: String,
    pub level: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub total_will: f64,
    pub prestiges: usize,
}

/// Aggregate outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub days: u32,
    pub completion_rate: f64,
    pub toggles: u32,
    pub perfect_days: u32,
    pub milestones: u32,
    pub sub_milestones: u32,
    pub prestiges: u32,
    pub streaks_broken: u32,
    pub paths_at_will_cap: u32,
    pub coins: i64,
    pub stars: i64,
    pub average_task_rate: u8,
    pub paths: Vec<SimulatedPath>,
}

/// Drive `config.days` days of toggles and resets, deterministic per seed.
pub fn run_simulation(
    config: SimulationConfig,
    engine_config: EngineConfig,
    catalog: MilestoneCatalog,
) -> Result<SimulationSummary> {
    let store = MemoryStore::new();
    store.insert_profile(UserProfile::new(SIM_USER))?;
    for p in 0..config.paths {
        let mut path = PathInstance::new(format!("path-{p}"), SIM_USER, format!("Path {p}"));
        for t in 0..config.tasks_per_path {
            path = path.with_task(format!("path-{p}-t{t}"), format!("Task {t}"));
        }
        store.put_path(path);
    }

    let engine = QuestlineEngine::new(
        store,
        FixedClock::new(config.start),
        engine_config,
        catalog,
    );
    let tracker = engine.tracker();
    let mut chronos = engine.chronos(SIM_USER);
    chronos.check_day_change();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut summary = SimulationSummary {
        seed: config.seed,
        days: config.days,
        completion_rate: config.completion_rate,
        toggles: 0,
        perfect_days: 0,
        milestones: 0,
        sub_milestones: 0,
        prestiges: 0,
        streaks_broken: 0,
        paths_at_will_cap: 0,
        coins: 0,
        stars: 0,
        average_task_rate: 0,
        paths: Vec::new(),
    };

    for day in 0..config.days {
        let paths = engine
            .store()
            .get_active_paths(SIM_USER)
            .context("loading simulated paths")?;
        for path in paths {
            for task in &path.tasks {
                if !rng.gen_bool(config.completion_rate) {
                    continue;
                }
                let outcome = tracker
                    .toggle_item(SIM_USER, &path.id, &ChecklistItem::Task(task.id.clone()), true)
                    .with_context(|| format!("day {day}: toggling {}", task.id))?;
                summary.toggles += 1;
                let Some(increment) = outcome.increment else {
                    continue;
                };
                summary.perfect_days += 1;
                summary.milestones += u32::from(increment.milestone_reached);
                summary.sub_milestones += u32::from(increment.sub_milestone_reached);
                summary.coins += outcome.rewards.coins;
                summary.stars += outcome.rewards.stars;
                if config.auto_level_up && increment.milestone_reached {
                    let level_up = tracker
                        .level_up_path(SIM_USER, &path.id)
                        .with_context(|| format!("day {day}: leveling {}", path.id))?;
                    summary.prestiges += u32::from(level_up.success);
                }
            }
        }

        engine.clock().advance_days(1);
        if let DayChangeOutcome::Reset(report) = chronos.check_day_change() {
            summary.streaks_broken += len_to_u32(
                report
                    .daily_record
                    .iter()
                    .flat_map(|record| &record.path_stats)
                    .filter(|stat| stat.was_reset)
                    .count(),
            );
            log::debug!("sim day {day}: {} errors", report.errors.len());
        }
    }

    let cap = engine.config().max_total_will;
    for path in engine.store().get_active_paths(SIM_USER)? {
        if (path.streak.total_will_earned - cap).abs() < 1e-9 {
            summary.paths_at_will_cap += 1;
        }
        summary.paths.push(SimulatedPath {
            level: path.current_level(),
            streak: path.current_streak(),
            best_streak: path.streak.max_streak,
            total_will: path.streak.total_will_earned,
            prestiges: path.streak.streak_history.len(),
            id: path.id,
        });
    }
    summary.average_task_rate = average_task_rate(&engine.history(SIM_USER)?);
    Ok(summary)
}
