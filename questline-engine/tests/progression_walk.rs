use chrono::{TimeZone, Utc};
use questline_engine::constants::{MAX_LEVEL, MAX_TOTAL_WILL};
use questline_engine::{
    EngineConfig, LevelUpRejection, MilestoneCatalog, ProgressionService, StreakEngine,
    StreakState, VisualStage,
};

struct WalkSummary {
    milestones_per_level: Vec<u32>,
    sub_milestones: u32,
    coins: i64,
    final_state: StreakState,
    max_will_seen: f64,
}

/// Complete every day, overshooting each threshold by `overshoot` days
/// before prestiging.
fn walk(service: &ProgressionService<'_>, overshoot: u32) -> WalkSummary {
    let engine = service.engine();
    let mut state = StreakState::default();
    let mut milestones_per_level = vec![0; MAX_LEVEL as usize];
    let mut sub_milestones = 0;
    let mut coins = 0;
    let mut max_will_seen: f64 = 0.0;
    let mut day = 0;

    loop {
        let threshold = engine.milestone_days(state.current_level);
        while state.current_streak < threshold + overshoot {
            let completion = service.process_daily_completion(&state, true);
            let increment = completion.increment.expect("full day increments");
            if increment.milestone_reached {
                milestones_per_level[(state.current_level - 1) as usize] += 1;
            }
            if increment.sub_milestone_reached {
                sub_milestones += 1;
            }
            coins += increment.aggregated_rewards().coins;
            state = completion.state;
            max_will_seen = max_will_seen.max(state.total_will_earned);
            day += 1;
        }
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::days(day);
        let outcome = service.process_level_up(&state, now);
        if !outcome.success {
            assert_eq!(
                outcome.reason,
                Some(LevelUpRejection::MaxLevel { level: MAX_LEVEL })
            );
            break;
        }
        state = outcome.state;
    }

    WalkSummary {
        milestones_per_level,
        sub_milestones,
        coins,
        final_state: state,
        max_will_seen,
    }
}

#[test]
fn full_walk_fires_each_milestone_once() {
    let service = ProgressionService::new(StreakEngine::standard());
    let summary = walk(&service, 2);
    assert!(summary.milestones_per_level.iter().all(|&count| count == 1));
    // Day 7 at levels 4..=10 and day 14 at levels 7..=10.
    assert_eq!(summary.sub_milestones, 11);
    assert_eq!(summary.final_state.current_level, MAX_LEVEL);
    assert_eq!(
        summary.final_state.streak_history.len(),
        (MAX_LEVEL - 1) as usize
    );
    let milestone_coins: i64 = [30, 50, 80, 110, 150, 200, 260, 330, 410, 500].iter().sum();
    assert_eq!(summary.coins, milestone_coins + 11 * 25);
    assert!((summary.final_state.total_will_earned - 4.6).abs() < 1e-9);
    assert!(summary.max_will_seen <= MAX_TOTAL_WILL);
}

#[test]
fn tight_cap_is_never_exceeded() {
    let config = EngineConfig {
        max_total_will: 1.25,
        ..EngineConfig::default()
    };
    let catalog = MilestoneCatalog::standard();
    let service = ProgressionService::new(StreakEngine::for_archetype(catalog, "default", &config));
    let summary = walk(&service, 0);
    assert!(summary.max_will_seen <= 1.25 + 1e-9);
    assert!((summary.final_state.total_will_earned - 1.25).abs() < 1e-9);
    assert!(
        service
            .validate_progression_state(&summary.final_state, None)
            .is_empty()
    );

    let award = service.calculate_will_award(summary.final_state.total_will_earned, 0.4);
    assert!(award.capped);
    assert!(award.actual_gain.abs() < f64::EPSILON);
}

#[test]
fn low_levels_never_show_advanced_stages() {
    let engine = StreakEngine::standard();
    for level in 1..4 {
        for streak in 0..30 {
            let stage = engine.streak_visual_state(streak, level).stage;
            assert!(
                matches!(stage, VisualStage::Ember | VisualStage::Flame),
                "level {level} streak {streak} showed {stage:?}"
            );
        }
    }
}

#[test]
fn endurance_archetype_uses_its_own_table() {
    let config = EngineConfig::default();
    let catalog = MilestoneCatalog::standard();
    let endurance = StreakEngine::for_archetype(catalog, "endurance", &config);
    let fallback = StreakEngine::for_archetype(catalog, "no-such-archetype", &config);
    let first = endurance.increment_streak(&StreakState::at(1, 2));
    assert_eq!(first.rewards.map(|bundle| bundle.coins), Some(40));
    let default_first = fallback.increment_streak(&StreakState::at(1, 2));
    assert_eq!(default_first.rewards.map(|bundle| bundle.coins), Some(30));
}
