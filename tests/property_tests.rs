//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - XP: experience < experience_to_next, total XP = sum of applied gains
//! - Levels: non-decreasing outside prestige
//! - Skills: rejected unlocks never mutate, accepted ones cost exactly `cost`
//! - Achievements: progress never regresses, rewards granted once
//! - Scheduler: mastery in [0, 1], failed recalls reset to one day
//! - Difficulty: recommendation always in [1, 5]

use proptest::prelude::*;
use std::sync::Arc;

use learnquest_core::achievements::{default_achievements, AchievementTracker, RequirementKind};
use learnquest_core::catalog::Catalog;
use learnquest_core::clock::FixedClock;
use learnquest_core::config::{AdaptiveConfig, ProgressionConfig};
use learnquest_core::constants::{EASINESS_MIN, SECONDS_PER_DAY};
use learnquest_core::difficulty::{estimate_difficulty, AdaptiveDifficultyEstimator, SessionMetrics};
use learnquest_core::events::{ExperienceSource, ProgressionEvent};
use learnquest_core::progression::CharacterProgression;
use learnquest_core::scheduler::SpacedRepetitionScheduler;

fn progression() -> CharacterProgression {
    CharacterProgression::new(
        "prop",
        Catalog::default(),
        &ProgressionConfig::default(),
        Arc::new(FixedClock::new(0)),
    )
    .unwrap()
}

fn applied_xp(events: &[ProgressionEvent]) -> u64 {
    events
        .iter()
        .map(|e| match e {
            ProgressionEvent::ExperienceGained { amount, .. } => *amount,
            _ => 0,
        })
        .sum()
}

fn all_skill_ids() -> Vec<String> {
    Catalog::default()
        .skill_trees
        .iter()
        .flat_map(|t| t.nodes.iter().map(|n| n.id.clone()))
        .collect()
}

// ============================================================
// Experience Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_experience_stays_normalized(amounts in prop::collection::vec(-500i64..20_000, 1..40)) {
        let mut p = progression();
        let mut applied = 0u64;
        let mut last_level = p.character().level;
        for amount in amounts {
            p.add_experience(amount, ExperienceSource::Challenge);
            applied += applied_xp(&p.drain_events());
            let c = p.character();
            prop_assert!(c.experience < c.experience_to_next,
                "experience {} >= threshold {}", c.experience, c.experience_to_next);
            prop_assert!(c.level >= last_level, "level went down without prestige");
            last_level = c.level;
        }
        prop_assert_eq!(p.character().total_experience, applied);
    }

    #[test]
    fn prop_game_completion_invariants(
        games in prop::collection::vec((0u64..5_000, 0u64..600, 0.0f64..=1.0, any::<bool>()), 1..30)
    ) {
        let mut p = progression();
        let mut applied = 0u64;
        for (i, (score, time, accuracy, multiplayer)) in games.iter().enumerate() {
            let xp = p.on_game_complete(*score, *time, *accuracy, *multiplayer);
            prop_assert!(xp >= 20);
            applied += applied_xp(&p.drain_events());
            let c = p.character();
            prop_assert!(c.is_normalized());
            prop_assert_eq!(c.counters.completed_challenges, i as u64 + 1);
            prop_assert!(c.counters.perfect_games <= c.counters.completed_challenges);
            prop_assert!(c.counters.best_streak >= c.counters.current_streak);
        }
        prop_assert_eq!(p.character().total_experience, applied);
    }

    #[test]
    fn prop_requirement_strictly_increasing(level in 1u32..200) {
        let p = progression();
        prop_assert!(p.curve().requirement(level + 1) > p.curve().requirement(level));
    }
}

// ============================================================
// Skill Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_skill_operations_respect_points(
        target_level in 1u32..9,
        ops in prop::collection::vec((any::<bool>(), 0usize..9), 1..40)
    ) {
        let ids = all_skill_ids();
        let mut p = progression();
        let xp = p.curve().cumulative(target_level) as i64;
        p.add_experience(xp, ExperienceSource::Challenge);
        for (upgrade, idx) in ops {
            let id = &ids[idx % ids.len()];
            let before = p.character().clone();
            let cost = p.skills().get(id).unwrap().cost;
            let rank = p.skills().level(id).unwrap();
            let ok = if upgrade {
                p.upgrade_skill(id).unwrap()
            } else {
                p.unlock_skill(id).unwrap()
            };
            let after = p.character();
            if ok {
                let price = if upgrade { cost * rank } else { cost };
                prop_assert_eq!(after.skill_points, before.skill_points - price);
                prop_assert!(after.unlocked_skill_ids.contains(id));
            } else {
                prop_assert_eq!(after, &before);
            }
            prop_assert!(p.skills().check_invariants());
            for tree in p.skills().trees() {
                let unlocked = tree.nodes.iter().filter(|n| n.current_level >= 1).count();
                prop_assert_eq!(tree.unlocked_count, unlocked);
            }
        }
    }
}

// ============================================================
// Achievement Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_achievement_progress_monotone(values in prop::collection::vec(0u64..150, 1..50)) {
        let mut tracker = AchievementTracker::new(default_achievements()).unwrap();
        let mut prev: Vec<u64> = tracker.achievements().iter().map(|a| a.progress()).collect();
        let mut completions = std::collections::HashMap::new();
        for value in values {
            for done in tracker.update_progress(RequirementKind::CompleteChallenges, value, 0) {
                *completions.entry(done.id).or_insert(0) += 1;
            }
            for (a, p) in tracker.achievements().iter().zip(prev.iter()) {
                prop_assert!(a.progress() >= *p, "{} regressed", a.id);
                prop_assert!(a.progress() <= a.max_progress());
                prop_assert_eq!(a.completed, a.progress() >= a.max_progress());
            }
            prev = tracker.achievements().iter().map(|a| a.progress()).collect();
        }
        for (id, count) in completions {
            prop_assert_eq!(count, 1, "{} completed more than once", id);
        }
    }
}

// ============================================================
// Scheduler Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_scheduler_bounds(qualities in prop::collection::vec(0u8..=7, 1..40)) {
        let mut s = SpacedRepetitionScheduler::new();
        let mut now = 0u64;
        for q in qualities {
            let r = s.record_review("topic", q, now);
            prop_assert!((0.0..=1.0).contains(&r.mastery_level));
            prop_assert!(r.easiness_factor >= EASINESS_MIN);
            prop_assert!(r.interval_days >= 1);
            if q < 3 {
                prop_assert_eq!(r.interval_days, 1);
            }
            prop_assert_eq!(r.next_review_at, now + r.interval_days * SECONDS_PER_DAY);
            now = r.next_review_at;
        }
    }
}

// ============================================================
// Difficulty Properties
// ============================================================

fn metrics_strategy() -> impl Strategy<Value = SessionMetrics> {
    (0.0f64..=1.0, 0.0f64..10_000.0, 0.0f64..=10.0, 0.0f64..=1.0, 0.0f64..=1.0).prop_map(
        |(accuracy_rate, average_time_per_card_ms, streak_performance, focus_level, cognitive_load)| {
            SessionMetrics {
                accuracy_rate,
                average_time_per_card_ms,
                streak_performance,
                focus_level,
                cognitive_load,
            }
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_difficulty_in_range(
        preferred in 1.0f64..=5.0,
        metrics in metrics_strategy(),
        neuro in 0.3f64..=1.0,
        mastery in 0.0f64..=1.0
    ) {
        let e = estimate_difficulty(preferred, &metrics, neuro, mastery);
        prop_assert!((1..=5).contains(&e.difficulty));
        prop_assert!(e.raw.is_finite());
    }

    #[test]
    fn prop_neuroplasticity_bounded(sessions in prop::collection::vec(metrics_strategy(), 1..30)) {
        let mut est = AdaptiveDifficultyEstimator::new(&AdaptiveConfig::default());
        let mut last = None;
        for m in sessions {
            let params = est.record_session("t", &m, 0.5);
            prop_assert!((1..=5).contains(&params.difficulty));
            let n = est.neuroplasticity("t");
            prop_assert!((0.3..=1.0).contains(&n));
            if let Some(prev) = last {
                prop_assert!(n >= prev, "neuroplasticity decreased");
            }
            last = Some(n);
        }
    }
}
