//! End-to-end persistence tests: engine state written through a
//! FileGateway, reopened, tampered with and migrated.

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use learnquest_core::catalog::Catalog;
use learnquest_core::clock::FixedClock;
use learnquest_core::config::ProgressionConfig;
use learnquest_core::difficulty::SessionMetrics;
use learnquest_core::error::EngineError;
use learnquest_core::persistence::{
    decode_snapshot, seal_payload, FileGateway, PersistenceGateway, CURRENT_SNAPSHOT_VERSION,
};
use learnquest_core::LearningEngine;

const DAY: u64 = 86_400;

fn open_in(dir: &TempDir, id: &str, clock: Arc<FixedClock>) -> Result<LearningEngine, EngineError> {
    let gateway = Arc::new(FileGateway::new(dir.path()).unwrap());
    LearningEngine::open(id, Catalog::default(), &ProgressionConfig::default(), gateway, clock)
}

fn metrics(accuracy: f64) -> SessionMetrics {
    SessionMetrics {
        accuracy_rate: accuracy,
        average_time_per_card_ms: 2_000.0,
        streak_performance: 4.0,
        focus_level: 0.7,
        cognitive_load: 0.5,
    }
}

// ============================================================
// Round trips
// ============================================================

#[test]
fn test_full_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(10 * DAY));

    let before = {
        let mut engine = open_in(&dir, "ada", clock.clone()).unwrap();
        for i in 0..12 {
            engine.on_game_complete(300 + 50 * i, 40, 0.9, i % 3 == 0).unwrap();
        }
        engine.record_review_result("fractions", 5).unwrap();
        engine.record_review_result("fractions", 4).unwrap();
        engine.record_review_result("capitals", 2).unwrap();
        engine.complete_session("fractions", &metrics(0.85)).unwrap();
        let available: Vec<String> = engine
            .progression()
            .available_skills()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for id in &available {
            engine.unlock_skill(id).unwrap();
        }
        engine.snapshot()
    };

    let engine = open_in(&dir, "ada", clock).unwrap();
    let after = engine.snapshot();
    assert_eq!(after.character, before.character);
    assert_eq!(after.skill_trees, before.skill_trees);
    assert_eq!(after.achievements, before.achievements);
    assert_eq!(after.topic_mastery, before.topic_mastery);
    assert_eq!(
        after.adaptive.as_ref().map(|a| &a.topics),
        before.adaptive.as_ref().map(|a| &a.topics)
    );
}

#[test]
fn test_each_character_gets_its_own_file() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(0));
    let mut ada = open_in(&dir, "ada", clock.clone()).unwrap();
    let mut grace = open_in(&dir, "grace", clock).unwrap();

    ada.on_game_complete(500, 90, 0.8, false).unwrap();
    grace.on_game_complete(100, 90, 0.4, false).unwrap();
    grace.on_game_complete(100, 90, 0.4, false).unwrap();

    let gateway = FileGateway::new(dir.path()).unwrap();
    assert!(gateway.path_for("ada").exists());
    assert!(gateway.path_for("grace").exists());
    let ada_snap = decode_snapshot(&gateway.load("ada").unwrap().unwrap()).unwrap();
    let grace_snap = decode_snapshot(&gateway.load("grace").unwrap().unwrap()).unwrap();
    assert_eq!(ada_snap.character.counters.completed_challenges, 1);
    assert_eq!(grace_snap.character.counters.completed_challenges, 2);
}

#[test]
fn test_keys_are_sanitized() {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).unwrap();
    let path = gateway.path_for("../../etc/passwd");
    assert_eq!(path.parent(), Some(dir.path()));
    assert_eq!(path.file_name().unwrap(), "______etc_passwd.json");
}

#[test]
fn test_review_due_after_restart() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(0));
    {
        let mut engine = open_in(&dir, "ada", clock.clone()).unwrap();
        engine.record_review_result("fractions", 5).unwrap();
        engine.record_review_result("photosynthesis", 1).unwrap();
    }
    clock.advance(DAY);
    let engine = open_in(&dir, "ada", clock).unwrap();
    let due: Vec<&str> = engine
        .due_topics()
        .iter()
        .map(|t| t.topic_id.as_str())
        .collect();
    assert_eq!(due, vec!["fractions", "photosynthesis"]);
}

// ============================================================
// Damaged or foreign data
// ============================================================

#[test]
fn test_tampered_file_starts_fresh_then_overwrites() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(0));
    {
        let mut engine = open_in(&dir, "ada", clock.clone()).unwrap();
        engine.on_game_complete(2_000, 30, 1.0, false).unwrap();
    }
    let gateway = FileGateway::new(dir.path()).unwrap();
    let path = gateway.path_for("ada");
    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("completed_challenges", "completed_challengez")).unwrap();

    let mut engine = open_in(&dir, "ada", clock).unwrap();
    assert_eq!(engine.progression().character().total_experience, 0);

    engine.on_game_complete(100, 90, 0.5, false).unwrap();
    let snap = decode_snapshot(&gateway.load("ada").unwrap().unwrap()).unwrap();
    assert_eq!(snap.character.counters.completed_challenges, 1);
}

#[test]
fn test_future_version_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).unwrap();
    let text = seal_payload(CURRENT_SNAPSHOT_VERSION + 1, r#"{"character":{}}"#).unwrap();
    gateway.save("ada", &text).unwrap();

    let engine = open_in(&dir, "ada", Arc::new(FixedClock::new(0))).unwrap();
    assert_eq!(engine.progression().character().level, 1);
    // opening alone never rewrites the file
    assert_eq!(gateway.load("ada").unwrap().unwrap(), text);
}

#[test]
fn test_non_utf8_file_starts_fresh_then_overwrites() {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).unwrap();
    fs::write(gateway.path_for("ada"), [0xff, 0xfe, 0x00, 0x7b]).unwrap();

    let mut engine = open_in(&dir, "ada", Arc::new(FixedClock::new(0))).unwrap();
    assert_eq!(engine.progression().character().level, 1);

    engine.record_review_result("fractions", 4).unwrap();
    let snap = decode_snapshot(&gateway.load("ada").unwrap().unwrap()).unwrap();
    assert!(snap.topic_mastery.contains_key("fractions"));
}

#[test]
fn test_unreadable_storage_is_an_error() {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).unwrap();
    fs::create_dir(gateway.path_for("ada")).unwrap();

    let result = open_in(&dir, "ada", Arc::new(FixedClock::new(0)));
    assert!(matches!(result, Err(EngineError::Persistence(_))));
}

// ============================================================
// Migration
// ============================================================

#[test]
fn test_v1_file_is_migrated_on_open() {
    let dir = TempDir::new().unwrap();
    let gateway = FileGateway::new(dir.path()).unwrap();
    let v1 = json!({
        "character": {
            "id": "ada",
            "level": 4,
            "experience": 20,
            "experience_to_next": 1,
            "total_experience": 367,
            "stats": { "intellect": 10, "focus": 10, "memory": 10, "charisma": 10 },
            "skill_points": 2,
            "currency": 75
        },
        "topicMastery": {
            "fractions": {
                "topic_id": "fractions",
                "mastery_level": 0.4,
                "easiness_factor": 2.36,
                "interval_days": 6,
                "next_review_at": 0
            }
        }
    });
    gateway
        .save("ada", &seal_payload(1, &v1.to_string()).unwrap())
        .unwrap();

    let mut engine = open_in(&dir, "ada", Arc::new(FixedClock::new(0))).unwrap();
    let c = engine.progression().character();
    assert_eq!(c.level, 4);
    assert_eq!(c.currency("coins"), 75);
    assert_eq!(c.experience_to_next, engine.progression().curve().requirement(4));
    let topic = engine.scheduler().get("fractions").unwrap();
    assert_eq!(topic.repetitions, 2);
    assert_eq!(topic.interval_days, 6);

    // the next save is written in the current format
    engine.record_review_result("fractions", 5).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&gateway.load("ada").unwrap().unwrap()).unwrap();
    assert_eq!(raw["version"], json!(CURRENT_SNAPSHOT_VERSION));
    assert_eq!(engine.scheduler().get("fractions").unwrap().repetitions, 3);
}
