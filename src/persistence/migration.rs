//! Snapshot payload migration
//!
//! Payloads carry the version of the envelope they were written under.
//! Migrations run forward one step at a time, v(N) → v(N+1) → ... →
//! [`CURRENT_SNAPSHOT_VERSION`]. A payload from a newer build is refused
//! rather than downgraded.

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

/// Current snapshot format version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 2;

/// Oldest version that can still be migrated
pub const MIN_SUPPORTED_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    #[error("snapshot version {found} is newer than supported version {supported}")]
    FutureVersion { found: u32, supported: u32 },

    #[error("snapshot version {found} is older than minimum version {minimum}")]
    TooOldVersion { found: u32, minimum: u32 },

    #[error("migration from version {from_version} failed: {detail}")]
    StepFailed { from_version: u32, detail: String },
}

/// Migrate `payload` from `version` to the current version. Returns the
/// descriptions of the steps applied.
pub fn migrate_payload(payload: &mut Value, version: u32) -> Result<Vec<String>, MigrationError> {
    if version > CURRENT_SNAPSHOT_VERSION {
        return Err(MigrationError::FutureVersion {
            found: version,
            supported: CURRENT_SNAPSHOT_VERSION,
        });
    }
    if version < MIN_SUPPORTED_VERSION {
        return Err(MigrationError::TooOldVersion {
            found: version,
            minimum: MIN_SUPPORTED_VERSION,
        });
    }

    let mut steps = Vec::new();
    let mut current = version;
    while current < CURRENT_SNAPSHOT_VERSION {
        let description = apply_migration_step(payload, current).map_err(|detail| {
            MigrationError::StepFailed {
                from_version: current,
                detail,
            }
        })?;
        info!(from = current, to = current + 1, step = %description, "migrated snapshot");
        steps.push(description);
        current += 1;
    }
    Ok(steps)
}

fn apply_migration_step(payload: &mut Value, from_version: u32) -> Result<String, String> {
    match from_version {
        1 => migrate_v1_to_v2(payload),
        _ => Err(format!("no migration path from version {from_version}")),
    }
}

/// v1 → v2:
/// - `character.currency` (a single coin balance) becomes `character.currencies`
/// - `topicMastery` entries gain `repetitions`, derived from their last interval
/// - adds an empty `adaptive` section
fn migrate_v1_to_v2(payload: &mut Value) -> Result<String, String> {
    let obj = payload
        .as_object_mut()
        .ok_or("snapshot payload is not an object")?;

    let character = obj
        .get_mut("character")
        .and_then(Value::as_object_mut)
        .ok_or("snapshot has no character object")?;
    if !character.contains_key("currencies") {
        let coins = character
            .remove("currency")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let mut currencies = Map::new();
        if coins > 0 {
            currencies.insert("coins".to_string(), json!(coins));
        }
        character.insert("currencies".to_string(), Value::Object(currencies));
    }

    if let Some(topics) = obj.get_mut("topicMastery").and_then(Value::as_object_mut) {
        for topic in topics.values_mut() {
            let Some(topic) = topic.as_object_mut() else {
                return Err("topic mastery entry is not an object".to_string());
            };
            if topic.contains_key("repetitions") {
                continue;
            }
            let interval = topic
                .get("interval_days")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let repetitions = match interval {
                0 => 0,
                1 => 1,
                2..=6 => 2,
                _ => 3,
            };
            topic.insert("repetitions".to_string(), json!(repetitions));
        }
    }

    if !obj.contains_key("adaptive") {
        obj.insert("adaptive".to_string(), Value::Null);
    }

    Ok("v1→v2: currency map, review repetitions, adaptive section".to_string())
}
