//! Snapshot persistence
//!
//! A snapshot is wrapped in an envelope before it reaches the gateway:
//!
//! ```json
//! { "version": 2, "checksum": "<sha3-256 hex of payload>", "payload": "<json>" }
//! ```
//!
//! The payload is kept as text so the checksum covers the exact bytes that
//! were written. Decoding verifies the checksum, migrates old versions
//! forward and only then deserializes.

mod gateway;
mod migration;

pub use gateway::{FileGateway, MemoryGateway, PersistenceGateway, PersistenceResult};
pub use migration::{
    migrate_payload, MigrationError, CURRENT_SNAPSHOT_VERSION, MIN_SUPPORTED_VERSION,
};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;

use crate::achievements::AchievementProgress;
use crate::difficulty::AdaptiveState;
use crate::error::PersistenceError;
use crate::progression::Character;
use crate::scheduler::TopicMastery;
use crate::skills::SkillTreeProgress;

/// Everything needed to rebuild a learner's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSnapshot {
    pub character: Character,
    #[serde(default)]
    pub skill_trees: Vec<SkillTreeProgress>,
    #[serde(default)]
    pub achievements: Vec<AchievementProgress>,
    #[serde(default)]
    pub topic_mastery: BTreeMap<String, TopicMastery>,
    #[serde(default)]
    pub adaptive: Option<AdaptiveState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    checksum: String,
    payload: String,
}

/// Hex-encoded Sha3-256 digest
pub fn checksum(payload: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(payload.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn encode_snapshot(snapshot: &ProgressionSnapshot) -> Result<String, PersistenceError> {
    let payload = serde_json::to_string(snapshot)?;
    let envelope = SnapshotEnvelope {
        version: CURRENT_SNAPSHOT_VERSION,
        checksum: checksum(&payload),
        payload,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Verify, migrate and deserialize an envelope
pub fn decode_snapshot(text: &str) -> Result<ProgressionSnapshot, PersistenceError> {
    let envelope: SnapshotEnvelope = serde_json::from_str(text)?;
    let actual = checksum(&envelope.payload);
    if actual != envelope.checksum {
        return Err(PersistenceError::Corrupt(format!(
            "checksum mismatch: expected {}, found {}",
            envelope.checksum, actual
        )));
    }
    let mut payload: serde_json::Value = serde_json::from_str(&envelope.payload)?;
    migrate_payload(&mut payload, envelope.version)?;
    Ok(serde_json::from_value(payload)?)
}

/// Wrap an arbitrary payload at a given version. Used to produce snapshots
/// in older formats.
pub fn seal_payload(version: u32, payload: &str) -> Result<String, PersistenceError> {
    let envelope = SnapshotEnvelope {
        version,
        checksum: checksum(payload),
        payload: payload.to_string(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}
