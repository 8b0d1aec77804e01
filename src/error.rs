use thiserror::Error;

use crate::persistence::MigrationError;

/// Data-integrity faults. Ordinary rejections (not enough points, level too
/// low) are `false` returns, never one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressionError {
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    #[error("Unknown achievement: {0}")]
    UnknownAchievement(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, ProgressionError>;
