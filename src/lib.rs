//! LearnQuest - Progression Core Library
//!
//! The stateful progression and learning-adaptation core of the LearnQuest
//! platform:
//! - Experience curve and level-up loop, milestones, prestige
//! - Skill trees (dependency-validated DAG, rank-scaled upgrade costs)
//! - Achievements (monotone counters, exactly-once rewards)
//! - Spaced repetition review scheduling (SM-2 style)
//! - Adaptive difficulty recommendations from recent session metrics
//! - Versioned, checksummed snapshots behind a pluggable gateway
//!
//! Rendering, transport and input capture live outside this crate; the UI
//! layer calls into [`engine::LearningEngine`] and renders the
//! [`events::ProgressionEvent`]s it drains.

pub mod achievements;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod curve;
pub mod difficulty;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod persistence;
pub mod progression;
pub mod scheduler;
pub mod seasons;
pub mod skills;

pub use engine::LearningEngine;
pub use error::{ConfigError, EngineError, PersistenceError, ProgressionError};
