//! Centralized tuning constants for the progression core.
//!
//! Values that callers may want to tune per deployment live in
//! [`crate::config::ProgressionConfig`]; the numbers here are the fixed
//! parts of the formulas and the defaults the config falls back to.

// =====================================================
// Experience curve
// =====================================================

/// XP needed to go from level 1 to level 2
pub const CURVE_BASE: f64 = 100.0;

/// Per-level growth of the XP requirement
pub const CURVE_GROWTH: f64 = 1.15;

/// Level every new character starts at (and returns to on prestige)
pub const STARTING_LEVEL: u32 = 1;

/// Skill points a brand-new character starts with
pub const STARTING_SKILL_POINTS: u32 = 0;

/// Every stat a brand-new character starts with, at this value
pub const STARTING_STAT_VALUE: i64 = 10;

/// Default stat names
pub const DEFAULT_STATS: [&str; 4] = ["intellect", "focus", "memory", "charisma"];

// =====================================================
// Game completion XP
// =====================================================

/// XP = score / SCORE_XP_DIVISOR + BASE_GAME_XP
pub const SCORE_XP_DIVISOR: u64 = 10;

/// Flat XP granted for any finished game
pub const BASE_GAME_XP: u64 = 20;

/// Multiplier for a game finished with 100% accuracy
pub const PERFECT_GAME_MULT: f64 = 1.5;

/// Multiplier for a game finished in under FAST_GAME_SECS
pub const FAST_GAME_MULT: f64 = 1.25;

/// Games shorter than this (seconds) count as fast
pub const FAST_GAME_SECS: u64 = 60;

/// Accuracy needed to extend the win streak
pub const STREAK_ACCURACY_THRESHOLD: f64 = 0.7;

// =====================================================
// Multipliers
// =====================================================

/// Ability id that boosts multiplayer-sourced XP
pub const MULTIPLAYER_ABILITY: &str = "team_synergy";

/// Multiplier granted by MULTIPLAYER_ABILITY
pub const MULTIPLAYER_XP_MULT: f64 = 1.2;

// =====================================================
// Prestige
// =====================================================

/// Minimum level to prestige
pub const PRESTIGE_MIN_LEVEL: u32 = 100;

/// Maximum number of prestiges
pub const PRESTIGE_MAX: u32 = 5;

/// Skill points after prestige = count * PRESTIGE_POINTS_PER_RANK + PRESTIGE_POINTS_BASE
pub const PRESTIGE_POINTS_PER_RANK: u32 = 5;
pub const PRESTIGE_POINTS_BASE: u32 = 10;

/// Stat bonus on prestige = count * PRESTIGE_STAT_PER_RANK + PRESTIGE_STAT_BASE
pub const PRESTIGE_STAT_PER_RANK: i64 = 2;
pub const PRESTIGE_STAT_BASE: i64 = 5;

// =====================================================
// Spaced repetition (SM-2)
// =====================================================

/// Highest recall quality
pub const MAX_RECALL_QUALITY: u8 = 5;

/// Recall below this quality is a failed review
pub const PASSING_RECALL_QUALITY: u8 = 3;

/// Interval (days) after the first successful review
pub const FIRST_INTERVAL_DAYS: u64 = 1;

/// Interval (days) after the second successful review
pub const SECOND_INTERVAL_DAYS: u64 = 6;

/// Easiness factor floor and starting value
pub const EASINESS_MIN: f64 = 1.3;
pub const EASINESS_DEFAULT: f64 = 2.5;

/// Mastery drift per quality point around the 2.5 midpoint
pub const MASTERY_STEP: f64 = 0.08;

pub const SECONDS_PER_DAY: u64 = 86_400;

// =====================================================
// Adaptive difficulty
// =====================================================

pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 5.0;

/// Recent sessions kept per topic
pub const SESSION_WINDOW: usize = 20;

/// Neuroplasticity scalar bounds
pub const NEUROPLASTICITY_MIN: f64 = 0.3;
pub const NEUROPLASTICITY_MAX: f64 = 1.0;

/// Neuroplasticity gain per unit of session accuracy
pub const NEUROPLASTICITY_GAIN: f64 = 0.05;

/// Default time limit for a session card (ms)
pub const BASE_TIME_LIMIT_MS: u64 = 30_000;
