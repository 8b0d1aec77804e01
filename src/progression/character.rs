//! Character state
//!
//! Plain data. Every mutation goes through
//! [`CharacterProgression`](super::CharacterProgression), which keeps the
//! invariants below:
//! - `experience < experience_to_next`
//! - `unlocked_skill_ids` only holds catalog skill ids
//! - `active_skill_ids` holds exactly the abilities granted by unlocked skills

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{DEFAULT_STATS, STARTING_LEVEL, STARTING_SKILL_POINTS, STARTING_STAT_VALUE};
use crate::curve::ExperienceCurve;

/// Cumulative play counters. Achievements mirror these absolute values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub completed_challenges: u64,
    pub perfect_games: u64,
    pub multiplayer_wins: u64,
    pub total_play_time_seconds: u64,
    /// Consecutive games at or above the streak accuracy threshold
    pub current_streak: u64,
    pub best_streak: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appearance {
    pub titles: BTreeSet<String>,
    pub badges: BTreeSet<String>,
    pub active_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next: u64,
    pub total_experience: u64,
    #[serde(default)]
    pub prestige_count: u32,
    pub stats: BTreeMap<String, i64>,
    pub skill_points: u32,
    #[serde(default)]
    pub unlocked_skill_ids: BTreeSet<String>,
    #[serde(default)]
    pub active_skill_ids: BTreeSet<String>,
    #[serde(default)]
    pub currencies: BTreeMap<String, u64>,
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub appearance: Appearance,
    /// Feature ids unlocked by milestones
    #[serde(default)]
    pub unlocked_features: BTreeSet<String>,
    /// Milestone levels already paid out
    #[serde(default)]
    pub claimed_milestones: BTreeSet<u32>,
}

impl Character {
    /// Fresh character on the default curve
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_curve(id, &ExperienceCurve::default())
    }

    pub fn with_curve(id: impl Into<String>, curve: &ExperienceCurve) -> Self {
        Self {
            id: id.into(),
            level: STARTING_LEVEL,
            experience: 0,
            experience_to_next: curve.requirement(STARTING_LEVEL),
            total_experience: 0,
            prestige_count: 0,
            stats: DEFAULT_STATS
                .iter()
                .map(|s| (s.to_string(), STARTING_STAT_VALUE))
                .collect(),
            skill_points: STARTING_SKILL_POINTS,
            unlocked_skill_ids: BTreeSet::new(),
            active_skill_ids: BTreeSet::new(),
            currencies: BTreeMap::new(),
            counters: Counters::default(),
            appearance: Appearance::default(),
            unlocked_features: BTreeSet::new(),
            claimed_milestones: BTreeSet::new(),
        }
    }

    pub fn currency(&self, currency: &str) -> u64 {
        self.currencies.get(currency).copied().unwrap_or(0)
    }

    pub fn has_ability(&self, ability: &str) -> bool {
        self.active_skill_ids.contains(ability)
    }

    pub fn is_normalized(&self) -> bool {
        self.level >= 1 && self.experience < self.experience_to_next
    }
}
