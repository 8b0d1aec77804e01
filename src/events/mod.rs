//! Outbound progression events
//!
//! Every mutating operation pushes typed events onto the owning
//! [`crate::progression::CharacterProgression`]; the caller drains them with
//! `drain_events()` and forwards them to whatever renders them. Nothing here
//! calls back into user code.

use serde::{Deserialize, Serialize};

use crate::achievements::Reward;

/// Where a batch of XP came from. Only `Multiplayer` is eligible for the
/// multiplayer ability bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceSource {
    Challenge,
    Multiplayer,
    Achievement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionEvent {
    ExperienceGained {
        /// Amount before multipliers
        base: u64,
        /// Amount actually added
        amount: u64,
        source: ExperienceSource,
    },
    LevelUp {
        level: u32,
        skill_points_granted: u32,
    },
    MilestoneReached {
        level: u32,
        skill_points: u32,
        unlocks: Vec<String>,
    },
    AchievementCompleted {
        achievement_id: String,
        name: String,
        rewards: Vec<Reward>,
    },
    SkillUnlocked {
        skill_id: String,
    },
    SkillUpgraded {
        skill_id: String,
        level: u32,
    },
    PrestigeCompleted {
        prestige_count: u32,
        skill_points: u32,
        relocked: Vec<String>,
    },
}

impl ProgressionEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExperienceGained { .. } => "experience_gained",
            Self::LevelUp { .. } => "level_up",
            Self::MilestoneReached { .. } => "milestone_reached",
            Self::AchievementCompleted { .. } => "achievement_completed",
            Self::SkillUnlocked { .. } => "skill_unlocked",
            Self::SkillUpgraded { .. } => "skill_upgraded",
            Self::PrestigeCompleted { .. } => "prestige_completed",
        }
    }
}
