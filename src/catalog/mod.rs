//! Static catalog: skill trees, achievement templates and milestones.
//!
//! Catalogs are configuration. Only their progress fields (skill ranks,
//! achievement progress) change at runtime, and those persist through the
//! snapshot rather than the catalog file.
//!
//! ```ron
//! (
//!     skill_trees: [(id: "mind", name: "Mind", nodes: [
//!         (id: "focus", name: "Focus", tier: 1, cost: 1, max_level: 3,
//!          effects: [StatBoost(stat: "focus", amount: 1)]),
//!     ])],
//!     achievements: [],
//!     milestones: [(level: 5, skill_points: 1)],
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::achievements::{default_achievements, Achievement, AchievementTracker};
use crate::error::{ConfigError, ProgressionError, Result};
use crate::progression::{default_milestones, Milestone};
use crate::skills::{SkillEffect, SkillGraph, SkillNode, SkillTree};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub skill_trees: Vec<SkillTree>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            skill_trees: default_skill_trees(),
            achievements: default_achievements(),
            milestones: default_milestones(),
        }
    }
}

impl Catalog {
    pub fn from_ron_str(s: &str) -> std::result::Result<Self, ConfigError> {
        let catalog: Self = ron::from_str(s)?;
        catalog
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Build the runtime structures once and discard them; any integrity
    /// problem surfaces as [`ProgressionError::InvalidCatalog`]
    pub fn validate(&self) -> Result<()> {
        SkillGraph::new(self.skill_trees.clone())?;
        AchievementTracker::new(self.achievements.clone())?;
        validate_milestones(&self.milestones)
    }
}

pub(crate) fn validate_milestones(milestones: &[Milestone]) -> Result<()> {
    let mut levels = HashSet::new();
    for milestone in milestones {
        if milestone.level < 2 {
            return Err(ProgressionError::InvalidCatalog(format!(
                "milestone level {} can never be reached",
                milestone.level
            )));
        }
        if !levels.insert(milestone.level) {
            return Err(ProgressionError::InvalidCatalog(format!(
                "duplicate milestone for level {}",
                milestone.level
            )));
        }
    }
    Ok(())
}

fn skill(
    id: &str,
    name: &str,
    tier: u32,
    cost: u32,
    max_level: u32,
    prerequisites: &[&str],
    effects: Vec<SkillEffect>,
) -> SkillNode {
    SkillNode {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        tier,
        cost,
        prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        max_level,
        current_level: 0,
        effects,
    }
}

fn boost(stat: &str, amount: i64) -> SkillEffect {
    SkillEffect::StatBoost {
        stat: stat.into(),
        amount,
    }
}

/// Built-in skill trees
pub fn default_skill_trees() -> Vec<SkillTree> {
    vec![
        SkillTree {
            id: "cognition".into(),
            name: "Cognition".into(),
            nodes: vec![
                skill("focused_mind", "Focused Mind", 1, 1, 5, &[], vec![boost("focus", 1)]),
                skill("memory_palace", "Memory Palace", 1, 1, 5, &[], vec![boost("memory", 1)]),
                skill(
                    "speed_reader",
                    "Speed Reader",
                    2,
                    2,
                    3,
                    &["focused_mind"],
                    vec![SkillEffect::Ability("speed_reading".into()), boost("focus", 1)],
                ),
                skill(
                    "deep_insight",
                    "Deep Insight",
                    3,
                    3,
                    1,
                    &["speed_reader", "memory_palace"],
                    vec![SkillEffect::SpecialPower("insight".into())],
                ),
            ],
            unlocked_count: 0,
        },
        SkillTree {
            id: "social".into(),
            name: "Social".into(),
            nodes: vec![
                skill("collaborator", "Collaborator", 1, 1, 3, &[], vec![boost("charisma", 1)]),
                skill(
                    "team_synergy",
                    "Team Synergy",
                    2,
                    2,
                    1,
                    &["collaborator"],
                    vec![SkillEffect::Ability("team_synergy".into())],
                ),
                skill(
                    "mentor",
                    "Mentor",
                    3,
                    3,
                    2,
                    &["team_synergy"],
                    vec![
                        boost("charisma", 2),
                        SkillEffect::SpecialPower("mentor_aura".into()),
                    ],
                ),
            ],
            unlocked_count: 0,
        },
        SkillTree {
            id: "mastery".into(),
            name: "Mastery".into(),
            nodes: vec![
                skill("quick_study", "Quick Study", 1, 1, 5, &[], vec![boost("intellect", 1)]),
                skill(
                    "second_chance",
                    "Second Chance",
                    2,
                    2,
                    3,
                    &["quick_study"],
                    vec![
                        boost("intellect", 1),
                        SkillEffect::Ability("second_chance".into()),
                    ],
                ),
            ],
            unlocked_count: 0,
        },
    ]
}
