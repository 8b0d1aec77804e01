use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reward bundle paid once when the character first reaches `level`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub level: u32,
    #[serde(default)]
    pub skill_points: u32,
    #[serde(default)]
    pub currency: BTreeMap<String, u64>,
    /// Feature ids added to `Character::unlocked_features`
    #[serde(default)]
    pub unlocks: Vec<String>,
}

impl Milestone {
    fn new(level: u32, skill_points: u32, coins: u64, unlocks: &[&str]) -> Self {
        Self {
            level,
            skill_points,
            currency: [("coins".to_string(), coins)].into_iter().collect(),
            unlocks: unlocks.iter().map(|u| u.to_string()).collect(),
        }
    }
}

/// Built-in milestones, sorted by level
pub fn default_milestones() -> Vec<Milestone> {
    vec![
        Milestone::new(5, 1, 50, &["daily_challenges"]),
        Milestone::new(10, 2, 100, &["multiplayer"]),
        Milestone::new(25, 3, 250, &["custom_decks"]),
        Milestone::new(50, 5, 500, &["tournaments"]),
        Milestone::new(100, 10, 1000, &["prestige"]),
    ]
}
