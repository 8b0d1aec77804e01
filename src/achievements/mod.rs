//! Achievement System
//!
//! Achievements are quantitative goals over the character's cumulative
//! counters ("complete 10 challenges", "reach level 25"). Each requirement
//! mirrors an absolute counter, so progress is clamped to never regress
//! even when fed a stale value.
//!
//! Completion is a one-way latch: the first time every requirement is met
//! the achievement is marked completed and its rewards are handed back to
//! the caller exactly once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::{ProgressionError, Result};

/// Fixed requirement taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    CompleteChallenges,
    ReachLevel,
    WinMultiplayer,
    PerfectGames,
    Streak,
    Playtime,
}

impl RequirementKind {
    pub const ALL: [RequirementKind; 6] = [
        Self::CompleteChallenges,
        Self::ReachLevel,
        Self::WinMultiplayer,
        Self::PerfectGames,
        Self::Streak,
        Self::Playtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompleteChallenges => "complete_challenges",
            Self::ReachLevel => "reach_level",
            Self::WinMultiplayer => "win_multiplayer",
            Self::PerfectGames => "perfect_games",
            Self::Streak => "streak",
            Self::Playtime => "playtime",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AchievementCategory {
    Learning,    // challenge completion
    Progression, // levels
    Social,      // multiplayer
    Mastery,     // perfect games, streaks
    Dedication,  // time played
}

/// Reward handed out when an achievement completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reward {
    Experience(u64),
    Currency { currency: String, amount: u64 },
    SkillPoints(u32),
    Title(String),
    Badge(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub target: u64,
    #[serde(default)]
    pub current: u64,
}

impl Requirement {
    pub fn is_met(&self) -> bool {
        self.current >= self.target
    }
}

/// A single achievement definition plus its progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: AchievementCategory,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub hidden: bool, // not shown until completed
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<u64>,
}

impl Achievement {
    pub fn progress(&self) -> u64 {
        self.requirements
            .iter()
            .map(|r| r.current.min(r.target))
            .sum()
    }

    pub fn max_progress(&self) -> u64 {
        self.requirements.iter().map(|r| r.target).sum()
    }

    pub fn progress_percent(&self) -> f32 {
        let max = self.max_progress();
        if max == 0 {
            return 1.0;
        }
        (self.progress() as f32 / max as f32).min(1.0)
    }

    pub fn is_met(&self) -> bool {
        self.requirements.iter().all(Requirement::is_met)
    }

    fn latch(&mut self, timestamp: u64) -> CompletedAchievement {
        self.completed = true;
        self.completed_at = Some(timestamp);
        CompletedAchievement {
            id: self.id.clone(),
            name: self.name.clone(),
            rewards: self.rewards.clone(),
        }
    }
}

/// Handed back once per achievement, ever
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAchievement {
    pub id: String,
    pub name: String,
    pub rewards: Vec<Reward>,
}

/// Persisted progress for one achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementProgress {
    pub id: String,
    pub requirements: BTreeMap<RequirementKind, u64>,
    pub completed: bool,
    pub completed_at: Option<u64>,
}

/// The character's achievement tracker
#[derive(Debug, Clone)]
pub struct AchievementTracker {
    achievements: Vec<Achievement>,
    by_kind: HashMap<RequirementKind, Vec<usize>>,
    total_completed: u32,
}

impl AchievementTracker {
    /// Validate definitions and index them by requirement kind
    pub fn new(achievements: Vec<Achievement>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut by_kind: HashMap<RequirementKind, Vec<usize>> = HashMap::new();
        for (i, ach) in achievements.iter().enumerate() {
            if !ids.insert(ach.id.as_str()) {
                return Err(invalid(format!("duplicate achievement id '{}'", ach.id)));
            }
            if ach.requirements.is_empty() {
                return Err(invalid(format!("achievement '{}' has no requirements", ach.id)));
            }
            let mut kinds = HashSet::new();
            for req in &ach.requirements {
                if req.target == 0 {
                    return Err(invalid(format!(
                        "achievement '{}' has a zero {} target",
                        ach.id,
                        req.kind.as_str()
                    )));
                }
                if !kinds.insert(req.kind) {
                    return Err(invalid(format!(
                        "achievement '{}' repeats requirement {}",
                        ach.id,
                        req.kind.as_str()
                    )));
                }
                by_kind.entry(req.kind).or_default().push(i);
            }
        }
        let total_completed = achievements.iter().filter(|a| a.completed).count() as u32;
        Ok(Self {
            achievements,
            by_kind,
            total_completed,
        })
    }

    /// Mirror an absolute counter into every incomplete achievement that
    /// tracks it. Returns the achievements this call completed.
    pub fn update_progress(
        &mut self,
        kind: RequirementKind,
        value: u64,
        timestamp: u64,
    ) -> Vec<CompletedAchievement> {
        let mut newly_completed = Vec::new();
        let Some(indices) = self.by_kind.get(&kind) else {
            return newly_completed;
        };
        for &i in indices {
            let ach = &mut self.achievements[i];
            if ach.completed {
                continue;
            }
            for req in ach.requirements.iter_mut().filter(|r| r.kind == kind) {
                if value < req.current {
                    debug!(achievement = %ach.id, kind = kind.as_str(), value, current = req.current, "ignoring stale progress");
                }
                req.current = req.current.max(value).min(req.target);
            }
            if ach.is_met() {
                info!(achievement = %ach.id, "achievement completed");
                newly_completed.push(ach.latch(timestamp));
            }
        }
        self.total_completed += newly_completed.len() as u32;
        newly_completed
    }

    /// Force-complete an achievement. `Ok(None)` if it was already completed.
    pub fn complete(
        &mut self,
        achievement_id: &str,
        timestamp: u64,
    ) -> Result<Option<CompletedAchievement>> {
        let ach = self
            .achievements
            .iter_mut()
            .find(|a| a.id == achievement_id)
            .ok_or_else(|| ProgressionError::UnknownAchievement(achievement_id.to_string()))?;
        if ach.completed {
            debug!(achievement = achievement_id, "already completed");
            return Ok(None);
        }
        for req in &mut ach.requirements {
            req.current = req.target;
        }
        self.total_completed += 1;
        info!(achievement = achievement_id, "achievement completed");
        Ok(Some(ach.latch(timestamp)))
    }

    pub fn get(&self, achievement_id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == achievement_id)
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    /// Achievements the player may see: all visible ones plus completed hidden ones
    pub fn visible(&self) -> Vec<&Achievement> {
        self.achievements
            .iter()
            .filter(|a| !a.hidden || a.completed)
            .collect()
    }

    pub fn by_category(&self, category: AchievementCategory) -> Vec<&Achievement> {
        self.achievements
            .iter()
            .filter(|a| a.category == category)
            .collect()
    }

    pub fn completed_count(&self) -> u32 {
        self.total_completed
    }

    pub fn completion_percent(&self) -> f32 {
        if self.achievements.is_empty() {
            return 0.0;
        }
        self.total_completed as f32 / self.achievements.len() as f32
    }

    pub fn progress(&self) -> Vec<AchievementProgress> {
        self.achievements
            .iter()
            .map(|a| AchievementProgress {
                id: a.id.clone(),
                requirements: a.requirements.iter().map(|r| (r.kind, r.current)).collect(),
                completed: a.completed,
                completed_at: a.completed_at,
            })
            .collect()
    }

    /// Restore persisted progress. Progress only ever moves forward and
    /// completed achievements stay completed without re-granting rewards.
    /// An entry whose requirements are all met but which was never latched
    /// is completed now and returned so its rewards can be granted once.
    pub fn restore(
        &mut self,
        progress: &[AchievementProgress],
        timestamp: u64,
    ) -> Vec<CompletedAchievement> {
        let mut pending = Vec::new();
        for saved in progress {
            let Some(ach) = self.achievements.iter_mut().find(|a| a.id == saved.id) else {
                warn!(achievement = %saved.id, "ignoring unknown achievement in snapshot");
                continue;
            };
            if ach.completed {
                continue;
            }
            for req in &mut ach.requirements {
                if let Some(value) = saved.requirements.get(&req.kind) {
                    req.current = req.current.max(*value).min(req.target);
                }
            }
            if saved.completed {
                for req in &mut ach.requirements {
                    req.current = req.target;
                }
                ach.completed = true;
                ach.completed_at = saved.completed_at.or(Some(timestamp));
            } else if ach.is_met() {
                warn!(achievement = %ach.id, "completing achievement left unlatched in snapshot");
                pending.push(ach.latch(timestamp));
            }
        }
        self.total_completed = self.achievements.iter().filter(|a| a.completed).count() as u32;
        pending
    }
}

fn invalid(detail: String) -> ProgressionError {
    ProgressionError::InvalidCatalog(detail)
}

fn single(
    id: &str,
    name: &str,
    description: &str,
    category: AchievementCategory,
    kind: RequirementKind,
    target: u64,
    rewards: Vec<Reward>,
) -> Achievement {
    Achievement {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        category,
        requirements: vec![Requirement {
            kind,
            target,
            current: 0,
        }],
        rewards,
        hidden: false,
        completed: false,
        completed_at: None,
    }
}

/// Built-in achievements
pub fn default_achievements() -> Vec<Achievement> {
    use AchievementCategory::*;
    use RequirementKind::*;

    let coins = |amount| Reward::Currency {
        currency: "coins".into(),
        amount,
    };

    let mut list = vec![
        // === Learning ===
        single(
            "first_victory",
            "First Victory",
            "Complete your first challenge.",
            Learning,
            CompleteChallenges,
            1,
            vec![Reward::Experience(50), coins(10)],
        ),
        single(
            "dedicated_learner",
            "Dedicated Learner",
            "Complete 10 challenges.",
            Learning,
            CompleteChallenges,
            10,
            vec![Reward::Experience(200), Reward::SkillPoints(1)],
        ),
        single(
            "scholar",
            "Scholar",
            "Complete 100 challenges.",
            Learning,
            CompleteChallenges,
            100,
            vec![Reward::Title("Scholar".into()), coins(250)],
        ),
        // === Progression ===
        single(
            "rising_star",
            "Rising Star",
            "Reach level 10.",
            Progression,
            ReachLevel,
            10,
            vec![Reward::SkillPoints(2), Reward::Badge("rising_star".into())],
        ),
        single(
            "veteran",
            "Veteran",
            "Reach level 50.",
            Progression,
            ReachLevel,
            50,
            vec![Reward::Title("Veteran".into()), coins(500)],
        ),
        // === Social ===
        single(
            "team_player",
            "Team Player",
            "Win 5 multiplayer challenges.",
            Social,
            WinMultiplayer,
            5,
            vec![Reward::Experience(150), Reward::Badge("team_player".into())],
        ),
        // === Mastery ===
        single(
            "perfectionist",
            "Perfectionist",
            "Finish 5 challenges with perfect accuracy.",
            Mastery,
            PerfectGames,
            5,
            vec![Reward::SkillPoints(2)],
        ),
        single(
            "on_fire",
            "On Fire",
            "Reach a streak of 10 strong games.",
            Mastery,
            Streak,
            10,
            vec![Reward::Experience(300), Reward::Title("Unstoppable".into())],
        ),
        // === Dedication ===
        single(
            "marathon",
            "Marathon",
            "Spend 10 hours in challenges.",
            Dedication,
            Playtime,
            36_000,
            vec![Reward::Badge("marathon".into()), coins(100)],
        ),
    ];

    let mut polymath = single(
        "polymath",
        "Polymath",
        "Complete 50 challenges, 10 of them perfect.",
        Mastery,
        CompleteChallenges,
        50,
        vec![Reward::Currency {
            currency: "gems".into(),
            amount: 5,
        }],
    );
    polymath.requirements.push(Requirement {
        kind: PerfectGames,
        target: 10,
        current: 0,
    });
    polymath.hidden = true;
    list.push(polymath);

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> AchievementTracker {
        AchievementTracker::new(default_achievements()).unwrap()
    }

    #[test]
    fn test_tracker_initialization() {
        let tracker = tracker();
        assert!(!tracker.achievements().is_empty());
        assert_eq!(tracker.completed_count(), 0);
        assert!((tracker.completion_percent() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_first_victory_completes_once() {
        let mut tracker = tracker();
        let done = tracker.update_progress(RequirementKind::CompleteChallenges, 1, 1000);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "first_victory");
        assert!(!done[0].rewards.is_empty());

        let ach = tracker.get("first_victory").unwrap();
        assert!(ach.completed);
        assert_eq!(ach.completed_at, Some(1000));
        assert_eq!(ach.progress(), ach.max_progress());

        let again = tracker.update_progress(RequirementKind::CompleteChallenges, 1, 2000);
        assert!(again.is_empty(), "Should not complete twice");
        assert_eq!(tracker.get("first_victory").unwrap().completed_at, Some(1000));
        assert_eq!(tracker.completed_count(), 1);
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut tracker = tracker();
        tracker.update_progress(RequirementKind::CompleteChallenges, 7, 0);
        assert_eq!(tracker.get("dedicated_learner").unwrap().progress(), 7);
        tracker.update_progress(RequirementKind::CompleteChallenges, 3, 0);
        assert_eq!(tracker.get("dedicated_learner").unwrap().progress(), 7);
    }

    #[test]
    fn test_progress_clamped_to_max() {
        let mut tracker = tracker();
        tracker.update_progress(RequirementKind::CompleteChallenges, 500, 0);
        let ach = tracker.get("dedicated_learner").unwrap();
        assert_eq!(ach.progress(), 10);
        assert!(ach.completed);
    }

    #[test]
    fn test_only_matching_kind_updates() {
        let mut tracker = tracker();
        tracker.update_progress(RequirementKind::Playtime, 100, 0);
        assert_eq!(tracker.get("first_victory").unwrap().progress(), 0);
        assert_eq!(tracker.get("marathon").unwrap().progress(), 100);
    }

    #[test]
    fn test_multi_requirement() {
        let mut tracker = tracker();
        tracker.update_progress(RequirementKind::CompleteChallenges, 60, 0);
        let poly = tracker.get("polymath").unwrap();
        assert!(!poly.completed);
        assert_eq!(poly.progress(), 50);
        assert_eq!(poly.max_progress(), 60);

        let done = tracker.update_progress(RequirementKind::PerfectGames, 10, 5);
        assert!(done.iter().any(|a| a.id == "polymath"));
    }

    #[test]
    fn test_manual_complete() {
        let mut tracker = tracker();
        let first = tracker.complete("veteran", 10).unwrap();
        assert!(first.is_some());
        let veteran = tracker.get("veteran").unwrap();
        assert_eq!(veteran.progress(), veteran.max_progress());
        assert!(tracker.complete("veteran", 20).unwrap().is_none());
        assert_eq!(
            tracker.complete("nope", 0),
            Err(ProgressionError::UnknownAchievement("nope".into()))
        );
    }

    #[test]
    fn test_hidden_until_completed() {
        let mut tracker = tracker();
        assert!(tracker.visible().iter().all(|a| a.id != "polymath"));
        tracker.complete("polymath", 0).unwrap();
        assert!(tracker.visible().iter().any(|a| a.id == "polymath"));
    }

    #[test]
    fn test_by_category() {
        let tracker = tracker();
        let learning = tracker.by_category(AchievementCategory::Learning);
        assert!(learning.len() >= 2);
        for a in &learning {
            assert_eq!(a.category, AchievementCategory::Learning);
        }
    }

    #[test]
    fn test_requirement_kind_names() {
        for kind in RequirementKind::ALL {
            assert_eq!(RequirementKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RequirementKind::parse("jump"), None);
        let json = serde_json::to_string(&RequirementKind::WinMultiplayer).unwrap();
        assert_eq!(json, "\"win_multiplayer\"");
    }

    #[test]
    fn test_restore() {
        let mut source = tracker();
        source.update_progress(RequirementKind::CompleteChallenges, 4, 100);
        let saved = source.progress();

        let mut restored = tracker();
        let pending = restored.restore(&saved, 200);
        assert!(pending.is_empty());
        let fv = restored.get("first_victory").unwrap();
        assert!(fv.completed);
        assert_eq!(fv.completed_at, Some(100));
        assert_eq!(restored.get("dedicated_learner").unwrap().progress(), 4);
        assert_eq!(restored.completed_count(), 1);
    }

    #[test]
    fn test_restore_latches_unlatched() {
        let mut restored = tracker();
        let saved = vec![AchievementProgress {
            id: "first_victory".into(),
            requirements: [(RequirementKind::CompleteChallenges, 1)].into_iter().collect(),
            completed: false,
            completed_at: None,
        }];
        let pending = restored.restore(&saved, 50);
        assert_eq!(pending.len(), 1);
        assert!(restored.get("first_victory").unwrap().completed);
    }

    #[test]
    fn test_invalid_definitions() {
        let mut dup = default_achievements();
        dup.push(dup[0].clone());
        assert!(AchievementTracker::new(dup).is_err());

        let mut empty = default_achievements();
        empty[0].requirements.clear();
        assert!(AchievementTracker::new(empty).is_err());

        let mut zero = default_achievements();
        zero[0].requirements[0].target = 0;
        assert!(AchievementTracker::new(zero).is_err());
    }
}
