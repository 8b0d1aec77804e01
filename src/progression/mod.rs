//! Character progression
//!
//! [`CharacterProgression`] owns the character and is the only thing that
//! mutates it. It runs XP gains through the multiplier sources and the
//! level-up loop, pays milestones, and forwards counter changes to the
//! [`AchievementTracker`]. Skill unlocks and upgrades are validated by the
//! [`SkillGraph`].
//!
//! Every operation either applies fully or returns `false` with no state
//! change. Side effects are recorded as [`ProgressionEvent`]s and drained by
//! the caller.

mod character;
mod milestone;

pub use character::{Appearance, Character, Counters};
pub use milestone::{default_milestones, Milestone};

use tracing::{debug, info, warn};

use crate::achievements::{
    AchievementProgress, AchievementTracker, CompletedAchievement, RequirementKind, Reward,
};
use crate::catalog::{validate_milestones, Catalog};
use crate::clock::SharedClock;
use crate::config::{ExperienceConfig, PrestigeConfig, ProgressionConfig};
use crate::constants::*;
use crate::curve::ExperienceCurve;
use crate::error::Result;
use crate::events::{ExperienceSource, ProgressionEvent};
use crate::seasons;
use crate::skills::{SkillGraph, SkillNode, SkillTreeProgress};

pub struct CharacterProgression {
    character: Character,
    curve: ExperienceCurve,
    skills: SkillGraph,
    achievements: AchievementTracker,
    /// Sorted by level
    milestones: Vec<Milestone>,
    prestige: PrestigeConfig,
    experience: ExperienceConfig,
    streak_threshold: f64,
    clock: SharedClock,
    events: Vec<ProgressionEvent>,
}

impl CharacterProgression {
    /// Fresh character against `catalog`
    pub fn new(
        character_id: &str,
        catalog: Catalog,
        config: &ProgressionConfig,
        clock: SharedClock,
    ) -> Result<Self> {
        let curve = ExperienceCurve::from_config(&config.curve);
        let mut milestones = catalog.milestones;
        validate_milestones(&milestones)?;
        milestones.sort_by_key(|m| m.level);

        Ok(Self {
            character: Character::with_curve(character_id, &curve),
            curve,
            skills: SkillGraph::new(catalog.skill_trees)?,
            achievements: AchievementTracker::new(catalog.achievements)?,
            milestones,
            prestige: config.prestige.clone(),
            experience: config.experience.clone(),
            streak_threshold: config.streak_accuracy_threshold,
            clock,
            events: Vec::new(),
        })
    }

    /// Replace the fresh state with persisted state.
    ///
    /// The skill graph is authoritative for `unlocked_skill_ids` and
    /// `active_skill_ids`. The character is re-normalized against the
    /// current curve, and achievements are re-synced with its counters so a
    /// requirement met under an older catalog is paid out now.
    pub fn restore(
        &mut self,
        character: Character,
        skill_trees: &[SkillTreeProgress],
        achievements: &[AchievementProgress],
    ) {
        self.character = character;
        let cap = self.curve.level_cap();
        if self.character.level > cap {
            warn!(level = self.character.level, cap, "clamping restored level to the curve cap");
        }
        self.character.level = self.character.level.clamp(1, cap);
        self.character.experience_to_next = self.curve.requirement(self.character.level);
        self.skills.restore(skill_trees, &mut self.character);
        self.run_level_loop();

        let pending = self.achievements.restore(achievements, self.clock.now());
        self.dispatch_rewards(pending);
        self.sync_achievements();
        debug_assert!(self.character.is_normalized());
    }

    // =====================================================
    // Experience
    // =====================================================

    /// Combined multiplier for XP from `source` right now
    pub fn experience_multiplier(&self, source: ExperienceSource) -> f64 {
        let mut multiplier = seasons::active_multiplier(&self.experience.seasons, self.clock.now());
        if source == ExperienceSource::Multiplayer
            && self.character.has_ability(&self.experience.multiplayer_ability)
        {
            multiplier *= self.experience.multiplayer_multiplier;
        }
        multiplier
    }

    /// Add XP and level up as far as it reaches. Non-positive amounts are
    /// rejected.
    pub fn add_experience(&mut self, amount: i64, source: ExperienceSource) -> bool {
        if amount <= 0 {
            debug!(amount, "rejecting non-positive experience");
            return false;
        }
        let base = amount as u64;
        let applied = (base as f64 * self.experience_multiplier(source)).floor() as u64;

        let c = &mut self.character;
        c.experience = c.experience.saturating_add(applied);
        c.total_experience = c.total_experience.saturating_add(applied);
        self.events.push(ProgressionEvent::ExperienceGained {
            base,
            amount: applied,
            source,
        });

        let before = self.character.level;
        self.run_level_loop();
        if self.character.level != before {
            let level = self.character.level as u64;
            let completed =
                self.achievements
                    .update_progress(RequirementKind::ReachLevel, level, self.clock.now());
            self.dispatch_rewards(completed);
        }
        true
    }

    fn run_level_loop(&mut self) {
        let cap = self.curve.level_cap();
        while self.character.experience >= self.character.experience_to_next {
            let c = &mut self.character;
            if c.level >= cap {
                c.experience = c.experience_to_next.saturating_sub(1);
                break;
            }
            c.experience -= c.experience_to_next;
            c.level = c.level.saturating_add(1);
            c.experience_to_next = self.curve.requirement(c.level);
            let level = c.level;
            let points = level / 5 + 1;
            c.skill_points = c.skill_points.saturating_add(points);
            info!(level, skill_points = points, "level up");
            self.events.push(ProgressionEvent::LevelUp {
                level,
                skill_points_granted: points,
            });
            self.apply_milestone(level);
        }
    }

    fn apply_milestone(&mut self, level: u32) {
        let Ok(i) = self.milestones.binary_search_by_key(&level, |m| m.level) else {
            return;
        };
        if !self.character.claimed_milestones.insert(level) {
            debug!(level, "milestone already claimed");
            return;
        }
        let milestone = &self.milestones[i];
        let c = &mut self.character;
        c.skill_points = c.skill_points.saturating_add(milestone.skill_points);
        for (currency, amount) in &milestone.currency {
            let balance = c.currencies.entry(currency.clone()).or_insert(0);
            *balance = balance.saturating_add(*amount);
        }
        c.unlocked_features.extend(milestone.unlocks.iter().cloned());
        info!(level, "milestone reached");
        self.events.push(ProgressionEvent::MilestoneReached {
            level,
            skill_points: milestone.skill_points,
            unlocks: milestone.unlocks.clone(),
        });
    }

    /// Record a finished challenge and award its XP. Returns the derived XP
    /// before multipliers.
    pub fn on_game_complete(
        &mut self,
        score: u64,
        time_spent_seconds: u64,
        accuracy: f64,
        is_multiplayer: bool,
    ) -> u64 {
        let accuracy = if accuracy.is_nan() {
            0.0
        } else {
            accuracy.clamp(0.0, 1.0)
        };
        let perfect = accuracy >= 1.0;

        let counters = &mut self.character.counters;
        counters.completed_challenges += 1;
        if perfect {
            counters.perfect_games += 1;
        }
        if is_multiplayer && score > 0 {
            counters.multiplayer_wins += 1;
        }
        counters.total_play_time_seconds = counters
            .total_play_time_seconds
            .saturating_add(time_spent_seconds);
        if accuracy >= self.streak_threshold {
            counters.current_streak += 1;
            counters.best_streak = counters.best_streak.max(counters.current_streak);
        } else {
            counters.current_streak = 0;
        }

        let mut xp = (score / SCORE_XP_DIVISOR).saturating_add(BASE_GAME_XP) as f64;
        if perfect {
            xp *= PERFECT_GAME_MULT;
        }
        if time_spent_seconds < FAST_GAME_SECS {
            xp *= FAST_GAME_MULT;
        }
        let xp = xp.floor() as u64;
        let source = if is_multiplayer {
            ExperienceSource::Multiplayer
        } else {
            ExperienceSource::Challenge
        };
        self.add_experience(i64::try_from(xp).unwrap_or(i64::MAX), source);
        self.sync_achievements();
        xp
    }

    // =====================================================
    // Prestige
    // =====================================================

    pub fn can_prestige(&self) -> bool {
        self.character.level >= self.prestige.min_level
            && self.character.prestige_count < self.prestige.max_prestige
    }

    /// Reset to level 1 with a standing bonus. Tier-1 skills stay unlocked.
    pub fn prestige(&mut self) -> bool {
        if !self.can_prestige() {
            debug!(
                level = self.character.level,
                prestige_count = self.character.prestige_count,
                "prestige rejected"
            );
            return false;
        }

        let rank = self.character.prestige_count;
        let relocked = self.skills.relock_above_tier_one(&mut self.character);
        let c = &mut self.character;
        c.level = STARTING_LEVEL;
        c.experience = 0;
        c.experience_to_next = self.curve.requirement(STARTING_LEVEL);
        c.skill_points = rank * PRESTIGE_POINTS_PER_RANK + PRESTIGE_POINTS_BASE;
        let bonus = rank as i64 * PRESTIGE_STAT_PER_RANK + PRESTIGE_STAT_BASE;
        for value in c.stats.values_mut() {
            *value += bonus;
        }
        c.prestige_count += 1;

        info!(
            prestige_count = c.prestige_count,
            relocked = relocked.len(),
            "prestige completed"
        );
        self.events.push(ProgressionEvent::PrestigeCompleted {
            prestige_count: c.prestige_count,
            skill_points: c.skill_points,
            relocked,
        });
        true
    }

    // =====================================================
    // Skills
    // =====================================================

    pub fn unlock_skill(&mut self, skill_id: &str) -> Result<bool> {
        let unlocked = self.skills.unlock(skill_id, &mut self.character)?;
        if unlocked {
            self.events.push(ProgressionEvent::SkillUnlocked {
                skill_id: skill_id.to_string(),
            });
        }
        Ok(unlocked)
    }

    pub fn upgrade_skill(&mut self, skill_id: &str) -> Result<bool> {
        let upgraded = self.skills.upgrade(skill_id, &mut self.character)?;
        if upgraded {
            self.events.push(ProgressionEvent::SkillUpgraded {
                skill_id: skill_id.to_string(),
                level: self.skills.level(skill_id)?,
            });
        }
        Ok(upgraded)
    }

    pub fn available_skills(&self) -> Vec<&SkillNode> {
        self.skills.available(&self.character)
    }

    // =====================================================
    // Achievements
    // =====================================================

    /// Complete an achievement outright. `Ok(false)` if already completed.
    pub fn complete_achievement(&mut self, achievement_id: &str) -> Result<bool> {
        match self.achievements.complete(achievement_id, self.clock.now())? {
            Some(done) => {
                self.dispatch_rewards(vec![done]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Push every counter into the tracker
    pub fn sync_achievements(&mut self) {
        let now = self.clock.now();
        let c = &self.character;
        let updates = [
            (
                RequirementKind::CompleteChallenges,
                c.counters.completed_challenges,
            ),
            (RequirementKind::ReachLevel, c.level as u64),
            (RequirementKind::WinMultiplayer, c.counters.multiplayer_wins),
            (RequirementKind::PerfectGames, c.counters.perfect_games),
            (RequirementKind::Streak, c.counters.best_streak),
            (RequirementKind::Playtime, c.counters.total_play_time_seconds),
        ];
        for (kind, value) in updates {
            let completed = self.achievements.update_progress(kind, value, now);
            self.dispatch_rewards(completed);
        }
    }

    fn dispatch_rewards(&mut self, completed: Vec<CompletedAchievement>) {
        for done in completed {
            self.events.push(ProgressionEvent::AchievementCompleted {
                achievement_id: done.id.clone(),
                name: done.name.clone(),
                rewards: done.rewards.clone(),
            });
            for reward in done.rewards {
                self.grant_reward(reward);
            }
        }
    }

    fn grant_reward(&mut self, reward: Reward) {
        match reward {
            Reward::Experience(amount) => {
                self.add_experience(
                    i64::try_from(amount).unwrap_or(i64::MAX),
                    ExperienceSource::Achievement,
                );
            }
            Reward::Currency { currency, amount } => {
                let balance = self.character.currencies.entry(currency).or_insert(0);
                *balance = balance.saturating_add(amount);
            }
            Reward::SkillPoints(points) => {
                self.character.skill_points = self.character.skill_points.saturating_add(points);
            }
            Reward::Title(title) => {
                let appearance = &mut self.character.appearance;
                appearance.titles.insert(title.clone());
                appearance.active_title = Some(title);
            }
            Reward::Badge(badge) => {
                self.character.appearance.badges.insert(badge);
            }
        }
    }

    // =====================================================
    // Accessors
    // =====================================================

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn curve(&self) -> &ExperienceCurve {
        &self.curve
    }

    pub fn skills(&self) -> &SkillGraph {
        &self.skills
    }

    pub fn achievements(&self) -> &AchievementTracker {
        &self.achievements
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn events(&self) -> &[ProgressionEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ProgressionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn skill_progress(&self) -> Vec<SkillTreeProgress> {
        self.skills.progress()
    }

    pub fn achievement_progress(&self) -> Vec<AchievementProgress> {
        self.achievements.progress()
    }
}
