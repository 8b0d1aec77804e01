//! Learning engine
//!
//! The inbound surface used by the UI layer. It wires the progression
//! orchestrator, the review scheduler and the difficulty estimator to one
//! character, and checkpoints a snapshot through the injected
//! [`PersistenceGateway`] after every call that changed state.
//!
//! ```text
//! [UI] ──► LearningEngine ──► CharacterProgression ──► SkillGraph
//!               │                     └──────────────► AchievementTracker
//!               ├──► SpacedRepetitionScheduler
//!               ├──► AdaptiveDifficultyEstimator
//!               └──► PersistenceGateway (save after each mutation)
//! ```
//!
//! Precondition failures come back as `Ok(false)`. `Err` is reserved for
//! unknown catalog ids and storage failures.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::clock::SharedClock;
use crate::config::ProgressionConfig;
use crate::difficulty::{AdaptiveDifficultyEstimator, SessionMetrics, SessionParameters};
use crate::error::{EngineError, PersistenceError};
use crate::events::{ExperienceSource, ProgressionEvent};
use crate::logging::TimingSpan;
use crate::persistence::{decode_snapshot, encode_snapshot, PersistenceGateway, ProgressionSnapshot};
use crate::progression::CharacterProgression;
use crate::scheduler::{ReviewSchedule, SpacedRepetitionScheduler, TopicMastery};

pub type EngineResult<T> = Result<T, EngineError>;

pub struct LearningEngine {
    key: String,
    progression: CharacterProgression,
    scheduler: SpacedRepetitionScheduler,
    estimator: AdaptiveDifficultyEstimator,
    gateway: Arc<dyn PersistenceGateway>,
    clock: SharedClock,
}

impl LearningEngine {
    /// Load the character's snapshot, or start fresh when there is none.
    ///
    /// A snapshot that fails its checksum, cannot be migrated or does not
    /// parse is logged and replaced by default state. A gateway that cannot
    /// be read at all is an error, so real data is never overwritten.
    pub fn open(
        character_id: &str,
        catalog: Catalog,
        config: &ProgressionConfig,
        gateway: Arc<dyn PersistenceGateway>,
        clock: SharedClock,
    ) -> EngineResult<Self> {
        let _span = TimingSpan::new("open", character_id);
        let mut engine = Self {
            key: character_id.to_string(),
            progression: CharacterProgression::new(character_id, catalog, config, clock.clone())?,
            scheduler: SpacedRepetitionScheduler::new(),
            estimator: AdaptiveDifficultyEstimator::new(&config.adaptive),
            gateway,
            clock,
        };

        let stored = match engine.gateway.load(character_id) {
            Err(PersistenceError::Corrupt(detail)) => {
                warn!(character = character_id, error = %detail, "corrupt snapshot, starting fresh");
                None
            }
            other => other?,
        };
        match stored {
            None => info!(character = character_id, "no snapshot, starting fresh"),
            Some(text) => match decode_snapshot(&text) {
                Ok(snapshot) if snapshot.character.id == character_id => {
                    engine.restore(snapshot);
                    info!(
                        character = character_id,
                        level = engine.progression.character().level,
                        "snapshot restored"
                    );
                }
                Ok(snapshot) => warn!(
                    character = character_id,
                    found = %snapshot.character.id,
                    "snapshot belongs to another character, starting fresh"
                ),
                Err(e) => warn!(
                    character = character_id,
                    error = %e,
                    "unreadable snapshot, starting fresh"
                ),
            },
        }
        Ok(engine)
    }

    fn restore(&mut self, snapshot: ProgressionSnapshot) {
        self.progression
            .restore(snapshot.character, &snapshot.skill_trees, &snapshot.achievements);
        self.scheduler.restore(snapshot.topic_mastery);
        if let Some(adaptive) = snapshot.adaptive {
            self.estimator.restore(adaptive);
        }
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        ProgressionSnapshot {
            character: self.progression.character().clone(),
            skill_trees: self.progression.skill_progress(),
            achievements: self.progression.achievement_progress(),
            topic_mastery: self.scheduler.snapshot(),
            adaptive: Some(self.estimator.snapshot()),
        }
    }

    /// Write the current state through the gateway
    pub fn checkpoint(&self) -> EngineResult<()> {
        let text = encode_snapshot(&self.snapshot())?;
        self.gateway.save(&self.key, &text).map_err(|e| {
            error!(character = %self.key, error = %e, "failed to save snapshot");
            EngineError::from(e)
        })
    }

    // =====================================================
    // Inbound operations
    // =====================================================

    /// Returns the XP the game was worth before multipliers
    pub fn on_game_complete(
        &mut self,
        score: u64,
        time_spent_seconds: u64,
        accuracy: f64,
        is_multiplayer: bool,
    ) -> EngineResult<u64> {
        let _span = TimingSpan::new("on_game_complete", &self.key);
        let xp = self
            .progression
            .on_game_complete(score, time_spent_seconds, accuracy, is_multiplayer);
        self.checkpoint()?;
        Ok(xp)
    }

    pub fn add_experience(&mut self, amount: i64, source: ExperienceSource) -> EngineResult<bool> {
        let _span = TimingSpan::new("add_experience", &self.key);
        let applied = self.progression.add_experience(amount, source);
        if applied {
            self.checkpoint()?;
        }
        Ok(applied)
    }

    pub fn record_review_result(&mut self, topic_id: &str, quality: u8) -> EngineResult<ReviewSchedule> {
        let _span = TimingSpan::new("record_review_result", &self.key);
        let schedule = self
            .scheduler
            .record_review(topic_id, quality, self.clock.now());
        self.checkpoint()?;
        Ok(schedule)
    }

    /// Record a finished session and recommend parameters for the next one
    pub fn complete_session(
        &mut self,
        topic_id: &str,
        metrics: &SessionMetrics,
    ) -> EngineResult<SessionParameters> {
        let _span = TimingSpan::new("complete_session", &self.key);
        let mastery = self.scheduler.mastery(topic_id);
        let params = self.estimator.record_session(topic_id, metrics, mastery);
        self.checkpoint()?;
        Ok(params)
    }

    pub fn unlock_skill(&mut self, skill_id: &str) -> EngineResult<bool> {
        let _span = TimingSpan::new("unlock_skill", &self.key);
        let unlocked = self.progression.unlock_skill(skill_id)?;
        if unlocked {
            self.checkpoint()?;
        }
        Ok(unlocked)
    }

    pub fn upgrade_skill(&mut self, skill_id: &str) -> EngineResult<bool> {
        let _span = TimingSpan::new("upgrade_skill", &self.key);
        let upgraded = self.progression.upgrade_skill(skill_id)?;
        if upgraded {
            self.checkpoint()?;
        }
        Ok(upgraded)
    }

    pub fn prestige(&mut self) -> EngineResult<bool> {
        let _span = TimingSpan::new("prestige", &self.key);
        let done = self.progression.prestige();
        if done {
            self.checkpoint()?;
        }
        Ok(done)
    }

    pub fn complete_achievement(&mut self, achievement_id: &str) -> EngineResult<bool> {
        let _span = TimingSpan::new("complete_achievement", &self.key);
        let done = self.progression.complete_achievement(achievement_id)?;
        if done {
            self.checkpoint()?;
        }
        Ok(done)
    }

    // =====================================================
    // Queries
    // =====================================================

    pub fn due_topics(&self) -> Vec<&TopicMastery> {
        self.scheduler.due_topics(self.clock.now())
    }

    pub fn drain_events(&mut self) -> Vec<ProgressionEvent> {
        self.progression.drain_events()
    }

    pub fn progression(&self) -> &CharacterProgression {
        &self.progression
    }

    pub fn scheduler(&self) -> &SpacedRepetitionScheduler {
        &self.scheduler
    }

    pub fn estimator(&self) -> &AdaptiveDifficultyEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut AdaptiveDifficultyEstimator {
        &mut self.estimator
    }
}
