//! Adaptive difficulty
//!
//! Keeps a bounded window of recent [`SessionMetrics`] per topic and turns
//! it into the next session's [`SessionParameters`]. The estimate starts at
//! the learner's preferred difficulty and passes through four factors in
//! order: performance step, topic neuroplasticity, zone of proximal
//! development, flow state. The result is clamped to [1, 5] and rounded.
//!
//! Neuroplasticity is a per-topic scalar in [0.3, 1.0]. New topics are
//! seeded from a `Xoshiro256PlusPlus` seeded by config, so a replay with the
//! same seed and inputs produces the same recommendations.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::config::AdaptiveConfig;
use crate::constants::*;

/// Per-session performance signals, produced by the UI at session end
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Fraction of correct answers, [0, 1]
    pub accuracy_rate: f64,
    pub average_time_per_card_ms: f64,
    /// Streak quality on a 0-10 scale
    pub streak_performance: f64,
    /// [0, 1]
    pub focus_level: f64,
    /// [0, 1]
    pub cognitive_load: f64,
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

impl SessionMetrics {
    /// Clamp every signal into its documented range; NaN and infinities read as 0
    pub fn sanitized(&self) -> Self {
        Self {
            accuracy_rate: finite_or_zero(self.accuracy_rate).clamp(0.0, 1.0),
            average_time_per_card_ms: finite_or_zero(self.average_time_per_card_ms).max(0.0),
            streak_performance: finite_or_zero(self.streak_performance).clamp(0.0, 10.0),
            focus_level: finite_or_zero(self.focus_level).clamp(0.0, 1.0),
            cognitive_load: finite_or_zero(self.cognitive_load).clamp(0.0, 1.0),
        }
    }

    /// Field-wise mean; `None` for an empty window
    pub fn mean<'a>(window: impl IntoIterator<Item = &'a SessionMetrics>) -> Option<Self> {
        let mut sum = Self::default();
        let mut n = 0usize;
        for m in window {
            sum.accuracy_rate += m.accuracy_rate;
            sum.average_time_per_card_ms += m.average_time_per_card_ms;
            sum.streak_performance += m.streak_performance;
            sum.focus_level += m.focus_level;
            sum.cognitive_load += m.cognitive_load;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        let n = n as f64;
        Some(Self {
            accuracy_rate: sum.accuracy_rate / n,
            average_time_per_card_ms: sum.average_time_per_card_ms / n,
            streak_performance: sum.streak_performance / n,
            focus_level: sum.focus_level / n,
            cognitive_load: sum.cognitive_load / n,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackVerbosity {
    Minimal,
    Standard,
    Detailed,
}

/// Recommended parameters for the next session on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParameters {
    pub difficulty: u8,
    pub time_limit_ms: u64,
    pub hint_count: u8,
    pub reveal_speed_ms: u64,
    pub feedback: FeedbackVerbosity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyEstimate {
    /// Unclamped value after all four factors
    pub raw: f64,
    /// `round(clamp(raw, 1, 5))`
    pub difficulty: u8,
}

/// The four-factor estimate. `metrics` should already be sanitized.
pub fn estimate_difficulty(
    preferred: f64,
    metrics: &SessionMetrics,
    neuroplasticity: f64,
    mastery: f64,
) -> DifficultyEstimate {
    let acc = metrics.accuracy_rate;
    let mut value = preferred;

    // performance
    if acc > 0.9 && metrics.average_time_per_card_ms < 2000.0 {
        value += 0.5;
    } else if acc < 0.6 {
        value -= 0.3;
    }

    value *= neuroplasticity.clamp(NEUROPLASTICITY_MIN, NEUROPLASTICITY_MAX);

    // zone of proximal development
    value *= ((acc + mastery.clamp(0.0, 1.0)) / 2.0 + 0.2).clamp(0.5, 1.5);

    // flow state
    let flow = ((1.0 - (acc - 0.8).abs())
        + metrics.focus_level
        + (metrics.streak_performance / 10.0).clamp(0.0, 1.0))
        / 3.0;
    value *= flow;

    DifficultyEstimate {
        raw: value,
        difficulty: value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY).round() as u8,
    }
}

/// Time limit, hints, reveal speed and feedback from fixed thresholds
pub fn auxiliary_parameters(
    difficulty: u8,
    base_time_limit_ms: u64,
    metrics: &SessionMetrics,
) -> SessionParameters {
    let acc = metrics.accuracy_rate;
    let avg_ms = metrics.average_time_per_card_ms;

    let time_factor = if avg_ms < 2000.0 {
        0.7
    } else if avg_ms > 5000.0 {
        1.3
    } else {
        1.0
    };
    let hint_count = if acc < 0.6 {
        5
    } else if acc < 0.85 {
        3
    } else {
        1
    };
    let reveal_speed_ms = if metrics.focus_level >= 0.8 && avg_ms < 2000.0 {
        1000
    } else if metrics.focus_level < 0.5 || avg_ms > 5000.0 {
        2500
    } else {
        1750
    };
    let feedback = if acc > 0.9 {
        FeedbackVerbosity::Minimal
    } else if acc < 0.6 {
        FeedbackVerbosity::Detailed
    } else {
        FeedbackVerbosity::Standard
    };

    SessionParameters {
        difficulty,
        time_limit_ms: (base_time_limit_ms as f64 * time_factor).round() as u64,
        hint_count,
        reveal_speed_ms,
        feedback,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAdaptation {
    pub neuroplasticity: f64,
    #[serde(default)]
    pub recent: Vec<SessionMetrics>,
}

/// Persisted estimator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    pub preferred_difficulty: f64,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicAdaptation>,
}

#[derive(Debug, Clone)]
struct TopicState {
    window: VecDeque<SessionMetrics>,
    neuroplasticity: f64,
}

pub struct AdaptiveDifficultyEstimator {
    config: AdaptiveConfig,
    preferred_difficulty: f64,
    rng: Xoshiro256PlusPlus,
    topics: BTreeMap<String, TopicState>,
}

impl AdaptiveDifficultyEstimator {
    pub fn new(config: &AdaptiveConfig) -> Self {
        Self {
            config: config.clone(),
            preferred_difficulty: config.preferred_difficulty,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.rng_seed),
            topics: BTreeMap::new(),
        }
    }

    pub fn preferred_difficulty(&self) -> f64 {
        self.preferred_difficulty
    }

    pub fn set_preferred_difficulty(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.preferred_difficulty = value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
    }

    /// Learned neuroplasticity for a topic. Topics never seen read as the
    /// midpoint of the seed range without drawing from the RNG.
    pub fn neuroplasticity(&self, topic_id: &str) -> f64 {
        self.topics.get(topic_id).map_or(
            (self.config.neuroplasticity_seed_min + self.config.neuroplasticity_seed_max) / 2.0,
            |t| t.neuroplasticity,
        )
    }

    pub fn set_neuroplasticity(&mut self, topic_id: &str, value: f64) {
        let value = value.clamp(NEUROPLASTICITY_MIN, NEUROPLASTICITY_MAX);
        self.topic_mut(topic_id).neuroplasticity = value;
    }

    fn topic_mut(&mut self, topic_id: &str) -> &mut TopicState {
        let Self {
            config, rng, topics, ..
        } = self;
        topics.entry(topic_id.to_string()).or_insert_with(|| {
            let seeded =
                rng.gen_range(config.neuroplasticity_seed_min..=config.neuroplasticity_seed_max);
            debug!(topic = topic_id, neuroplasticity = seeded, "seeded topic");
            TopicState {
                window: VecDeque::with_capacity(config.window_size),
                neuroplasticity: seeded,
            }
        })
    }

    /// Rolling mean of the topic's window
    pub fn recent_average(&self, topic_id: &str) -> Option<SessionMetrics> {
        self.topics
            .get(topic_id)
            .and_then(|t| SessionMetrics::mean(&t.window))
    }

    /// Estimate for `metrics` against the topic's current state, without
    /// recording anything
    pub fn estimate(&self, topic_id: &str, metrics: &SessionMetrics, mastery: f64) -> DifficultyEstimate {
        estimate_difficulty(
            self.preferred_difficulty,
            &metrics.sanitized(),
            self.neuroplasticity(topic_id),
            mastery,
        )
    }

    /// Record a finished session and recommend the next one.
    ///
    /// The estimate uses the window mean (including this session) and the
    /// neuroplasticity from before this session; neuroplasticity is then
    /// raised by `accuracy × 0.05`, capped at 1.
    pub fn record_session(
        &mut self,
        topic_id: &str,
        metrics: &SessionMetrics,
        mastery: f64,
    ) -> SessionParameters {
        let metrics = metrics.sanitized();
        let window_size = self.config.window_size.max(1);
        let preferred = self.preferred_difficulty;
        let base_time_limit_ms = self.config.base_time_limit_ms;

        let topic = self.topic_mut(topic_id);
        while topic.window.len() >= window_size {
            topic.window.pop_front();
        }
        topic.window.push_back(metrics);
        let averaged = SessionMetrics::mean(&topic.window).unwrap_or(metrics);

        let estimate = estimate_difficulty(preferred, &averaged, topic.neuroplasticity, mastery);
        topic.neuroplasticity = (topic.neuroplasticity + metrics.accuracy_rate * NEUROPLASTICITY_GAIN)
            .clamp(NEUROPLASTICITY_MIN, NEUROPLASTICITY_MAX);

        debug!(
            topic = topic_id,
            raw = estimate.raw,
            difficulty = estimate.difficulty,
            neuroplasticity = topic.neuroplasticity,
            "session recorded"
        );
        auxiliary_parameters(estimate.difficulty, base_time_limit_ms, &averaged)
    }

    pub fn snapshot(&self) -> AdaptiveState {
        AdaptiveState {
            preferred_difficulty: self.preferred_difficulty,
            topics: self
                .topics
                .iter()
                .map(|(id, t)| {
                    (
                        id.clone(),
                        TopicAdaptation {
                            neuroplasticity: t.neuroplasticity,
                            recent: t.window.iter().copied().collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Restore from a snapshot; windows longer than the configured size keep
    /// their most recent entries
    pub fn restore(&mut self, state: AdaptiveState) {
        self.set_preferred_difficulty(state.preferred_difficulty);
        let window_size = self.config.window_size.max(1);
        self.topics = state
            .topics
            .into_iter()
            .map(|(id, t)| {
                let skip = t.recent.len().saturating_sub(window_size);
                let neuroplasticity = if t.neuroplasticity.is_nan() {
                    NEUROPLASTICITY_MIN
                } else {
                    t.neuroplasticity.clamp(NEUROPLASTICITY_MIN, NEUROPLASTICITY_MAX)
                };
                let state = TopicState {
                    window: t.recent.iter().skip(skip).map(|m| m.sanitized()).collect(),
                    neuroplasticity,
                };
                (id, state)
            })
            .collect();
    }
}
