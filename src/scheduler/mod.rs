//! Spaced repetition (SM-2 style)
//!
//! Each topic carries a review step (`repetitions`), a mastery scalar in
//! [0, 1], and the easiness factor of its last review. Interval by step:
//!
//! | step | interval (days)          |
//! |------|--------------------------|
//! | 0    | 1                        |
//! | 1    | 6                        |
//! | ≥ 2  | round(6 × easiness)      |
//!
//! A recall below quality 3 always resets to a next-day review. The
//! scheduler only decides *when* a topic is due, never whether to show it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMastery {
    pub topic_id: String,
    /// Retention strength in [0, 1]
    pub mastery_level: f64,
    /// Consecutive successful reviews
    #[serde(default)]
    pub repetitions: u32,
    pub easiness_factor: f64,
    #[serde(default)]
    pub interval_days: u64,
    pub next_review_at: u64,
    #[serde(default)]
    pub last_reviewed_at: Option<u64>,
    #[serde(default)]
    pub review_count: u64,
}

impl TopicMastery {
    pub fn new(topic_id: impl Into<String>, now: u64) -> Self {
        Self {
            topic_id: topic_id.into(),
            mastery_level: 0.0,
            repetitions: 0,
            easiness_factor: EASINESS_DEFAULT,
            interval_days: 0,
            next_review_at: now,
            last_reviewed_at: None,
            review_count: 0,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.next_review_at <= now
    }
}

/// Outcome of one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSchedule {
    pub topic_id: String,
    pub quality: u8,
    pub passed: bool,
    pub interval_days: u64,
    pub next_review_at: u64,
    pub easiness_factor: f64,
    pub mastery_level: f64,
}

/// `max(1.3, 2.5 + (0.1 − (5−q)(0.08 + (5−q)·0.02)))`
pub fn easiness_for(quality: u8) -> f64 {
    let miss = (MAX_RECALL_QUALITY - quality.min(MAX_RECALL_QUALITY)) as f64;
    (EASINESS_DEFAULT + (0.1 - miss * (0.08 + miss * 0.02))).max(EASINESS_MIN)
}

/// Interval in days for a review at `step` with the given quality
pub fn interval_for(step: u32, quality: u8) -> u64 {
    if quality < PASSING_RECALL_QUALITY {
        return FIRST_INTERVAL_DAYS;
    }
    match step {
        0 => FIRST_INTERVAL_DAYS,
        1 => SECOND_INTERVAL_DAYS,
        _ => (SECOND_INTERVAL_DAYS as f64 * easiness_for(quality)).round() as u64,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpacedRepetitionScheduler {
    topics: BTreeMap<String, TopicMastery>,
}

impl SpacedRepetitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a review with recall quality `quality` (clamped to 0..=5) and
    /// schedule the next one
    pub fn record_review(&mut self, topic_id: &str, quality: u8, now: u64) -> ReviewSchedule {
        let quality = quality.min(MAX_RECALL_QUALITY);
        let topic = self
            .topics
            .entry(topic_id.to_string())
            .or_insert_with(|| TopicMastery::new(topic_id, now));

        let passed = quality >= PASSING_RECALL_QUALITY;
        let interval = interval_for(topic.repetitions, quality);
        topic.repetitions = if passed { topic.repetitions + 1 } else { 0 };
        topic.easiness_factor = easiness_for(quality);
        topic.mastery_level =
            (topic.mastery_level + (quality as f64 - 2.5) * MASTERY_STEP).clamp(0.0, 1.0);
        topic.interval_days = interval;
        topic.next_review_at = now.saturating_add(interval.saturating_mul(SECONDS_PER_DAY));
        topic.last_reviewed_at = Some(now);
        topic.review_count += 1;

        debug!(
            topic = topic_id,
            quality,
            interval_days = interval,
            mastery = topic.mastery_level,
            "review scheduled"
        );

        ReviewSchedule {
            topic_id: topic_id.to_string(),
            quality,
            passed,
            interval_days: interval,
            next_review_at: topic.next_review_at,
            easiness_factor: topic.easiness_factor,
            mastery_level: topic.mastery_level,
        }
    }

    pub fn get(&self, topic_id: &str) -> Option<&TopicMastery> {
        self.topics.get(topic_id)
    }

    /// Mastery scalar for a topic; 0 for topics never reviewed
    pub fn mastery(&self, topic_id: &str) -> f64 {
        self.topics.get(topic_id).map_or(0.0, |t| t.mastery_level)
    }

    /// Topics due at `now`, earliest first
    pub fn due_topics(&self, now: u64) -> Vec<&TopicMastery> {
        let mut due: Vec<_> = self.topics.values().filter(|t| t.is_due(now)).collect();
        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.topic_id.cmp(&b.topic_id))
        });
        due
    }

    pub fn topics(&self) -> &BTreeMap<String, TopicMastery> {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Snapshot form, keyed by topic id
    pub fn snapshot(&self) -> BTreeMap<String, TopicMastery> {
        self.topics.clone()
    }

    /// Replace state from a snapshot, clamping anything out of range
    pub fn restore(&mut self, topics: BTreeMap<String, TopicMastery>) {
        self.topics = topics
            .into_iter()
            .map(|(id, mut topic)| {
                topic.topic_id = id.clone();
                topic.mastery_level = if topic.mastery_level.is_nan() {
                    0.0
                } else {
                    topic.mastery_level.clamp(0.0, 1.0)
                };
                if !(topic.easiness_factor >= EASINESS_MIN) {
                    topic.easiness_factor = EASINESS_MIN;
                }
                (id, topic)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = SECONDS_PER_DAY;

    #[test]
    fn test_easiness_formula() {
        assert!((easiness_for(5) - 2.6).abs() < 1e-9);
        assert!((easiness_for(4) - 2.5).abs() < 1e-9);
        assert!((easiness_for(3) - 2.36).abs() < 1e-9);
        // 2.5 + 0.1 - 3 * 0.14 = 2.18
        assert!((easiness_for(2) - 2.18).abs() < 1e-9);
        assert!((easiness_for(0) - 1.7).abs() < 1e-9);
        assert!(easiness_for(0) >= EASINESS_MIN);
    }

    #[test]
    fn test_first_review_is_one_day() {
        let mut s = SpacedRepetitionScheduler::new();
        let r = s.record_review("fractions", 5, 1_000);
        assert_eq!(r.interval_days, 1);
        assert_eq!(r.next_review_at, 1_000 + DAY);
        assert!(r.passed);
    }

    #[test]
    fn test_interval_progression() {
        let mut s = SpacedRepetitionScheduler::new();
        assert_eq!(s.record_review("t", 5, 0).interval_days, 1);
        assert_eq!(s.record_review("t", 5, 0).interval_days, 6);
        // round(6 * 2.6) = 16
        assert_eq!(s.record_review("t", 5, 0).interval_days, 16);
        // round(6 * 2.36) = 14
        assert_eq!(s.record_review("t", 3, 0).interval_days, 14);
        assert_eq!(s.get("t").unwrap().repetitions, 4);
    }

    #[test]
    fn test_failed_recall_resets() {
        let mut s = SpacedRepetitionScheduler::new();
        for _ in 0..4 {
            s.record_review("t", 5, 0);
        }
        let r = s.record_review("t", 2, 100);
        assert_eq!(r.interval_days, 1);
        assert_eq!(r.next_review_at, 100 + DAY);
        assert!(!r.passed);
        assert_eq!(s.get("t").unwrap().repetitions, 0);
        // back to the start of the ladder
        assert_eq!(s.record_review("t", 5, 0).interval_days, 1);
    }

    #[test]
    fn test_quality_clamped() {
        let mut s = SpacedRepetitionScheduler::new();
        let r = s.record_review("t", 200, 0);
        assert_eq!(r.quality, 5);
        assert!((r.easiness_factor - 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_mastery_bounded() {
        let mut s = SpacedRepetitionScheduler::new();
        for _ in 0..50 {
            s.record_review("up", 5, 0);
            s.record_review("down", 0, 0);
        }
        assert!((s.mastery("up") - 1.0).abs() < 1e-9);
        assert!((s.mastery("down") - 0.0).abs() < 1e-9);
        assert_eq!(s.mastery("unknown"), 0.0);
    }

    #[test]
    fn test_due_topics_ordered() {
        let mut s = SpacedRepetitionScheduler::new();
        s.record_review("late", 5, 0); // 1 day
        s.record_review("early", 1, 0); // 1 day, same due time
        s.record_review("later", 5, 0);
        s.record_review("later", 5, 0); // 6 days
        let due = s.due_topics(DAY);
        let ids: Vec<_> = due.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(s.due_topics(DAY - 1).len(), 0);
        assert_eq!(s.due_topics(6 * DAY).len(), 3);
    }

    #[test]
    fn test_restore_clamps() {
        let mut topic = TopicMastery::new("x", 0);
        topic.mastery_level = 4.0;
        topic.easiness_factor = 0.2;
        let mut s = SpacedRepetitionScheduler::new();
        s.restore([("x".to_string(), topic)].into_iter().collect());
        let t = s.get("x").unwrap();
        assert_eq!(t.mastery_level, 1.0);
        assert_eq!(t.easiness_factor, EASINESS_MIN);
    }
}
