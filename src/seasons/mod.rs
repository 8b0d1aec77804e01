//! Seasonal XP events
//!
//! A season is a time window with an XP multiplier. Overlapping seasons
//! compound. Whether a season is active is decided against the injected
//! clock, never the wall clock directly.

use serde::{Deserialize, Serialize};

/// A time-limited XP multiplier, active for `starts_at <= now < ends_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalEvent {
    pub name: String,
    pub starts_at: u64,
    pub ends_at: u64,
    pub multiplier: f64,
}

impl SeasonalEvent {
    pub fn is_active(&self, now: u64) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ends_at <= self.starts_at {
            return Err(format!("season '{}' ends before it starts", self.name));
        }
        if !(self.multiplier >= 1.0) {
            return Err(format!(
                "season '{}' multiplier must be >= 1, got {}",
                self.name, self.multiplier
            ));
        }
        Ok(())
    }
}

/// Combined multiplier of every season active at `now`
pub fn active_multiplier(seasons: &[SeasonalEvent], now: u64) -> f64 {
    seasons
        .iter()
        .filter(|s| s.is_active(now))
        .map(|s| s.multiplier)
        .product()
}
