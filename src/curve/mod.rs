//! Experience curve: XP needed to advance from a level to the next.
//!
//! `requirement(level) = floor(base * growth^(level - 1))`. The function is
//! pure, so identical level/XP histories reproduce identical thresholds,
//! including after a prestige reset.

use serde::{Deserialize, Serialize};

use crate::config::CurveConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperienceCurve {
    base: f64,
    growth: f64,
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        Self::from_config(&CurveConfig::default())
    }
}

impl ExperienceCurve {
    /// Build from a validated [`CurveConfig`]
    pub fn from_config(config: &CurveConfig) -> Self {
        Self {
            base: config.base,
            growth: config.growth,
        }
    }

    /// XP needed to go from `level` to `level + 1`. Levels below 1 are
    /// treated as level 1.
    pub fn requirement(&self, level: u32) -> u64 {
        let exponent = i32::try_from(level.max(1) - 1).unwrap_or(i32::MAX);
        let raw = (self.base * self.growth.powi(exponent)).floor();
        // Saturates at u64::MAX for absurd levels
        raw as u64
    }

    /// First level whose requirement saturates `u64`. Nothing levels past it.
    pub fn level_cap(&self) -> u32 {
        let steps = (u64::MAX as f64 / self.base).ln() / self.growth.ln();
        let cap = 1.0 + steps.ceil().max(0.0);
        if cap.is_finite() && cap < u32::MAX as f64 {
            cap as u32
        } else {
            u32::MAX
        }
    }

    /// Total XP needed to reach `level` from level 1
    pub fn cumulative(&self, level: u32) -> u64 {
        // past the cap the sum is saturated anyway
        let end = level.max(1).min(self.level_cap().saturating_add(1));
        (1..end)
            .map(|l| self.requirement(l))
            .fold(0u64, |acc, r| acc.saturating_add(r))
    }
}
