//! Runtime configuration.
//!
//! Every section has defaults from [`crate::constants`], so a config file
//! only needs to name what it overrides:
//!
//! ```ron
//! (
//!     prestige: (min_level: 50),
//!     adaptive: (rng_seed: 7),
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::*;
use crate::error::ConfigError;
use crate::logging::TracingConfig;
use crate::seasons::SeasonalEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    pub base: f64,
    pub growth: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            base: CURVE_BASE,
            growth: CURVE_GROWTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrestigeConfig {
    pub min_level: u32,
    pub max_prestige: u32,
}

impl Default for PrestigeConfig {
    fn default() -> Self {
        Self {
            min_level: PRESTIGE_MIN_LEVEL,
            max_prestige: PRESTIGE_MAX,
        }
    }
}

/// XP multiplier sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Active ability that boosts multiplayer-sourced XP
    pub multiplayer_ability: String,
    pub multiplayer_multiplier: f64,
    pub seasons: Vec<SeasonalEvent>,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            multiplayer_ability: MULTIPLAYER_ABILITY.to_string(),
            multiplayer_multiplier: MULTIPLAYER_XP_MULT,
            seasons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub window_size: usize,
    pub preferred_difficulty: f64,
    pub base_time_limit_ms: u64,
    pub neuroplasticity_seed_min: f64,
    pub neuroplasticity_seed_max: f64,
    pub rng_seed: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            window_size: SESSION_WINDOW,
            preferred_difficulty: 2.0,
            base_time_limit_ms: BASE_TIME_LIMIT_MS,
            neuroplasticity_seed_min: 0.5,
            neuroplasticity_seed_max: 0.8,
            rng_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub curve: CurveConfig,
    pub prestige: PrestigeConfig,
    pub experience: ExperienceConfig,
    pub streak_accuracy_threshold: f64,
    pub adaptive: AdaptiveConfig,
    pub logging: TracingConfig,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            curve: CurveConfig::default(),
            prestige: PrestigeConfig::default(),
            experience: ExperienceConfig::default(),
            streak_accuracy_threshold: STREAK_ACCURACY_THRESHOLD,
            adaptive: AdaptiveConfig::default(),
            logging: TracingConfig::default(),
        }
    }
}

impl ProgressionConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk; `.json` files are parsed as JSON, everything else as RON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_ron_str(&content),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let curve = &self.curve;
        if !(curve.growth > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "curve.growth must be > 1, got {}",
                curve.growth
            )));
        }
        // floor() must still produce strictly increasing thresholds
        if !(curve.base * (curve.growth - 1.0) > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "curve.base * (curve.growth - 1) must be > 1, got {}",
                curve.base * (curve.growth - 1.0)
            )));
        }
        if self.prestige.min_level < 2 {
            return Err(ConfigError::Invalid(
                "prestige.min_level must be at least 2".into(),
            ));
        }
        if !(self.experience.multiplayer_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(
                "experience.multiplayer_multiplier must be >= 1".into(),
            ));
        }
        for season in &self.experience.seasons {
            season.validate().map_err(ConfigError::Invalid)?;
        }
        if !(0.0..=1.0).contains(&self.streak_accuracy_threshold) {
            return Err(ConfigError::Invalid(
                "streak_accuracy_threshold must be within [0, 1]".into(),
            ));
        }

        let adaptive = &self.adaptive;
        if adaptive.window_size == 0 {
            return Err(ConfigError::Invalid(
                "adaptive.window_size must be positive".into(),
            ));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&adaptive.preferred_difficulty) {
            return Err(ConfigError::Invalid(format!(
                "adaptive.preferred_difficulty must be within [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]"
            )));
        }
        let seed_range = NEUROPLASTICITY_MIN..=NEUROPLASTICITY_MAX;
        if !seed_range.contains(&adaptive.neuroplasticity_seed_min)
            || !seed_range.contains(&adaptive.neuroplasticity_seed_max)
            || adaptive.neuroplasticity_seed_min > adaptive.neuroplasticity_seed_max
        {
            return Err(ConfigError::Invalid(format!(
                "adaptive neuroplasticity seed range must be ordered within [{NEUROPLASTICITY_MIN}, {NEUROPLASTICITY_MAX}]"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProgressionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prestige.min_level, 100);
        assert_eq!(config.prestige.max_prestige, 5);
        assert_eq!(config.adaptive.window_size, 20);
    }

    #[test]
    fn test_partial_ron_overrides() {
        let config = ProgressionConfig::from_ron_str(
            "(prestige: (min_level: 50), adaptive: (rng_seed: 7), logging: (default_level: Debug))",
        )
        .unwrap();
        assert_eq!(config.prestige.min_level, 50);
        assert_eq!(config.prestige.max_prestige, 5);
        assert_eq!(config.adaptive.rng_seed, 7);
        assert_eq!(config.logging.default_level, LogLevel::Debug);
        assert_eq!(config.curve, CurveConfig::default());
    }

    #[test]
    fn test_ron_with_season() {
        let config = ProgressionConfig::from_ron_str(
            r#"(experience: (seasons: [(name: "spring", starts_at: 100, ends_at: 200, multiplier: 2.0)]))"#,
        )
        .unwrap();
        assert_eq!(config.experience.seasons.len(), 1);
        assert_eq!(config.experience.seasons[0].name, "spring");
    }

    #[test]
    fn test_json_config() {
        let config =
            ProgressionConfig::from_json_str(r#"{"streak_accuracy_threshold": 0.9}"#).unwrap();
        assert!((config.streak_accuracy_threshold - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flat_curve_rejected() {
        let mut config = ProgressionConfig::default();
        config.curve.growth = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // growth > 1 but floor() would repeat thresholds
        config.curve = CurveConfig {
            base: 2.0,
            growth: 1.1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_adaptive_rejected() {
        let mut config = ProgressionConfig::default();
        config.adaptive.preferred_difficulty = 9.0;
        assert!(config.validate().is_err());

        let mut config = ProgressionConfig::default();
        config.adaptive.neuroplasticity_seed_min = 0.9;
        config.adaptive.neuroplasticity_seed_max = 0.4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_ron_is_error() {
        assert!(matches!(
            ProgressionConfig::from_ron_str("(curve: (base: \"x\"))"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progression.ron");
        std::fs::write(&path, "(prestige: (max_prestige: 3))").unwrap();
        let config = ProgressionConfig::load(&path).unwrap();
        assert_eq!(config.prestige.max_prestige, 3);
    }
}
