//! Bot tuning parameters.

use serde::{Deserialize, Serialize};

/// Named difficulty preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Parse a preset name, falling back to `Normal` for anything unknown.
    #[must_use]
    pub fn parse_or_normal(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Normal,
        }
    }
}

/// Bot configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotConfig {
    /// Probability of emitting a random candidate instead of the
    /// strategic choice.
    pub error_rate: f64,

    /// Probability of attacking when a weapon and a target are available.
    pub aggression: f64,

    /// Heal first below this hp.
    pub low_hp_threshold: i64,

    /// An armor card is "enough" when its defense covers this share of the
    /// incoming power, in percent.
    pub defend_cover_pct: i64,

    /// Seed for the bot's own random stream.
    pub seed: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::preset(Difficulty::Normal)
    }
}

impl BotConfig {
    /// Preset for a difficulty level.
    #[must_use]
    pub fn preset(difficulty: Difficulty) -> Self {
        let (error_rate, aggression) = match difficulty {
            Difficulty::Easy => (0.30, 0.30),
            Difficulty::Normal => (0.15, 0.50),
            Difficulty::Hard => (0.05, 0.70),
        };
        Self {
            error_rate,
            aggression,
            low_hp_threshold: 20,
            defend_cover_pct: 70,
            seed: 42,
        }
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the error rate, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the aggression, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_aggression(mut self, aggression: f64) -> Self {
        self.aggression = aggression.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let easy = BotConfig::preset(Difficulty::Easy);
        assert!((easy.error_rate - 0.30).abs() < f64::EPSILON);
        let hard = BotConfig::preset(Difficulty::Hard);
        assert!((hard.aggression - 0.70).abs() < f64::EPSILON);
        assert_eq!(BotConfig::default(), BotConfig::preset(Difficulty::Normal));
    }

    #[test]
    fn test_parse_falls_back_to_normal() {
        assert_eq!(Difficulty::parse_or_normal("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::parse_or_normal("nightmare"), Difficulty::Normal);
    }

    #[test]
    fn test_builders_clamp() {
        let config = BotConfig::default().with_error_rate(3.0).with_aggression(-1.0);
        assert!((config.error_rate - 1.0).abs() < f64::EPSILON);
        assert!(config.aggression.abs() < f64::EPSILON);
    }
}
