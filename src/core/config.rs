//! Engine configuration and match phases.
//!
//! - `Phase`: where a match is in the turn cycle
//! - `MatchStatus`: active or finished
//! - `EngineConfig`: windows, caps and budgets the state machine and the
//!   interpreter read
//!
//! `EngineConfig` is plain serde data so deployments can load it from JSON;
//! unspecified fields take their defaults.

use serde::{Deserialize, Serialize};

/// Turn phase.
///
/// ```text
/// main --play--> reaction --window--> resolve --> end --endTurn--> main
/// main --attack--> threat --defend/timeout--> main
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Main,
    Reaction,
    Resolve,
    End,
    Threat,
}

impl Phase {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Reaction => "reaction",
            Phase::Resolve => "resolve",
            Phase::End => "end",
            Phase::Threat => "threat",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match lifecycle status. A finished match is immutable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Active,
    Finished,
}

/// Failure to load a configuration document.
#[derive(Debug, thiserror::Error)]
#[error("invalid engine config: {0}")]
pub struct ConfigError(#[from] serde_json::Error);

/// Engine tuning.
///
/// ## Example
///
/// ```
/// use card_battle::core::EngineConfig;
///
/// let config = EngineConfig::default().with_reaction_window_ms(0);
/// assert_eq!(config.reaction_window_ms, 0);
///
/// let loaded = EngineConfig::from_json(r#"{"reactionCap": 1}"#).unwrap();
/// assert_eq!(loaded.reaction_cap, 1);
/// assert_eq!(loaded.max_nesting_depth, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// How long opponents may react after a card is played.
    /// Zero resolves synchronously.
    pub reaction_window_ms: u64,

    /// How long a defender has to answer a threat.
    pub threat_window_ms: u64,

    /// Reactions each participant may play per turn.
    pub reaction_cap: u32,

    /// Nesting depth the interpreter will expand.
    pub max_nesting_depth: u8,

    /// Ops a single resolution pass may pop before aborting.
    pub max_steps_per_pass: usize,

    /// Percent of base damage kept when blocking with the opposing attribute.
    pub resisted_pct: i64,

    /// Percent of base damage dealt to a defender of the opposing attribute.
    pub weakness_pct: i64,

    /// Cards drawn by `PRAY`.
    pub pray_draw: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reaction_window_ms: 3_000,
            threat_window_ms: 15_000,
            reaction_cap: 2,
            max_nesting_depth: crate::effects::MAX_NESTING_DEPTH,
            max_steps_per_pass: 10_000,
            resisted_pct: 50,
            weakness_pct: 150,
            pray_draw: 2,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the reaction window (builder pattern).
    #[must_use]
    pub fn with_reaction_window_ms(mut self, ms: u64) -> Self {
        self.reaction_window_ms = ms;
        self
    }

    /// Set the threat window (builder pattern).
    #[must_use]
    pub fn with_threat_window_ms(mut self, ms: u64) -> Self {
        self.threat_window_ms = ms;
        self
    }

    /// Set the per-turn reaction cap (builder pattern).
    #[must_use]
    pub fn with_reaction_cap(mut self, cap: u32) -> Self {
        self.reaction_cap = cap;
        self
    }

    /// Set the step budget (builder pattern).
    #[must_use]
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps_per_pass = steps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reaction_cap, 2);
        assert_eq!(config.max_nesting_depth, 3);
        assert_eq!(config.resisted_pct, 50);
        assert_eq!(config.weakness_pct, 150);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"reactionWindowMs": 0, "maxStepsPerPass": 64}"#).unwrap();
        assert_eq!(config.reaction_window_ms, 0);
        assert_eq!(config.max_steps_per_pass, 64);
        assert_eq!(config.threat_window_ms, EngineConfig::default().threat_window_ms);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = EngineConfig::from_json("{\"reactionCap\": \"many\"}").unwrap_err();
        assert!(err.to_string().starts_with("invalid engine config"));
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&Phase::Reaction).unwrap(), "\"reaction\"");
        assert_eq!(Phase::Threat.to_string(), "threat");
        assert_eq!(serde_json::to_string(&MatchStatus::Finished).unwrap(), "\"finished\"");
    }
}
