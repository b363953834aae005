//! Rules engine trait.
//!
//! The state machine is a pure function over match documents: it takes the
//! last committed state and a request, and either rejects the request or
//! returns a whole new state plus the log entries the action produced.
//! Persistence and retries live outside (see [`crate::store`]).

use crate::core::{ActionRequest, Match, ParticipantId};
use crate::core::LogRecord;

use super::error::ActionError;

/// Result of a completed match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameResult {
    /// Single survivor.
    Winner(ParticipantId),
    /// Nobody left standing.
    Draw,
}

impl GameResult {
    /// Check if a participant won.
    #[must_use]
    pub fn is_winner(&self, participant: &ParticipantId) -> bool {
        match self {
            GameResult::Winner(p) => p == participant,
            GameResult::Draw => false,
        }
    }
}

/// An accepted action.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// The complete next state, ready to commit.
    pub state: Match,
    /// Entries appended by this action, in order.
    pub log: Vec<LogRecord>,
}

impl Transition {
    /// A request that was accepted but had nothing to do. The state keeps
    /// its version, so there is nothing to commit.
    #[must_use]
    pub fn unchanged(state: Match) -> Self {
        Self { state, log: Vec::new() }
    }

    /// Whether the transition ended the match.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.state.is_finished()
    }
}

/// Rules engine trait.
///
/// ## Implementation Notes
///
/// - `apply` must not mutate its input; every rejection leaves the caller's
///   document exactly as it was.
/// - `apply` must be deterministic: the same state, request and clock give
///   the same transition.
/// - `advance_if_due` is idempotent: once a window has been processed the
///   phase has moved on and a repeated call returns `None`.
pub trait RulesEngine {
    /// Validate and apply a request from an authenticated actor.
    fn apply(
        &self,
        state: &Match,
        actor: &ParticipantId,
        request: &ActionRequest,
        now_ms: u64,
    ) -> Result<Transition, ActionError>;

    /// Process an elapsed reaction or threat window, if any.
    fn advance_if_due(&self, state: &Match, now_ms: u64) -> Result<Option<Transition>, ActionError>;

    /// Check if the match is over.
    fn is_terminal(&self, state: &Match) -> Option<GameResult> {
        if !state.is_finished() {
            return None;
        }
        Some(match &state.winner {
            Some(winner) => GameResult::Winner(winner.clone()),
            None => GameResult::Draw,
        })
    }
}
