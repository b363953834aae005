//! Rejection and failure types for the state machine.
//!
//! Every rejection happens before the engine touches its working copy, so a
//! rejected action never changes the document. Each error carries:
//!
//! - a stable reason `code()` for clients
//! - an [`ErrorKind`] telling the caller whether to surface it to the user
//!   (authorization, precondition) or abort the transaction (internal)
//!
//! Content defects in card scripts are not errors at all: the interpreter
//! skips the bad op and logs it.

use crate::core::{ParticipantId, Phase};

/// Category of a rejected action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong actor or not in the match.
    Authorization,
    /// Action not legal right now, or the request itself is malformed.
    Precondition,
    /// The engine found the match in a state it must not commit.
    Internal,
}

impl ErrorKind {
    /// Lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authorization => "authorization",
            Self::Precondition => "precondition",
            Self::Internal => "internal",
        }
    }

    /// Returns true if the transaction must be aborted.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// An internal invariant the interpreter refused to break.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("resolution attempted on a finished match")]
    ResolveFinishedMatch,

    #[error("resolution exceeded {limit} steps")]
    StepBudgetExceeded { limit: usize },
}

/// Why an action was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    // === Authorization ===
    #[error("{0} is not a participant in this match")]
    NotParticipant(ParticipantId),

    #[error("it is {current}'s turn, not {actor}'s")]
    NotYourTurn { actor: ParticipantId, current: ParticipantId },

    #[error("only the defender {defender} may answer this threat")]
    NotDefender { defender: ParticipantId },

    // === Preconditions ===
    #[error("request is for match {requested}, not {actual}")]
    WrongMatch { requested: String, actual: String },

    #[error("match is finished")]
    MatchFinished,

    #[error("{0} has been defeated")]
    ActorDefeated(ParticipantId),

    #[error("{action} is not allowed during the {phase} phase")]
    WrongPhase { action: &'static str, phase: Phase },

    #[error("card {0} is not in hand")]
    CardNotInHand(String),

    #[error("card {0} cannot be played this way")]
    WrongCardType(String),

    #[error("not enough ki: need {need}, have {have}")]
    InsufficientKi { need: i64, have: i64 },

    #[error("reaction limit of {limit} per turn reached")]
    ReactionLimit { limit: u32 },

    #[error("the reaction window has closed")]
    ReactionWindowClosed,

    #[error("the acting player cannot react to their own card")]
    CannotReactToOwnCard,

    #[error("cannot pray while holding an attackable card")]
    HoldsAttackableCard,

    #[error("invalid target {0}")]
    InvalidTarget(String),

    #[error("malformed request: {0}")]
    MalformedPayload(String),

    // === Internal ===
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl ActionError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotParticipant(_) | Self::NotYourTurn { .. } | Self::NotDefender { .. } => {
                ErrorKind::Authorization
            }
            Self::Invariant(_) => ErrorKind::Internal,
            _ => ErrorKind::Precondition,
        }
    }

    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotParticipant(_) => "not_participant",
            Self::NotYourTurn { .. } => "not_your_turn",
            Self::NotDefender { .. } => "not_defender",
            Self::WrongMatch { .. } => "wrong_match",
            Self::MatchFinished => "match_finished",
            Self::ActorDefeated(_) => "actor_defeated",
            Self::WrongPhase { .. } => "wrong_phase",
            Self::CardNotInHand(_) => "card_not_in_hand",
            Self::WrongCardType(_) => "wrong_card_type",
            Self::InsufficientKi { .. } => "insufficient_ki",
            Self::ReactionLimit { .. } => "reaction_limit",
            Self::ReactionWindowClosed => "reaction_window_closed",
            Self::CannotReactToOwnCard => "cannot_react_to_own_card",
            Self::HoldsAttackableCard => "holds_attackable_card",
            Self::InvalidTarget(_) => "invalid_target",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Invariant(InvariantViolation::ResolveFinishedMatch) => "resolve_finished_match",
            Self::Invariant(InvariantViolation::StepBudgetExceeded { .. }) => "step_budget_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = ActionError::NotYourTurn { actor: ParticipantId::new("p2"), current: ParticipantId::new("p1") };
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.code(), "not_your_turn");
        assert_eq!(err.to_string(), "it is p1's turn, not p2's");

        let err = ActionError::InsufficientKi { need: 3, have: 1 };
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err: ActionError = InvariantViolation::StepBudgetExceeded { limit: 5 }.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.kind().is_fatal());
        assert_eq!(err.code(), "step_budget_exceeded");
    }

    #[test]
    fn test_wrong_phase_message() {
        let err = ActionError::WrongPhase { action: "playCard", phase: Phase::Reaction };
        assert_eq!(err.to_string(), "playCard is not allowed during the reaction phase");
        assert_eq!(ErrorKind::Precondition.as_str(), "precondition");
    }
}
