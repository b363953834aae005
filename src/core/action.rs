//! Action requests: what a participant asks the engine to do.
//!
//! Requests arrive as JSON tagged by `action`. The authenticated actor id is
//! not part of the request; the caller supplies it alongside.
//!
//! ```
//! use card_battle::core::ActionRequest;
//!
//! let req: ActionRequest =
//!     serde_json::from_str(r#"{"action":"playCard","matchId":"m1","cardId":"bolt#1","targetId":"p2"}"#).unwrap();
//! assert!(req.validate().is_ok());
//! assert_eq!(req.match_id(), "m1");
//! ```

use serde::{Deserialize, Serialize};

use super::participant::ParticipantId;
use crate::rules::ActionError;

/// Combat sub-cycle verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombatAction {
    Attack,
    Defend,
    Pray,
}

/// Payload of a combat action. Which fields matter depends on the verb.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CombatPayload {
    /// Weapon used by `ATTACK`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    /// Defender chosen by `ATTACK`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ParticipantId>,
    /// Armor used by `DEFEND` (may be empty to take the hit).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub card_ids: Vec<String>,
}

/// A request against one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionRequest {
    /// Play a card from hand during the main phase.
    PlayCard {
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "cardId")]
        card_id: String,
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ParticipantId>,
    },
    /// Interject a reaction card during the reaction window.
    React {
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "cardId")]
        card_id: String,
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ParticipantId>,
    },
    EndTurn {
        #[serde(rename = "matchId")]
        match_id: String,
    },
    /// Re-check deadlines; a no-op unless a window has elapsed.
    Advance {
        #[serde(rename = "matchId")]
        match_id: String,
    },
    PlayerAction {
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "actionType")]
        action_type: CombatAction,
        #[serde(default)]
        payload: CombatPayload,
    },
}

impl ActionRequest {
    /// `playCard` request.
    #[must_use]
    pub fn play_card(match_id: &str, card_id: &str, target: Option<&str>) -> Self {
        ActionRequest::PlayCard {
            match_id: match_id.to_string(),
            card_id: card_id.to_string(),
            target_id: target.map(ParticipantId::new),
        }
    }

    /// `react` request.
    #[must_use]
    pub fn react(match_id: &str, card_id: &str, target: Option<&str>) -> Self {
        ActionRequest::React {
            match_id: match_id.to_string(),
            card_id: card_id.to_string(),
            target_id: target.map(ParticipantId::new),
        }
    }

    /// `endTurn` request.
    #[must_use]
    pub fn end_turn(match_id: &str) -> Self {
        ActionRequest::EndTurn {
            match_id: match_id.to_string(),
        }
    }

    /// `advance` request.
    #[must_use]
    pub fn advance(match_id: &str) -> Self {
        ActionRequest::Advance {
            match_id: match_id.to_string(),
        }
    }

    /// `ATTACK` with a weapon at a defender.
    #[must_use]
    pub fn attack(match_id: &str, weapon: &str, defender: &str) -> Self {
        ActionRequest::PlayerAction {
            match_id: match_id.to_string(),
            action_type: CombatAction::Attack,
            payload: CombatPayload {
                card_id: Some(weapon.to_string()),
                target_id: Some(ParticipantId::new(defender)),
                card_ids: Vec::new(),
            },
        }
    }

    /// `DEFEND` with zero or more armor cards.
    #[must_use]
    pub fn defend(match_id: &str, armor: &[&str]) -> Self {
        ActionRequest::PlayerAction {
            match_id: match_id.to_string(),
            action_type: CombatAction::Defend,
            payload: CombatPayload {
                card_ids: armor.iter().map(|s| s.to_string()).collect(),
                ..CombatPayload::default()
            },
        }
    }

    /// `PRAY`.
    #[must_use]
    pub fn pray(match_id: &str) -> Self {
        ActionRequest::PlayerAction {
            match_id: match_id.to_string(),
            action_type: CombatAction::Pray,
            payload: CombatPayload::default(),
        }
    }

    /// Target match.
    #[must_use]
    pub fn match_id(&self) -> &str {
        match self {
            ActionRequest::PlayCard { match_id, .. }
            | ActionRequest::React { match_id, .. }
            | ActionRequest::EndTurn { match_id }
            | ActionRequest::Advance { match_id }
            | ActionRequest::PlayerAction { match_id, .. } => match_id,
        }
    }

    /// Short name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ActionRequest::PlayCard { .. } => "playCard",
            ActionRequest::React { .. } => "react",
            ActionRequest::EndTurn { .. } => "endTurn",
            ActionRequest::Advance { .. } => "advance",
            ActionRequest::PlayerAction { action_type: CombatAction::Attack, .. } => "attack",
            ActionRequest::PlayerAction { action_type: CombatAction::Defend, .. } => "defend",
            ActionRequest::PlayerAction { action_type: CombatAction::Pray, .. } => "pray",
        }
    }

    /// Parameter validation, independent of match state.
    pub fn validate(&self) -> Result<(), ActionError> {
        let malformed = |msg: &str| Err(ActionError::MalformedPayload(msg.to_string()));
        if self.match_id().trim().is_empty() {
            return malformed("matchId is empty");
        }
        match self {
            ActionRequest::PlayCard { card_id, target_id, .. } | ActionRequest::React { card_id, target_id, .. } => {
                if card_id.trim().is_empty() {
                    return malformed("cardId is empty");
                }
                if target_id.as_ref().is_some_and(|t| t.as_str().trim().is_empty()) {
                    return malformed("targetId is empty");
                }
            }
            ActionRequest::PlayerAction { action_type, payload, .. } => match action_type {
                CombatAction::Attack => {
                    if payload.card_id.as_deref().map_or(true, |c| c.trim().is_empty()) {
                        return malformed("ATTACK needs payload.cardId");
                    }
                    if payload.target_id.as_ref().map_or(true, |t| t.as_str().trim().is_empty()) {
                        return malformed("ATTACK needs payload.targetId");
                    }
                }
                CombatAction::Defend => {
                    let mut seen = rustc_hash::FxHashSet::default();
                    if !payload.card_ids.iter().all(|c| seen.insert(c.as_str())) {
                        return malformed("DEFEND lists a card twice");
                    }
                }
                CombatAction::Pray => {}
            },
            ActionRequest::EndTurn { .. } | ActionRequest::Advance { .. } => {}
        }
        Ok(())
    }
}
