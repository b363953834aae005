//! Match event types.
//!
//! Events are emitted by the interpreter (damage, healing) and the state
//! machine (turn boundaries, card plays, defeats). Triggers registered by
//! `addTrigger` / `onDeath` listen for exactly one kind.

use serde::{Deserialize, Serialize};

use crate::core::ParticipantId;

/// Kind of event a trigger listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The subject lost hp.
    #[serde(alias = "damage", alias = "onDamage", alias = "on_damage", alias = "damageTaken")]
    Damaged,
    /// The subject regained hp.
    #[serde(alias = "heal", alias = "onHeal", alias = "on_heal")]
    Healed,
    /// The subject's turn began.
    #[serde(alias = "turnStart", alias = "onTurnStart")]
    TurnStart,
    /// The subject's turn ended.
    #[serde(alias = "turnEnd", alias = "onTurnEnd")]
    TurnEnd,
    /// The subject played a card.
    #[serde(alias = "cardPlayed", alias = "onPlay")]
    CardPlayed,
    /// The subject was defeated.
    #[serde(alias = "death", alias = "onDeath", alias = "died")]
    Defeated,
}

impl EventKind {
    /// Snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Damaged => "damaged",
            EventKind::Healed => "healed",
            EventKind::TurnStart => "turn_start",
            EventKind::TurnEnd => "turn_end",
            EventKind::CardPlayed => "card_played",
            EventKind::Defeated => "defeated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,

    /// Who the event happened to (the trigger owner it matches).
    pub subject: ParticipantId,

    /// Who caused it, if anyone.
    pub source: Option<ParticipantId>,

    /// Amount involved (damage dealt, hp healed), or 0.
    pub amount: i64,
}

impl GameEvent {
    /// Create an event with no source or amount.
    #[must_use]
    pub fn new(kind: EventKind, subject: ParticipantId) -> Self {
        Self {
            kind,
            subject,
            source: None,
            amount: 0,
        }
    }

    /// Set who caused the event (builder pattern).
    #[must_use]
    pub fn with_source(mut self, source: ParticipantId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the amount (builder pattern).
    #[must_use]
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// A `damaged` event.
    #[must_use]
    pub fn damaged(subject: ParticipantId, source: ParticipantId, amount: i64) -> Self {
        Self::new(EventKind::Damaged, subject).with_source(source).with_amount(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        let kind: EventKind = serde_json::from_str("\"onDamage\"").unwrap();
        assert_eq!(kind, EventKind::Damaged);
        let kind: EventKind = serde_json::from_str("\"turnStart\"").unwrap();
        assert_eq!(kind, EventKind::TurnStart);
        assert_eq!(serde_json::to_string(&EventKind::CardPlayed).unwrap(), "\"card_played\"");
    }

    #[test]
    fn test_damaged_builder() {
        let e = GameEvent::damaged(ParticipantId::new("p2"), ParticipantId::new("p1"), 4);
        assert_eq!(e.kind, EventKind::Damaged);
        assert_eq!(e.source, Some(ParticipantId::new("p1")));
        assert_eq!(e.amount, 4);
    }
}
