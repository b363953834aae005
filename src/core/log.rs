//! Structured match log.
//!
//! One `LogRecord` per effect or state-machine event, appended to the match
//! document and never rewritten. The wire form is flat:
//!
//! ```json
//! {"turn": 3, "type": "damage", "caster": "p1", "target": "p2", "amount": 10, "source": "Bolt"}
//! ```

use serde::{Deserialize, Serialize};

use super::config::Phase;
use super::participant::{CombatFlag, EquipSlot, ParticipantId, Stat};
use crate::cards::{Attribute, Matchup};
use crate::triggers::EventKind;

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    // === Effects ===
    Damage {
        caster: ParticipantId,
        target: ParticipantId,
        /// Hp lost (after shield).
        amount: i64,
        #[serde(default, skip_serializing_if = "is_zero")]
        absorbed: i64,
        source: String,
    },
    Heal {
        caster: ParticipantId,
        target: ParticipantId,
        stat: Stat,
        amount: i64,
        source: String,
    },
    Shield {
        caster: ParticipantId,
        target: ParticipantId,
        amount: i64,
        source: String,
    },
    Draw {
        target: ParticipantId,
        count: usize,
        source: String,
    },
    Discard {
        target: ParticipantId,
        count: usize,
        source: String,
    },
    AddMarker {
        target: ParticipantId,
        marker: String,
        turns: i64,
        source: String,
    },
    Disaster {
        target: ParticipantId,
        name: String,
        turns: i64,
        potency: i64,
        source: String,
    },
    DisasterRemoved {
        target: ParticipantId,
        removed: usize,
        source: String,
    },
    StatChanged {
        target: ParticipantId,
        stat: Stat,
        delta: i64,
        value: i64,
        source: String,
    },
    Variable {
        name: String,
        value: i64,
        source: String,
    },
    Condition {
        cond: String,
        result: bool,
        source: String,
    },
    Random {
        chance: f64,
        roll: f64,
        success: bool,
        source: String,
    },
    Find {
        var: String,
        matched: Vec<ParticipantId>,
        source: String,
    },
    TriggerRegistered {
        owner: ParticipantId,
        event: EventKind,
        source: String,
    },
    TriggerFired {
        owner: ParticipantId,
        event: EventKind,
        source: String,
    },
    DelayScheduled {
        fire_turn: u32,
        phase: Phase,
        source: String,
    },
    DelayFired {
        phase: Phase,
        source: String,
    },
    Execute {
        caster: ParticipantId,
        target: ParticipantId,
        threshold: i64,
        success: bool,
        source: String,
    },
    Lifesteal {
        caster: ParticipantId,
        amount: i64,
        source: String,
    },
    Reflect {
        from: ParticipantId,
        to: ParticipantId,
        amount: i64,
        source: String,
    },
    FlagSet {
        target: ParticipantId,
        flag: CombatFlag,
        percent: i64,
        source: String,
    },
    Equip {
        target: ParticipantId,
        slot: EquipSlot,
        name: String,
        source: String,
    },
    AttributeChanged {
        target: ParticipantId,
        attribute: Attribute,
        source: String,
    },
    /// An op whose target token named nothing.
    Skipped {
        op: String,
        reason: String,
        source: String,
    },

    // === State machine ===
    CardPlayed {
        caster: ParticipantId,
        card: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ParticipantId>,
    },
    Reaction {
        caster: ParticipantId,
        card: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ParticipantId>,
    },
    TurnEnded {
        actor: ParticipantId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expired: Vec<String>,
    },
    TurnStarted {
        actor: ParticipantId,
        ki: i64,
        drew: bool,
    },
    Attack {
        attacker: ParticipantId,
        defender: ParticipantId,
        power: i64,
        attribute: Attribute,
        source: String,
    },
    Defend {
        defender: ParticipantId,
        block: i64,
        matchup: Matchup,
        damage: i64,
    },
    Pray {
        actor: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discarded: Option<String>,
        drew: usize,
    },
    Defeated {
        participant: ParticipantId,
    },
    GameOver {
        /// `None` is a draw.
        winner: Option<ParticipantId>,
    },
}

impl LogEntry {
    /// Wire `type` of this entry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            LogEntry::Damage { .. } => "damage",
            LogEntry::Heal { .. } => "heal",
            LogEntry::Shield { .. } => "shield",
            LogEntry::Draw { .. } => "draw",
            LogEntry::Discard { .. } => "discard",
            LogEntry::AddMarker { .. } => "add_marker",
            LogEntry::Disaster { .. } => "disaster",
            LogEntry::DisasterRemoved { .. } => "disaster_removed",
            LogEntry::StatChanged { .. } => "stat_changed",
            LogEntry::Variable { .. } => "variable",
            LogEntry::Condition { .. } => "condition",
            LogEntry::Random { .. } => "random",
            LogEntry::Find { .. } => "find",
            LogEntry::TriggerRegistered { .. } => "trigger_registered",
            LogEntry::TriggerFired { .. } => "trigger_fired",
            LogEntry::DelayScheduled { .. } => "delay_scheduled",
            LogEntry::DelayFired { .. } => "delay_fired",
            LogEntry::Execute { .. } => "execute",
            LogEntry::Lifesteal { .. } => "lifesteal",
            LogEntry::Reflect { .. } => "reflect",
            LogEntry::FlagSet { .. } => "flag_set",
            LogEntry::Equip { .. } => "equip",
            LogEntry::AttributeChanged { .. } => "attribute_changed",
            LogEntry::Skipped { .. } => "skipped",
            LogEntry::CardPlayed { .. } => "card_played",
            LogEntry::Reaction { .. } => "reaction",
            LogEntry::TurnEnded { .. } => "turn_ended",
            LogEntry::TurnStarted { .. } => "turn_started",
            LogEntry::Attack { .. } => "attack",
            LogEntry::Defend { .. } => "defend",
            LogEntry::Pray { .. } => "pray",
            LogEntry::Defeated { .. } => "defeated",
            LogEntry::GameOver { .. } => "game_over",
        }
    }
}

/// A log entry stamped with the turn it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub turn: u32,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_flat() {
        let record = LogRecord {
            turn: 2,
            entry: LogEntry::Damage {
                caster: ParticipantId::new("p1"),
                target: ParticipantId::new("p2"),
                amount: 10,
                absorbed: 0,
                source: "Bolt".into(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "turn": 2, "type": "damage", "caster": "p1", "target": "p2",
                "amount": 10, "source": "Bolt"
            })
        );
        let back: LogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_kind_matches_tag() {
        let entry = LogEntry::GameOver { winner: None };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], entry.kind());
        assert!(json["winner"].is_null());
    }
}
