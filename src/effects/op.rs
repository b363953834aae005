//! The effect script grammar.
//!
//! ## Op
//!
//! One unit of a card's effect. The wire form is a JSON object tagged by
//! `op`; the remaining fields depend on the tag. Branch-bearing ops (`if`,
//! `random`, `forEach`, `addTrigger`, `delay`, `onDeath`) own nested op
//! lists, bounded to [`MAX_NESTING_DEPTH`] levels.
//!
//! ```
//! use card_battle::effects::{Op, TargetSpec, Value};
//!
//! let op: Op = serde_json::from_str(r#"{"op":"damage","amount":10,"target":"enemy"}"#).unwrap();
//! assert_eq!(op, Op::Damage { amount: Value::Literal(10), target: TargetSpec::Enemy, attribute: None });
//! ```

use serde::{Deserialize, Serialize};

use super::expr::{Condition, Value};
use super::targeting::TargetSpec;
use crate::cards::Attribute;
use crate::core::{EquipSlot, Phase, Stat};
use crate::triggers::EventKind;

/// Maximum nesting depth of branch-bearing ops.
pub const MAX_NESTING_DEPTH: u8 = 3;

/// Which end of the hand a discard takes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscardFrom {
    #[default]
    Newest,
    Oldest,
    Random,
}

fn default_uses() -> u32 {
    1
}

fn default_delay_phase() -> Phase {
    Phase::Main
}

/// A single effect operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Op {
    /// Subtract `amount` from the target's hp (shield absorbs first).
    Damage {
        amount: Value,
        target: TargetSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<Attribute>,
    },

    /// Restore a resource, bounded by its max.
    Heal {
        amount: Value,
        target: TargetSpec,
        #[serde(default)]
        stat: Stat,
    },

    /// Add absorb points consumed before hp.
    Shield { amount: Value, target: TargetSpec },

    /// Move cards from the shared draw pool into the target's hand.
    Draw { count: Value, target: TargetSpec },

    /// Move cards from the target's hand into the discard pile.
    Discard {
        count: Value,
        target: TargetSpec,
        #[serde(default)]
        from: DiscardFrom,
    },

    #[serde(alias = "add_marker")]
    AddMarker {
        name: String,
        turns: Value,
        target: TargetSpec,
    },

    #[serde(alias = "apply_disaster")]
    ApplyDisaster {
        name: String,
        turns: Value,
        #[serde(default)]
        potency: Value,
        target: TargetSpec,
    },

    #[serde(alias = "remove_disaster")]
    RemoveDisaster {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        target: TargetSpec,
    },

    /// Add a signed delta to a stat.
    #[serde(alias = "modify_stat")]
    ModifyStat {
        stat: Stat,
        amount: Value,
        target: TargetSpec,
    },

    /// Bind a pass-local integer variable.
    #[serde(alias = "set_var")]
    SetVar { var: String, value: Value },

    /// Conditional branch.
    If {
        cond: Condition,
        #[serde(default)]
        then: Vec<Op>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Op>,
    },

    /// Run `actions` once per resolved participant, binding `loop_var`.
    #[serde(alias = "for_each")]
    ForEach {
        target: TargetSpec,
        #[serde(rename = "loopVar", alias = "loop_var")]
        loop_var: String,
        actions: Vec<Op>,
    },

    /// Filter participants into a named variable.
    Find {
        #[serde(rename = "type", default)]
        kind: String,
        #[serde(default)]
        filters: Vec<String>,
        var: String,
    },

    /// Register `actions` to fire when `event` next happens to the target.
    #[serde(alias = "add_trigger")]
    AddTrigger {
        event: EventKind,
        actions: Vec<Op>,
        target: TargetSpec,
        #[serde(default = "default_uses")]
        uses: u32,
    },

    /// Chance-gated branch.
    Random {
        chance: f64,
        #[serde(default)]
        then: Vec<Op>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Op>,
    },

    /// Schedule `actions` for `turn + turns` in `phase`.
    Delay {
        turns: Value,
        #[serde(default = "default_delay_phase")]
        phase: Phase,
        actions: Vec<Op>,
        target: TargetSpec,
    },

    /// Defeat the target outright when its hp is at or below the threshold.
    Execute { threshold: Value, target: TargetSpec },

    /// Run `actions` when the target is defeated, even posthumously.
    #[serde(alias = "on_death")]
    OnDeath { actions: Vec<Op>, target: TargetSpec },

    Lifesteal { percent: Value, target: TargetSpec },

    #[serde(alias = "reflect_damage")]
    ReflectDamage { percent: Value, target: TargetSpec },

    Equip {
        slot: EquipSlot,
        #[serde(default)]
        name: String,
        #[serde(default)]
        power: Value,
        #[serde(default)]
        defense: Value,
        target: TargetSpec,
    },

    #[serde(alias = "change_attribute")]
    ChangeAttribute {
        attribute: Attribute,
        target: TargetSpec,
    },
}

impl Op {
    /// Canonical wire tag.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Op::Damage { .. } => "damage",
            Op::Heal { .. } => "heal",
            Op::Shield { .. } => "shield",
            Op::Draw { .. } => "draw",
            Op::Discard { .. } => "discard",
            Op::AddMarker { .. } => "addMarker",
            Op::ApplyDisaster { .. } => "applyDisaster",
            Op::RemoveDisaster { .. } => "removeDisaster",
            Op::ModifyStat { .. } => "modifyStat",
            Op::SetVar { .. } => "setVar",
            Op::If { .. } => "if",
            Op::ForEach { .. } => "forEach",
            Op::Find { .. } => "find",
            Op::AddTrigger { .. } => "addTrigger",
            Op::Random { .. } => "random",
            Op::Delay { .. } => "delay",
            Op::Execute { .. } => "execute",
            Op::OnDeath { .. } => "onDeath",
            Op::Lifesteal { .. } => "lifesteal",
            Op::ReflectDamage { .. } => "reflectDamage",
            Op::Equip { .. } => "equip",
            Op::ChangeAttribute { .. } => "changeAttribute",
        }
    }

    /// Whether the op hurts its target.
    #[must_use]
    pub fn is_harmful(&self) -> bool {
        is_harmful_tag(self.tag())
    }

    /// The target token, for ops that take one.
    #[must_use]
    pub fn target(&self) -> Option<&TargetSpec> {
        match self {
            Op::Damage { target, .. }
            | Op::Heal { target, .. }
            | Op::Shield { target, .. }
            | Op::Draw { target, .. }
            | Op::Discard { target, .. }
            | Op::AddMarker { target, .. }
            | Op::ApplyDisaster { target, .. }
            | Op::RemoveDisaster { target, .. }
            | Op::ModifyStat { target, .. }
            | Op::ForEach { target, .. }
            | Op::AddTrigger { target, .. }
            | Op::Delay { target, .. }
            | Op::Execute { target, .. }
            | Op::OnDeath { target, .. }
            | Op::Lifesteal { target, .. }
            | Op::ReflectDamage { target, .. }
            | Op::Equip { target, .. }
            | Op::ChangeAttribute { target, .. } => Some(target),
            Op::SetVar { .. } | Op::If { .. } | Op::Find { .. } | Op::Random { .. } => None,
        }
    }

    /// Nested op lists owned by this op.
    #[must_use]
    pub fn branches(&self) -> Vec<&[Op]> {
        match self {
            Op::If { then, otherwise, .. } | Op::Random { then, otherwise, .. } => {
                vec![then.as_slice(), otherwise.as_slice()]
            }
            Op::ForEach { actions, .. }
            | Op::AddTrigger { actions, .. }
            | Op::Delay { actions, .. }
            | Op::OnDeath { actions, .. } => vec![actions.as_slice()],
            _ => Vec::new(),
        }
    }

    /// Depth of the deepest nested op, counting this one as 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self
            .branches()
            .into_iter()
            .flat_map(|ops| ops.iter().map(Op::depth))
            .max()
            .unwrap_or(0)
    }
}

/// Harmful ops default to the first enemy; everything else to the caster.
#[must_use]
pub fn is_harmful_tag(tag: &str) -> bool {
    matches!(tag, "damage" | "discard" | "applyDisaster" | "execute")
}

/// The target a missing `target` field defaults to, if the op takes one.
#[must_use]
pub fn default_target_for(tag: &str) -> Option<TargetSpec> {
    match tag {
        "setVar" | "if" | "find" | "random" => None,
        "forEach" => Some(TargetSpec::AllEnemies),
        t if is_harmful_tag(t) => Some(TargetSpec::Enemy),
        _ => Some(TargetSpec::Caster),
    }
}
