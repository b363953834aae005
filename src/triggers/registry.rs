//! Trigger registry.
//!
//! Stores the deferred reactions a match is waiting on:
//!
//! - **Triggers** (`addTrigger`, `onDeath`): fire when an event of their kind
//!   happens to their owner. Each has a use count and is dropped when it
//!   reaches zero.
//! - **Delayed effects** (`delay`): fire once the match reaches their turn
//!   and phase.
//!
//! The registry lives in the match document, so registrations survive
//! between actions. Firing only produces bound ops; the caller decides
//! where on the pending stack they go.

use serde::{Deserialize, Serialize};

use super::event::{EventKind, GameEvent};
use crate::core::{ParticipantId, Phase};
use crate::effects::Op;
use crate::stack::BoundOp;

/// Unique identifier for a trigger or delayed effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

impl TriggerId {
    /// Create a new trigger ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Trigger({})", self.0)
    }
}

/// A registered reaction to a future event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Assigned by the registry.
    #[serde(default = "unassigned")]
    pub id: TriggerId,

    /// Whose events this trigger watches.
    pub owner: ParticipantId,

    pub event: EventKind,

    /// Who the fired ops act for.
    pub caster: ParticipantId,

    /// Card name, for logs.
    pub source: String,

    pub actions: Vec<Op>,

    pub uses_remaining: u32,

    /// Nesting depth the fired ops start at.
    #[serde(default)]
    pub depth: u8,
}

fn unassigned() -> TriggerId {
    TriggerId(0)
}

impl Trigger {
    /// Create a one-shot trigger.
    #[must_use]
    pub fn new(owner: ParticipantId, event: EventKind, caster: ParticipantId, source: &str) -> Self {
        Self {
            id: unassigned(),
            owner,
            event,
            caster,
            source: source.to_string(),
            actions: Vec::new(),
            uses_remaining: 1,
            depth: 0,
        }
    }

    /// Set the fired ops (builder pattern).
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Op>) -> Self {
        self.actions = actions;
        self
    }

    /// Set how many times it may fire (builder pattern).
    #[must_use]
    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses_remaining = uses.max(1);
        self
    }

    /// Set the starting depth of fired ops (builder pattern).
    #[must_use]
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    /// Whether this trigger reacts to the event.
    #[must_use]
    pub fn matches(&self, event: &GameEvent) -> bool {
        self.event == event.kind && self.owner == event.subject
    }

    fn bind(&self, event: &GameEvent) -> Vec<BoundOp> {
        // Fired ops default to whoever caused the event.
        let target = event.source.clone().unwrap_or_else(|| self.owner.clone());
        self.actions
            .iter()
            .map(|op| {
                let mut bound = BoundOp::new(op.clone(), self.caster.clone(), Some(target.clone()), &self.source);
                bound.depth = self.depth;
                if self.event == EventKind::Defeated {
                    bound = bound.posthumous();
                }
                bound
            })
            .collect()
    }
}

/// A trigger that matched an event.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredTrigger {
    pub id: TriggerId,
    pub owner: ParticipantId,
    pub event: EventKind,
    pub source: String,
    /// Bound ops, in script order.
    pub ops: Vec<BoundOp>,
}

/// Ops scheduled for a later turn and phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayedEffect {
    pub id: TriggerId,
    pub fire_turn: u32,
    pub phase: Phase,
    pub source: String,
    pub ops: Vec<BoundOp>,
}

/// Storage for triggers and delayed effects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRegistry {
    #[serde(default)]
    triggers: Vec<Trigger>,
    #[serde(default)]
    delayed: Vec<DelayedEffect>,
    #[serde(default)]
    next_id: u32,
}

impl TriggerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TriggerId {
        self.next_id += 1;
        TriggerId(self.next_id)
    }

    /// Register a trigger, assigning its id.
    pub fn register(&mut self, mut trigger: Trigger) -> TriggerId {
        let id = self.allocate();
        trigger.id = id;
        tracing::debug!(%id, owner = %trigger.owner, event = %trigger.event, "trigger registered");
        self.triggers.push(trigger);
        id
    }

    /// Schedule bound ops for `fire_turn` in `phase`.
    pub fn schedule(&mut self, fire_turn: u32, phase: Phase, source: &str, ops: Vec<BoundOp>) -> TriggerId {
        let id = self.allocate();
        self.delayed.push(DelayedEffect {
            id,
            fire_turn,
            phase,
            source: source.to_string(),
            ops,
        });
        id
    }

    /// Fire every trigger matching the event, in registration order.
    ///
    /// Use counts are consumed and exhausted triggers removed.
    pub fn fire(&mut self, event: &GameEvent) -> Vec<FiredTrigger> {
        let mut fired = Vec::new();
        for trigger in self.triggers.iter_mut().filter(|t| t.matches(event)) {
            trigger.uses_remaining = trigger.uses_remaining.saturating_sub(1);
            fired.push(FiredTrigger {
                id: trigger.id,
                owner: trigger.owner.clone(),
                event: trigger.event,
                source: trigger.source.clone(),
                ops: trigger.bind(event),
            });
        }
        self.triggers.retain(|t| t.uses_remaining > 0);
        fired
    }

    /// Remove and return delayed effects due at `turn` in `phase`.
    ///
    /// An effect whose turn has passed without its phase occurring fires at
    /// the next occurrence of that phase.
    pub fn take_due(&mut self, turn: u32, phase: Phase) -> Vec<DelayedEffect> {
        let (due, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|d| d.phase == phase && d.fire_turn <= turn);
        self.delayed = keep;
        due
    }

    /// Drop every trigger owned by a participant. Returns how many.
    pub fn remove_owned_by(&mut self, owner: &ParticipantId) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|t| &t.owner != owner);
        before - self.triggers.len()
    }

    /// Registered triggers.
    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    /// Scheduled delayed effects.
    pub fn delayed(&self) -> impl Iterator<Item = &DelayedEffect> {
        self.delayed.iter()
    }

    /// Number of registered triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Check if nothing is registered or scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty() && self.delayed.is_empty()
    }
}
