//! Trigger system for deferred reactions.
//!
//! Cards register reactions to future events (`addTrigger`), to their
//! owner's defeat (`onDeath`) or to a later turn (`delay`). The registry is
//! part of the match document; the interpreter and the state machine emit
//! events and push whatever fires onto the pending stack.
//!
//! ## Key Components
//!
//! - [`EventKind`]: What a trigger listens for
//! - [`GameEvent`]: An event that happened to a participant
//! - [`Trigger`]: A registered reaction with a use count
//! - [`DelayedEffect`]: Bound ops scheduled for a turn and phase
//! - [`TriggerRegistry`]: Storage, matching and scheduling
//!
//! ## Example Usage
//!
//! ```
//! use card_battle::core::ParticipantId;
//! use card_battle::triggers::{EventKind, GameEvent, Trigger, TriggerRegistry};
//!
//! let p1 = ParticipantId::new("p1");
//! let p2 = ParticipantId::new("p2");
//!
//! let mut registry = TriggerRegistry::new();
//! registry.register(Trigger::new(p1.clone(), EventKind::Damaged, p1.clone(), "Thorns"));
//!
//! let fired = registry.fire(&GameEvent::damaged(p1, p2, 3));
//! assert_eq!(fired.len(), 1);
//! assert!(registry.is_empty());
//! ```

mod event;
mod registry;

pub use event::{EventKind, GameEvent};
pub use registry::{DelayedEffect, FiredTrigger, Trigger, TriggerId, TriggerRegistry};
