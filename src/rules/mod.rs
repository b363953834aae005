//! The turn/phase state machine and combat rules.
//!
//! [`MatchEngine`] is the only component that produces committable match
//! states. It validates a request against the committed document, applies
//! it to a private copy, runs the interpreter where the phase calls for it,
//! and hands back a [`Transition`].
//!
//! ## Key Types
//!
//! - [`RulesEngine`]: `apply` / `advance_if_due` / `is_terminal`
//! - [`MatchEngine`]: The implementation
//! - [`ActionError`]: Rejection reasons with stable codes
//! - [`CombatOutcome`]: Damage computed for an attack against a defense

pub mod combat;
pub mod engine;
pub mod error;
mod machine;

pub use combat::{compute, CombatOutcome};
pub use engine::{GameResult, RulesEngine, Transition};
pub use error::{ActionError, ErrorKind, InvariantViolation};
pub use machine::MatchEngine;
