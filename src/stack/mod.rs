//! Pending ops and their resolution.
//!
//! Played cards, reactions, fired triggers and due delays all become
//! [`BoundOp`]s on the match's [`PendingStack`]. The [`Interpreter`] drains
//! that stack in a single pass; it never suspends mid-stack.
//!
//! ## Ordering
//!
//! - A played card's ops go *underneath* anything already pending.
//! - Reactions go on top, so they resolve before the card they answer.
//! - A chosen branch (`if`, `random`, `forEach`) or a fired trigger goes on
//!   top of the stack as a batch and resolves next, in script order.
//!
//! ## Example Usage
//!
//! ```
//! use card_battle::core::{MatchBuilder, Participant, ParticipantId};
//! use card_battle::effects::{Op, TargetSpec, Value};
//! use card_battle::stack::{BoundOp, Interpreter};
//!
//! let mut state = MatchBuilder::new("m1", 42)
//!     .participant(Participant::new("p1", 20, 0, 5))
//!     .participant(Participant::new("p2", 20, 0, 5))
//!     .build();
//!
//! let bolt = Op::Damage { amount: Value::Literal(10), target: TargetSpec::Enemy, attribute: None };
//! let caster = ParticipantId::new("p1");
//! state.pending.enqueue_batch(BoundOp::bind_all(&[bolt], &caster, None, "Bolt"));
//!
//! Interpreter::default().resolve(&mut state).unwrap();
//! assert_eq!(state.participant(&ParticipantId::new("p2")).unwrap().hp, 10);
//! ```

mod interpreter;
mod pending;

pub use interpreter::{Interpreter, PassOutcome};
pub use pending::{BoundOp, PendingStack};
