//! Effect script: ops, values, targets.
//!
//! ## Key Types
//!
//! - `Op`: One tagged unit of a card's effect script
//! - `Value`: Literal, variable reference or closed-grammar formula
//! - `Condition`: Comparison guarding an `if` op
//! - `TargetSpec`: Symbolic target token
//! - `TargetResolver`: Maps tokens to living participants
//! - `Bindings`: Pass-local variables written by `setVar` / `find`
//!
//! Nothing here mutates a match. The stack interpreter applies ops; this
//! module only describes and evaluates them.

pub mod expr;
pub mod op;
pub mod scope;
pub mod targeting;

pub use expr::{Comparator, Condition, EvalContext, Formula, Value};
pub use op::{default_target_for, is_harmful_tag, DiscardFrom, Op, MAX_NESTING_DEPTH};
pub use scope::{Binding, Bindings, Targets, VarLookup};
pub use targeting::{FindFilter, TargetResolver, TargetSpec, Unresolved};
