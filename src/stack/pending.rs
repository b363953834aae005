//! The pending op stack.
//!
//! ## BoundOp
//!
//! An op plus the metadata attached when it was played: caster, default
//! target, source card name, nesting depth and any loop bindings.
//!
//! ## PendingStack
//!
//! LIFO; the top is the last element. Ordering helpers:
//!
//! - [`PendingStack::push_batch`] pushes a sequence in reverse so that
//!   popping yields it in its original order. Branch expansion, `forEach`
//!   unrolling and reactions all go through it.
//! - [`PendingStack::enqueue_batch`] slides a sequence under everything
//!   already pending, preserving its order. A played card uses it so that
//!   reactions pushed later still resolve first.
//!
//! ```
//! use card_battle::stack::PendingStack;
//! # use card_battle::stack::BoundOp;
//! # use card_battle::effects::{Op, Value};
//! # fn op(n: i64) -> BoundOp {
//! #     BoundOp::new(Op::SetVar { var: "x".into(), value: Value::Literal(n) }, "p1".into(), None, "t")
//! # }
//!
//! let mut stack = PendingStack::new();
//! stack.push_batch(vec![op(1), op(2), op(3)]);
//! let popped: Vec<_> = std::iter::from_fn(|| stack.pop()).collect();
//! assert_eq!(popped, vec![op(1), op(2), op(3)]);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::ParticipantId;
use crate::effects::scope::bare_name;
use crate::effects::{Binding, Op};

/// An op bound to its play-time context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundOp {
    pub op: Op,
    pub caster: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ParticipantId>,
    /// Card (or status) name, carried into every log entry.
    pub source: String,
    /// 0 for a card's top-level ops.
    #[serde(default)]
    pub depth: u8,
    /// Loop bindings from enclosing `forEach` ops, innermost last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<(String, Binding)>,
    /// May run after the caster was defeated (on-death ops).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub posthumous: bool,
}

impl BoundOp {
    /// Bind a top-level op.
    #[must_use]
    pub fn new(op: Op, caster: ParticipantId, target: Option<ParticipantId>, source: &str) -> Self {
        Self {
            op,
            caster,
            target,
            source: source.to_string(),
            depth: 0,
            scope: Vec::new(),
            posthumous: false,
        }
    }

    /// Bind every op of a card, in order.
    #[must_use]
    pub fn bind_all(
        ops: &[Op],
        caster: &ParticipantId,
        target: Option<&ParticipantId>,
        source: &str,
    ) -> Vec<BoundOp> {
        ops.iter()
            .map(|op| BoundOp::new(op.clone(), caster.clone(), target.cloned(), source))
            .collect()
    }

    /// Bind a nested op one level deeper, inheriting this op's context.
    #[must_use]
    pub fn child(&self, op: &Op) -> BoundOp {
        BoundOp {
            op: op.clone(),
            caster: self.caster.clone(),
            target: self.target.clone(),
            source: self.source.clone(),
            depth: self.depth.saturating_add(1),
            scope: self.scope.clone(),
            posthumous: self.posthumous,
        }
    }

    /// Bind a whole nested list.
    #[must_use]
    pub fn children(&self, ops: &[Op]) -> Vec<BoundOp> {
        ops.iter().map(|op| self.child(op)).collect()
    }

    /// Add a loop binding (builder pattern).
    #[must_use]
    pub fn with_binding(mut self, name: &str, value: Binding) -> Self {
        self.scope.push((bare_name(name).to_string(), value));
        self
    }

    /// Override the default target (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: Option<ParticipantId>) -> Self {
        self.target = target;
        self
    }

    /// Mark as allowed to run after the caster's defeat (builder pattern).
    #[must_use]
    pub fn posthumous(mut self) -> Self {
        self.posthumous = true;
        self
    }
}

/// LIFO stack of bound ops awaiting resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingStack {
    entries: Vec<BoundOp>,
}

impl PendingStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one op on top.
    pub fn push(&mut self, op: BoundOp) {
        self.entries.push(op);
    }

    /// Pop the top op.
    pub fn pop(&mut self) -> Option<BoundOp> {
        self.entries.pop()
    }

    /// Push a sequence so that it pops in its original order.
    ///
    /// Resolving the stack afterwards is equivalent to inlining `ops` at the
    /// current top.
    pub fn push_batch<I>(&mut self, ops: I)
    where
        I: IntoIterator<Item = BoundOp>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.entries.extend(ops.into_iter().rev());
    }

    /// Put a sequence underneath everything already pending, preserving
    /// its order.
    pub fn enqueue_batch<I>(&mut self, ops: I)
    where
        I: IntoIterator<Item = BoundOp>,
        I::IntoIter: DoubleEndedIterator,
    {
        let below: Vec<BoundOp> = ops.into_iter().rev().collect();
        self.entries.splice(0..0, below);
    }

    /// Number of pending ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending ops in the order they will resolve.
    pub fn iter_in_resolution_order(&self) -> impl Iterator<Item = &BoundOp> {
        self.entries.iter().rev()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
