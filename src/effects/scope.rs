//! Local variable bindings for one resolution pass.
//!
//! `setVar` and `find` write the pass-level table. `forEach` does not touch
//! it: each bound copy of the loop body carries its loop variable in its own
//! scope, which shadows the pass table on lookup.
//!
//! Names are stored without their reference prefix, so `$x`, `var.x`,
//! `find.x` and `loop.x` all address the binding `x`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::ParticipantId;

/// An ordered list of resolved participants.
pub type Targets = SmallVec<[ParticipantId; 4]>;

/// Value of a local variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Number(i64),
    Participants(Targets),
}

impl Binding {
    /// Numeric view: a participant set counts its members.
    #[must_use]
    pub fn as_number(&self) -> i64 {
        match self {
            Binding::Number(n) => *n,
            Binding::Participants(ids) => ids.len() as i64,
        }
    }
}

/// Strip a reference prefix from a variable name.
#[must_use]
pub fn bare_name(name: &str) -> &str {
    let name = name.trim();
    let name = name.strip_prefix('$').unwrap_or(name);
    ["var.", "find.", "loop."]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Whether a token looks like a variable reference rather than a literal id.
#[must_use]
pub fn is_var_reference(token: &str) -> bool {
    let token = token.trim();
    token.starts_with('$')
        || token.starts_with("var.")
        || token.starts_with("find.")
        || token.starts_with("loop.")
}

/// Pass-level variable table.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    vars: FxHashMap<String, Binding>,
}

impl Bindings {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a variable.
    pub fn set(&mut self, name: &str, value: Binding) {
        self.vars.insert(bare_name(name).to_string(), value);
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.vars.get(bare_name(name))
    }
}

/// Lookup through a bound op's loop scope, then the pass table.
#[derive(Clone, Copy, Debug)]
pub struct VarLookup<'a> {
    pass: &'a Bindings,
    scope: &'a [(String, Binding)],
}

impl<'a> VarLookup<'a> {
    /// Combine a pass table with a loop scope.
    #[must_use]
    pub fn new(pass: &'a Bindings, scope: &'a [(String, Binding)]) -> Self {
        Self { pass, scope }
    }

    /// Resolve a variable, innermost binding first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a Binding> {
        let bare = bare_name(name);
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == bare)
            .map(|(_, b)| b)
            .or_else(|| self.pass.get(bare))
    }
}
