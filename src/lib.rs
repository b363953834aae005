//! # card-battle-engine
//!
//! Authoritative rules engine for a turn-based multiplayer card battle game.
//!
//! ## Design Principles
//!
//! 1. **Pure Transitions**: The engine takes the last committed match
//!    document and a request and returns either a rejection or a complete
//!    next document plus the log entries the action produced. It never
//!    mutates its input.
//!
//! 2. **Deterministic**: All randomness flows through a seeded generator
//!    whose state is part of the document. Same seed and same requests give
//!    the same logs and the same resources.
//!
//! 3. **Content Never Aborts a Match**: A bad card script is repaired on the
//!    way in and skipped op by op during resolution. Only broken engine
//!    invariants are fatal.
//!
//! ## Architecture
//!
//! - **Pending Stack**: Card effects are bound to a caster and target and
//!   resolved LIFO in one pass; branches expand in place.
//!
//! - **Persistent Data Structures**: O(1) cloning via `im-rs`, so every
//!   action works on a private copy that is committed whole or dropped.
//!
//! - **Deadlines, Not Timers**: Reaction and threat windows are stored
//!   deadlines processed by an idempotent `advance_if_due`.
//!
//! ## Modules
//!
//! - `core`: Participants, the match document, requests, log, RNG, configuration
//! - `cards`: Card definitions, instances, normalization and registry
//! - `effects`: Op grammar, expressions and target resolution
//! - `triggers`: Event-driven triggers and delayed effects
//! - `stack`: Pending ops and the stack interpreter
//! - `rules`: Turn/phase state machine and the combat sub-cycle
//! - `bot`: Heuristic decision policy for bot seats
//! - `store`: Versioned persistence and optimistic transactions

pub mod core;
pub mod cards;
pub mod effects;
pub mod triggers;
pub mod stack;
pub mod rules;
pub mod bot;
pub mod store;

// Re-export commonly used types
pub use crate::core::{
    ActionRequest, CombatAction, CombatPayload,
    EngineConfig, Phase, MatchStatus,
    LogEntry, LogRecord,
    Match, MatchBuilder, Threat,
    MatchRng, Participant, ParticipantId, Stat,
};

pub use crate::cards::{
    Attribute, Card, CardId, CardType, CardInstance,
    CardRegistry, CardError, normalize_card,
};

pub use crate::effects::{Op, TargetSpec, Value, Condition};

pub use crate::triggers::{EventKind, GameEvent, Trigger, TriggerRegistry};

pub use crate::stack::{BoundOp, Interpreter, PendingStack};

pub use crate::rules::{
    ActionError, ErrorKind, GameResult, MatchEngine, RulesEngine, Transition,
};

pub use crate::bot::{BotConfig, DecisionPolicy, Difficulty, HeuristicBot};

pub use crate::store::{InMemoryStore, MatchStore, StoreError};
