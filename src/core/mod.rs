//! Core types: participants, the match document, actions, log, RNG, config.
//!
//! Everything the state machine and the interpreter share lives here. The
//! match document is the single source of truth; nothing outside it is
//! carried between actions.

pub mod action;
pub mod config;
pub mod log;
pub mod participant;
pub mod rng;
pub mod state;

pub use action::{ActionRequest, CombatAction, CombatPayload};
pub use config::{ConfigError, EngineConfig, MatchStatus, Phase};
pub use log::{LogEntry, LogRecord};
pub use participant::{
    CombatFlag, CombatFlags, Disaster, EquipSlot, Equipment, EquipmentSlots, Marker, Participant,
    ParticipantId, Stat,
};
pub use rng::{MatchRng, MatchRngState};
pub use state::{Match, MatchBuilder, Threat};
