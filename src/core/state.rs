//! The match document.
//!
//! ## Match
//!
//! Complete state of one match, serialized as a single camelCase JSON
//! document:
//! - Turn counter, current actor, phase, status
//! - Seed and RNG state
//! - Pending op stack, triggers and delayed effects
//! - Shared draw pool and discard pile
//! - Participants in seating order
//! - Append-only log
//! - Threat info while an attack awaits defense
//!
//! Collections are `im` persistent structures so the engine can take a
//! private working copy of the whole match in O(1) for every action.

use im::Vector;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::config::{MatchStatus, Phase};
use super::log::{LogEntry, LogRecord};
use super::participant::{Participant, ParticipantId};
use super::rng::{MatchRng, MatchRngState};
use crate::cards::{Attribute, CardInstance};
use crate::stack::PendingStack;
use crate::triggers::TriggerRegistry;

/// A declared attack awaiting defense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threat {
    pub attacker: ParticipantId,
    pub defender: ParticipantId,
    pub power: i64,
    pub attribute: Attribute,
    /// Weapon name.
    pub source: String,
}

/// Complete match state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub status: MatchStatus,

    // === Progression ===
    /// Turn number (starts at 1).
    pub turn: u32,
    pub current_actor: ParticipantId,
    pub phase: Phase,

    // === Randomness ===
    pub seed: u64,
    pub rng_state: MatchRngState,

    // === Resolution ===
    pub pending: PendingStack,
    #[serde(default)]
    pub triggers: TriggerRegistry,

    // === Cards ===
    /// Shared draw pool; the top card is the back.
    pub draw_pool: Vector<CardInstance>,
    pub discard_pile: Vector<CardInstance>,

    /// Participants in seating order.
    pub participants: Vector<Participant>,

    pub logs: Vector<LogRecord>,

    // === Windows ===
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<Threat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_deadline: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_deadline: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantId>,

    /// Optimistic concurrency token, bumped on every committed action.
    #[serde(default)]
    pub version: u64,
}

impl Match {
    /// Whether the match has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Look up a participant.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Mutable participant access.
    pub fn participant_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    /// Seat index of a participant.
    #[must_use]
    pub fn seat_of(&self, id: &ParticipantId) -> Option<usize> {
        self.participants.iter().position(|p| &p.id == id)
    }

    /// Whether the participant exists and is not defeated.
    #[must_use]
    pub fn is_alive(&self, id: &ParticipantId) -> bool {
        self.participant(id).is_some_and(Participant::is_alive)
    }

    /// Ids of living participants in seating order.
    pub fn living_ids(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id.clone())
    }

    /// Number of participants not yet defeated.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_alive()).count()
    }

    /// The first living participant seated after `id`, wrapping.
    ///
    /// Never returns `id` itself.
    #[must_use]
    pub fn next_living_after(&self, id: &ParticipantId) -> Option<ParticipantId> {
        let n = self.participants.len();
        let start = self.seat_of(id)?;
        (1..n)
            .map(|offset| &self.participants[(start + offset) % n])
            .find(|p| p.is_alive())
            .map(|p| p.id.clone())
    }

    /// Restore the persisted RNG.
    #[must_use]
    pub fn rng(&self) -> MatchRng {
        MatchRng::from_state(&self.rng_state)
    }

    /// Persist the RNG.
    pub fn store_rng(&mut self, rng: &MatchRng) {
        self.rng_state = rng.state();
    }

    /// Append a log entry stamped with the current turn.
    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push_back(LogRecord {
            turn: self.turn,
            entry,
        });
    }

    /// Move up to `count` cards from the draw pool into a hand.
    ///
    /// Returns how many moved.
    pub fn draw_cards(&mut self, id: &ParticipantId, count: usize) -> usize {
        let mut drawn = Vec::new();
        while drawn.len() < count {
            match self.draw_pool.pop_back() {
                Some(card) => drawn.push(card),
                None => break,
            }
        }
        let moved = drawn.len();
        match self.participant_mut(id) {
            Some(p) => p.hand.extend(drawn),
            None => {
                // Unknown participant: put the cards back in order.
                for card in drawn.into_iter().rev() {
                    self.draw_pool.push_back(card);
                }
                return 0;
            }
        }
        moved
    }

    /// Whether every participant's pools are within bounds.
    #[must_use]
    pub fn resources_in_bounds(&self) -> bool {
        self.participants.iter().all(Participant::resources_in_bounds)
    }
}

/// Builds a match from participants and a shared deck.
///
/// ## Example
///
/// ```
/// use card_battle::core::{MatchBuilder, Participant};
///
/// let m = MatchBuilder::new("m1", 42)
///     .participant(Participant::new("p1", 40, 10, 10))
///     .participant(Participant::new("p2", 40, 10, 10))
///     .build();
///
/// assert_eq!(m.turn, 1);
/// assert_eq!(m.current_actor.as_str(), "p1");
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct MatchBuilder {
    id: String,
    seed: u64,
    participants: Vec<Participant>,
    draw_pool: Vec<CardInstance>,
    opening_hand: usize,
    shuffle: bool,
}

impl MatchBuilder {
    /// Start a match with an id and seed.
    pub fn new(id: impl Into<String>, seed: u64) -> Self {
        Self {
            id: id.into(),
            seed,
            participants: Vec::new(),
            draw_pool: Vec::new(),
            opening_hand: 0,
            shuffle: true,
        }
    }

    /// Seat a participant (seating order = call order).
    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Set the shared draw pool.
    pub fn draw_pool(mut self, cards: Vec<CardInstance>) -> Self {
        self.draw_pool = cards;
        self
    }

    /// Cards dealt from the pool to each seat at start.
    pub fn opening_hand(mut self, cards: usize) -> Self {
        self.opening_hand = cards;
        self
    }

    /// Keep the pool in the given order (top = last).
    pub fn unshuffled(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Build the match. The first seat acts first.
    pub fn build(self) -> Match {
        let mut rng = MatchRng::new(self.seed);
        let mut pool = self.draw_pool;
        if self.shuffle {
            pool.shuffle(&mut rng);
        }

        let current_actor = self
            .participants
            .first()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| ParticipantId::new(""));

        let mut state = Match {
            id: self.id,
            status: MatchStatus::Active,
            turn: 1,
            current_actor,
            phase: Phase::Main,
            seed: self.seed,
            rng_state: rng.state(),
            pending: PendingStack::new(),
            triggers: TriggerRegistry::new(),
            draw_pool: pool.into_iter().collect(),
            discard_pile: Vector::new(),
            participants: self.participants.into_iter().collect(),
            logs: Vector::new(),
            threat: None,
            reaction_deadline: None,
            threat_deadline: None,
            winner: None,
            version: 0,
        };

        let seats: Vec<ParticipantId> = state.participants.iter().map(|p| p.id.clone()).collect();
        for _ in 0..self.opening_hand {
            for id in &seats {
                state.draw_cards(id, 1);
            }
        }
        state
    }
}
