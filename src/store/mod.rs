//! Match persistence and the optimistic transaction loop.
//!
//! The engine is a pure function; this module is the thin adapter that
//! loads the last committed document, runs the engine on it and commits
//! the result only if nobody else committed in between. On a version
//! conflict the whole step is re-run from a fresh snapshot.

pub mod memory;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use memory::InMemoryStore;

use crate::core::{ActionRequest, Match, ParticipantId};
use crate::rules::{ActionError, RulesEngine, Transition};

/// Errors surfaced by stores and the transaction loop.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("match {0} not found")]
    NotFound(String),

    #[error("match {0} already exists")]
    AlreadyExists(String),

    #[error("version conflict on match {id}: expected {expected}, found {actual}")]
    Conflict { id: String, expected: u64, actual: u64 },

    #[error("match {id}: gave up after {attempts} attempts")]
    RetriesExhausted { id: String, attempts: u32 },

    #[error(transparent)]
    Rejected(#[from] ActionError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("store lock was poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Versioned get/commit of whole match documents.
pub trait MatchStore: Send + Sync {
    /// Store a new match.
    fn create(&self, state: &Match) -> Result<()>;

    /// Load the last committed document.
    fn load(&self, match_id: &str) -> Result<Match>;

    /// Replace the document if its stored version is still `expected_version`.
    fn commit(&self, state: &Match, expected_version: u64) -> Result<()>;
}

/// Run `step` against the latest snapshot and commit its transition,
/// retrying on version conflicts.
///
/// Engine rejections are returned as they are and never retried. A
/// transition that kept the snapshot's version is returned without a
/// commit.
pub fn run_transaction<S, F>(store: &S, match_id: &str, max_attempts: u32, step: F) -> Result<Transition>
where
    S: MatchStore + ?Sized,
    F: FnMut(&Match) -> std::result::Result<Transition, ActionError>,
{
    retry(store, match_id, max_attempts, step, |t: &Transition| Some(&t.state))
}

/// Apply one request from an authenticated actor and commit it.
pub fn submit<S, E>(
    store: &S,
    engine: &E,
    actor: &ParticipantId,
    request: &ActionRequest,
    now_ms: u64,
    max_attempts: u32,
) -> Result<Transition>
where
    S: MatchStore + ?Sized,
    E: RulesEngine + ?Sized,
{
    let transition = run_transaction(store, request.match_id(), max_attempts, |state| {
        engine.apply(state, actor, request, now_ms)
    })?;
    info!(
        match_id = request.match_id(),
        %actor,
        action = request.name(),
        version = transition.state.version,
        "committed"
    );
    Ok(transition)
}

/// Process an elapsed window, committing only when something was due.
pub fn advance_due<S, E>(store: &S, engine: &E, match_id: &str, now_ms: u64, max_attempts: u32) -> Result<Option<Transition>>
where
    S: MatchStore + ?Sized,
    E: RulesEngine + ?Sized,
{
    retry(
        store,
        match_id,
        max_attempts,
        |state| engine.advance_if_due(state, now_ms),
        |t: &Option<Transition>| t.as_ref().map(|t| &t.state),
    )
}

fn retry<S, T, F, G>(store: &S, match_id: &str, max_attempts: u32, mut step: F, next_state: G) -> Result<T>
where
    S: MatchStore + ?Sized,
    F: FnMut(&Match) -> std::result::Result<T, ActionError>,
    G: Fn(&T) -> Option<&Match>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let current = store.load(match_id)?;
        let outcome = step(&current)?;
        let Some(next) = next_state(&outcome) else {
            return Ok(outcome);
        };
        if next.version == current.version {
            debug!(match_id, "nothing to commit");
            return Ok(outcome);
        }
        match store.commit(next, current.version) {
            Ok(()) => return Ok(outcome),
            Err(StoreError::Conflict { expected, actual, .. }) => {
                warn!(match_id, attempt, expected, actual, "version conflict, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(StoreError::RetriesExhausted {
        id: match_id.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MatchBuilder, Participant};
    use crate::rules::MatchEngine;

    fn seeded() -> (InMemoryStore, Match) {
        let state = MatchBuilder::new("m1", 5)
            .participant(Participant::new("p1", 20, 0, 5))
            .participant(Participant::new("p2", 20, 0, 5))
            .build();
        let store = InMemoryStore::new();
        store.create(&state).unwrap();
        (store, state)
    }

    #[test]
    fn test_submit_commits_next_version() {
        let (store, _) = seeded();
        let engine = MatchEngine::default();
        let t = submit(&store, &engine, &ParticipantId::new("p1"), &ActionRequest::end_turn("m1"), 0, 3).unwrap();
        assert_eq!(t.state.version, 1);
        let stored = store.load("m1").unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.turn, t.state.turn);
        assert_eq!(stored.current_actor, ParticipantId::new("p2"));
    }

    #[test]
    fn test_rejection_is_not_retried() {
        let (store, before) = seeded();
        let engine = MatchEngine::default();
        let mut calls = 0;
        let err = run_transaction(&store, "m1", 5, |state| {
            calls += 1;
            engine.apply(state, &ParticipantId::new("p2"), &ActionRequest::end_turn("m1"), 0)
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ActionError::NotYourTurn { .. })));
        assert_eq!(calls, 1);
        assert_eq!(store.load("m1").unwrap().version, before.version);
    }

    #[test]
    fn test_conflict_reruns_from_fresh_snapshot() {
        let (store, _) = seeded();
        let engine = MatchEngine::default();
        let mut seen = Vec::new();
        let t = run_transaction(&store, "m1", 3, |state| {
            seen.push(state.version);
            if seen.len() == 1 {
                // Another writer slips in.
                let mut other = state.clone();
                other.version += 1;
                store.commit(&other, state.version).unwrap();
            }
            engine.apply(state, &ParticipantId::new("p1"), &ActionRequest::end_turn("m1"), 0)
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(t.state.version, 2);
        assert_eq!(store.load("m1").unwrap().current_actor, ParticipantId::new("p2"));
    }

    #[test]
    fn test_idle_advance_skips_commit() {
        let (store, before) = seeded();
        let engine = MatchEngine::default();
        let t = submit(&store, &engine, &ParticipantId::new("p2"), &ActionRequest::advance("m1"), 0, 3).unwrap();
        assert_eq!(t.state.version, before.version);
        assert!(t.log.is_empty());
        assert_eq!(store.load("m1").unwrap().version, before.version);

        // A writer holding the same snapshot is not pushed into a conflict.
        let next = engine.apply(&before, &ParticipantId::new("p1"), &ActionRequest::end_turn("m1"), 0).unwrap();
        store.commit(&next.state, before.version).unwrap();
    }

    #[test]
    fn test_retries_exhausted() {
        let (store, _) = seeded();
        let err = run_transaction(&store, "m1", 2, |state| {
            let mut other = state.clone();
            other.version += 1;
            store.commit(&other, state.version).unwrap();
            Ok(Transition { state: other, log: Vec::new() })
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::RetriesExhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_advance_due_skips_commit_when_idle() {
        let (store, before) = seeded();
        let engine = MatchEngine::default();
        assert!(advance_due(&store, &engine, "m1", 10_000, 3).unwrap().is_none());
        assert_eq!(store.load("m1").unwrap().version, before.version);
    }
}
