//! In-memory `MatchStore` for tests and single-process deployments.

use std::sync::RwLock;

use rustc_hash::FxHashMap;

use super::{MatchStore, Result, StoreError};
use crate::core::Match;

/// Documents are kept as serialized JSON so every load hands out an
/// independent copy, the same as a remote document store would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    matches: RwLock<FxHashMap<String, (u64, Vec<u8>)>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored matches.
    pub fn len(&self) -> usize {
        self.matches.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn encode(state: &Match) -> Result<Vec<u8>> {
    serde_json::to_vec(state).map_err(|e| StoreError::Codec(e.to_string()))
}

impl MatchStore for InMemoryStore {
    fn create(&self, state: &Match) -> Result<()> {
        let bytes = encode(state)?;
        let mut matches = self.matches.write().map_err(|_| StoreError::LockPoisoned)?;
        if matches.contains_key(&state.id) {
            return Err(StoreError::AlreadyExists(state.id.clone()));
        }
        matches.insert(state.id.clone(), (state.version, bytes));
        Ok(())
    }

    fn load(&self, match_id: &str) -> Result<Match> {
        let matches = self.matches.read().map_err(|_| StoreError::LockPoisoned)?;
        let (_, bytes) = matches
            .get(match_id)
            .ok_or_else(|| StoreError::NotFound(match_id.to_string()))?;
        serde_json::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn commit(&self, state: &Match, expected_version: u64) -> Result<()> {
        let bytes = encode(state)?;
        let mut matches = self.matches.write().map_err(|_| StoreError::LockPoisoned)?;
        let slot = matches
            .get_mut(&state.id)
            .ok_or_else(|| StoreError::NotFound(state.id.clone()))?;
        if slot.0 != expected_version {
            return Err(StoreError::Conflict {
                id: state.id.clone(),
                expected: expected_version,
                actual: slot.0,
            });
        }
        *slot = (state.version, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MatchBuilder, Participant};

    fn sample() -> Match {
        MatchBuilder::new("m1", 1)
            .participant(Participant::new("p1", 10, 0, 3))
            .participant(Participant::new("p2", 10, 0, 3))
            .build()
    }

    #[test]
    fn test_create_and_load() {
        let store = InMemoryStore::new();
        store.create(&sample()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("m1").unwrap().id, "m1");
        assert!(matches!(store.create(&sample()), Err(StoreError::AlreadyExists(_))));
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_commit_checks_version() {
        let store = InMemoryStore::new();
        let mut state = sample();
        store.create(&state).unwrap();

        state.version = 1;
        state.turn = 2;
        store.commit(&state, 0).unwrap();
        assert_eq!(store.load("m1").unwrap().turn, 2);

        let err = store.commit(&state, 0).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, actual: 1, .. }));
    }
}
