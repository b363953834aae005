//! Deterministic random number generation for match resolution.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed + same consumption order = identical stream
//! - **Persistent**: The generator state lives in the match document, so the
//!   stream only advances as ops actually consume it
//! - **Serializable**: O(1) state capture and restore
//!
//! The generator is the Park–Miller "minimal standard" LCG
//! (multiplier 16807, modulus 2^31 − 1). It is not cryptographic; it only
//! has to be reproducible across server instances and retried transactions.
//!
//! ```
//! use card_battle::core::MatchRng;
//!
//! let mut a = MatchRng::new(42);
//! let mut b = MatchRng::new(42);
//! assert_eq!(a.next_f64(), b.next_f64());
//!
//! // Restoring from a captured state continues the same stream.
//! let state = a.state();
//! let mut restored = MatchRng::from_state(&state);
//! assert_eq!(restored.next_f64(), a.next_f64());
//! ```

use rand::RngCore;
use serde::{Deserialize, Serialize};

const MODULUS: u64 = 2_147_483_647;
const MULTIPLIER: u64 = 16_807;

/// Seeded linear-congruential generator shared by target resolution,
/// chance ops and dice formulas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRng {
    seed: u64,
    state: u64,
    draws: u64,
}

impl MatchRng {
    /// Create a new generator from a match seed.
    ///
    /// Seeds are reduced modulo 2^31 − 1; a seed that reduces to zero maps
    /// to the largest valid state so the generator never gets stuck.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut state = seed % MODULUS;
        if state == 0 {
            state = MODULUS - 1;
        }
        Self { seed, state, draws: 0 }
    }

    /// Original match seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn since the generator was seeded.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    fn step(&mut self) -> u64 {
        self.state = (self.state * MULTIPLIER) % MODULUS;
        self.draws += 1;
        self.state
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        let s = self.step();
        (s - 1) as f64 / (MODULUS - 1) as f64
    }

    /// Uniform index in `0..len`. Returns `None` for an empty range
    /// without consuming a value.
    pub fn gen_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let idx = (self.next_f64() * len as f64) as usize;
        Some(idx.min(len - 1))
    }

    /// Roll a die with `sides` faces, returning `1..=sides`.
    ///
    /// A die with fewer than one side always rolls 0 and consumes nothing.
    pub fn roll(&mut self, sides: i64) -> i64 {
        if sides < 1 {
            return 0;
        }
        self.gen_index(sides as usize).map_or(0, |i| i as i64 + 1)
    }

    /// Draw once and compare against `chance`.
    ///
    /// Returns the drawn value alongside the outcome so callers can log it.
    pub fn chance(&mut self, chance: f64) -> (f64, bool) {
        let roll = self.next_f64();
        (roll, roll < chance)
    }

    /// Capture the current state for the match document.
    #[must_use]
    pub fn state(&self) -> MatchRngState {
        MatchRngState {
            seed: self.seed,
            state: self.state,
            draws: self.draws,
        }
    }

    /// Restore from a captured state.
    #[must_use]
    pub fn from_state(state: &MatchRngState) -> Self {
        let mut rng = Self::new(state.seed);
        if (1..MODULUS).contains(&state.state) {
            rng.state = state.state;
            rng.draws = state.draws;
        }
        rng
    }
}

// Lets the generator drive `rand::seq` helpers (deck shuffling) while
// staying on the same reproducible stream.
impl RngCore for MatchRng {
    fn next_u32(&mut self) -> u32 {
        let hi = (self.step() & 0xFFFF) as u32;
        let lo = (self.step() & 0xFFFF) as u32;
        (hi << 16) | lo
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Serializable RNG state stored in the match document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRngState {
    /// Original seed.
    pub seed: u64,
    /// Current LCG state in `1..2^31-1`.
    pub state: u64,
    /// Values drawn so far.
    pub draws: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn test_determinism() {
        let mut rng1 = MatchRng::new(42);
        let mut rng2 = MatchRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_f64(), rng2.next_f64());
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = MatchRng::new(1);
        let mut rng2 = MatchRng::new(2);

        let seq1: Vec<_> = (0..10).map(|_| rng1.next_f64()).collect();
        let seq2: Vec<_> = (0..10).map(|_| rng2.next_f64()).collect();

        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_first_value_matches_minimal_standard() {
        let mut rng = MatchRng::new(1);
        let expected = 16_806.0 / 2_147_483_646.0;
        assert!((rng.next_f64() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = MatchRng::new(0);
        let v = rng.next_f64();
        assert!((0.0..1.0).contains(&v));
        assert_ne!(rng.next_f64(), v);
    }

    #[test]
    fn test_values_in_unit_interval() {
        let mut rng = MatchRng::new(987_654_321);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_gen_index_and_roll_bounds() {
        let mut rng = MatchRng::new(7);
        for _ in 0..1_000 {
            assert!(rng.gen_index(3).unwrap() < 3);
            let r = rng.roll(6);
            assert!((1..=6).contains(&r));
        }
        let before = rng.draws();
        assert_eq!(rng.gen_index(0), None);
        assert_eq!(rng.roll(0), 0);
        assert_eq!(rng.draws(), before);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = MatchRng::new(3);
        for _ in 0..100 {
            assert!(!rng.chance(0.0).1);
            assert!(rng.chance(1.0).1);
        }
    }

    #[test]
    fn test_state_restore() {
        let mut rng = MatchRng::new(42);
        for _ in 0..37 {
            rng.next_f64();
        }

        let state = rng.state();
        assert_eq!(state.draws, 37);

        let expected: Vec<_> = (0..10).map(|_| rng.next_f64()).collect();
        let mut restored = MatchRng::from_state(&state);
        let actual: Vec<_> = (0..10).map(|_| restored.next_f64()).collect();

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_corrupt_state_falls_back_to_seed() {
        let state = MatchRngState { seed: 5, state: 0, draws: 9 };
        assert_eq!(MatchRng::from_state(&state), MatchRng::new(5));
    }

    #[test]
    fn test_state_serde() {
        let state = MatchRng::new(11).state();
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: MatchRngState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        a.shuffle(&mut MatchRng::new(99));
        b.shuffle(&mut MatchRng::new(99));
        assert_eq!(a, b);
        assert_ne!(a, (0..20).collect::<Vec<_>>());
    }
}
