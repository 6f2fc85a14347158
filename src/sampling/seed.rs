//! Seed splitting: one master seed, many independent per-trajectory streams.
//!
//! A [`SeedSequence`] holds a master entropy value and hands out
//! [`SeedToken`]s through [`SeedSequence::spawn`]. Every token is addressed by
//! its *spawn key*, the path of child indices leading to it from the root.
//! The token's generator is a ChaCha8 stream keyed by the master entropy, with
//! the stream id derived from the spawn key. ChaCha streams under one key do
//! not overlap, so sibling tokens never share random numbers, and the same
//! (master seed, spawn key) pair always rebuilds the same generator.
//!
//! Spawning advances a counter on the sequence: calling `spawn` twice on the
//! same sequence yields fresh children, while two sequences built from the
//! same master seed yield identical children.

use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const STREAM_ROOT: u64 = 0x6A09_E667_F3BC_C908;

/// SplitMix64 finalizer. A bijection on `u64`.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fold a spawn key into a ChaCha stream id.
///
/// For keys of length one the map `i -> stream` is a composition of
/// bijections, so direct children of one sequence always get distinct
/// streams.
fn stream_id(spawn_key: &[u64]) -> u64 {
    spawn_key.iter().fold(STREAM_ROOT, |acc, &k| {
        mix64(acc ^ mix64(k.wrapping_add(GOLDEN_GAMMA)))
    })
}

// ---------------------------------------------------------------------------
// Seed token
// ---------------------------------------------------------------------------

/// An opaque, immutable entropy descriptor for one consumer (usually one
/// trajectory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedToken {
    entropy: u64,
    spawn_key: Vec<u64>,
}

impl SeedToken {
    /// The master entropy this token descends from.
    pub fn entropy(&self) -> u64 {
        self.entropy
    }

    /// Path of child indices from the master sequence to this token.
    pub fn spawn_key(&self) -> &[u64] {
        &self.spawn_key
    }

    /// Build a fresh generator for this token.
    ///
    /// Each call starts from the beginning of the token's stream, so the
    /// consumer owning the token can always replay its randomness.
    pub fn rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.entropy);
        rng.set_stream(stream_id(&self.spawn_key));
        rng
    }

    /// The `index`-th child of this token.
    pub fn child(&self, index: u64) -> SeedToken {
        let mut spawn_key = Vec::with_capacity(self.spawn_key.len() + 1);
        spawn_key.extend_from_slice(&self.spawn_key);
        spawn_key.push(index);
        SeedToken {
            entropy: self.entropy,
            spawn_key,
        }
    }
}

impl fmt::Display for SeedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.entropy)?;
        for k in &self.spawn_key {
            write!(f, "/{k}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Seed sequence
// ---------------------------------------------------------------------------

/// Spawns independent [`SeedToken`]s from a single master seed.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    root: SeedToken,
    children_spawned: u64,
}

impl SeedSequence {
    /// Create a sequence from a master seed, or from OS entropy when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let entropy = seed.unwrap_or_else(rand::random);
        Self::from_token(SeedToken {
            entropy,
            spawn_key: Vec::new(),
        })
    }

    /// Create a sequence rooted at an existing token, so a consumer can split
    /// its own stream further.
    pub fn from_token(root: SeedToken) -> Self {
        Self {
            root,
            children_spawned: 0,
        }
    }

    /// The master entropy.
    pub fn entropy(&self) -> u64 {
        self.root.entropy
    }

    /// How many children have been handed out so far.
    pub fn children_spawned(&self) -> u64 {
        self.children_spawned
    }

    /// Hand out the next `n` children.
    pub fn spawn(&mut self, n: usize) -> Vec<SeedToken> {
        let start = self.children_spawned;
        let end = start + n as u64;
        self.children_spawned = end;
        (start..end).map(|i| self.root.child(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::RngCore;

    use super::*;

    #[test]
    fn same_master_seed_reproduces_tokens() {
        let a = SeedSequence::new(Some(42)).spawn(100);
        let b = SeedSequence::new(Some(42)).spawn(100);
        assert_eq!(a, b);

        let draws_a: Vec<u64> = a.iter().map(|t| t.rng().next_u64()).collect();
        let draws_b: Vec<u64> = b.iter().map(|t| t.rng().next_u64()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn tokens_are_pairwise_distinct() {
        let tokens = SeedSequence::new(Some(42)).spawn(500);
        let unique: HashSet<_> = tokens.iter().collect();
        assert_eq!(unique.len(), tokens.len());

        let streams: HashSet<u64> = tokens.iter().map(|t| stream_id(t.spawn_key())).collect();
        assert_eq!(streams.len(), tokens.len());

        let first_draws: HashSet<u64> = tokens.iter().map(|t| t.rng().next_u64()).collect();
        assert_eq!(first_draws.len(), tokens.len());
    }

    #[test]
    fn consecutive_spawns_do_not_repeat() {
        let mut seq = SeedSequence::new(Some(7));
        let first = seq.spawn(10);
        let second = seq.spawn(10);
        assert_eq!(seq.children_spawned(), 20);
        assert!(first.iter().all(|t| !second.contains(t)));
        assert_eq!(second[0].spawn_key(), &[10]);
    }

    #[test]
    fn different_master_seeds_diverge() {
        let a = SeedSequence::new(Some(1)).spawn(1);
        let b = SeedSequence::new(Some(2)).spawn(1);
        assert_ne!(a[0].rng().next_u64(), b[0].rng().next_u64());
    }

    #[test]
    fn rng_replays_from_the_start() {
        let token = SeedSequence::new(Some(3)).spawn(1).remove(0);
        let mut r1 = token.rng();
        let mut r2 = token.rng();
        for _ in 0..8 {
            assert_eq!(r1.next_u64(), r2.next_u64());
        }
    }

    #[test]
    fn nested_children_are_independent_of_siblings() {
        let mut seq = SeedSequence::new(Some(11));
        let parent = seq.spawn(2);
        let mut nested = SeedSequence::from_token(parent[0].clone());
        let grandchildren = nested.spawn(3);
        assert_eq!(grandchildren[1].spawn_key(), &[0, 1]);
        assert!(grandchildren.iter().all(|g| g != &parent[1]));
        assert_ne!(
            grandchildren[0].rng().next_u64(),
            parent[1].rng().next_u64()
        );
    }

    #[test]
    fn display_shows_entropy_and_path() {
        let token = SeedSequence::new(Some(1)).spawn(3).remove(2);
        assert_eq!(token.to_string(), "0x0000000000000001/2");
    }

    #[test]
    fn token_serialization_roundtrip() {
        let token = SeedSequence::new(Some(99)).spawn(5).remove(4);
        let json = serde_json::to_string(&token).unwrap();
        let back: SeedToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
