use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses which recorded take to use when a key has several.
pub trait TakeSelector {
    /// Index in `0..takes` for `key`. Only called with `takes >= 1`.
    fn select(&mut self, key: &str, takes: usize) -> usize;
}

/// Always the first take.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstTakeSelector;

impl TakeSelector for FirstTakeSelector {
    fn select(&mut self, _key: &str, _takes: usize) -> usize {
        0
    }
}

/// Cycles through the takes of each key independently.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinSelector {
    next: HashMap<String, usize>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TakeSelector for RoundRobinSelector {
    fn select(&mut self, key: &str, takes: usize) -> usize {
        let counter = self.next.entry(key.to_string()).or_insert(0);
        let idx = *counter % takes.max(1);
        *counter = counter.wrapping_add(1);
        idx
    }
}

/// Uniform random choice; reproducible for a fixed seed.
#[derive(Debug, Clone)]
pub struct SeededSelector {
    rng: StdRng,
}

impl SeededSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from OS entropy, for natural variety in production.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl TakeSelector for SeededSelector {
    fn select(&mut self, _key: &str, takes: usize) -> usize {
        if takes <= 1 {
            return 0;
        }
        self.rng.gen_range(0..takes)
    }
}
