//! Random delay added on top of the store's retry hint, so that several loaders throttled at
//! the same moment do not all come back at the same moment.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

pub const DEFAULT_JITTER_MIN_MS: u64 = 1000;
pub const DEFAULT_JITTER_MAX_MS: u64 = 5000;

pub trait Jitter {
    fn next_delay(&mut self) -> Duration;
}

/// Uniformly random delay in `min_ms..max_ms`
#[derive(Debug, Clone)]
pub struct RandomJitter<R: Rng = StdRng> {
    rng: R,
    min_ms: u64,
    max_ms: u64,
}

impl RandomJitter<StdRng> {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self::with_rng(StdRng::from_entropy(), min_ms, max_ms)
    }

    /// Reproducible sequence of delays
    pub fn seeded(seed: u64, min_ms: u64, max_ms: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), min_ms, max_ms)
    }
}

impl<R: Rng> RandomJitter<R> {
    pub fn with_rng(rng: R, min_ms: u64, max_ms: u64) -> Self {
        Self {
            rng,
            min_ms,
            max_ms,
        }
    }
}

impl Default for RandomJitter<StdRng> {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_MIN_MS, DEFAULT_JITTER_MAX_MS)
    }
}

impl<R: Rng> Jitter for RandomJitter<R> {
    fn next_delay(&mut self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(self.rng.gen_range(self.min_ms..self.max_ms))
    }
}

/// Always the same delay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn next_delay(&mut self) -> Duration {
        self.0
    }
}
