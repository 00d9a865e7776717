//! Main payload generator for producing point records.

use crate::numeric::generate_rounded_range;
use crate::record::{PublishRecord, FIELD_COUNT, VALUE_MAX, VALUE_MIN};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Payload generator that produces synthetic point records.
///
/// Each generator owns its random source, so one generator per worker needs
/// no synchronization. A seeded generator produces the same sequence of
/// records across runs.
pub struct PayloadGenerator {
    /// Random number generator (seeded or from entropy)
    rng: StdRng,
    /// Number of records generated so far
    generated: u64,
}

impl PayloadGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            generated: 0,
        }
    }

    /// Create a generator with a fixed seed for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            generated: 0,
        }
    }

    /// Create the generator for the worker at `index`.
    ///
    /// With a base seed every worker gets a distinct but reproducible
    /// stream; without one each worker draws from entropy.
    pub fn for_worker(base_seed: Option<u64>, index: usize) -> Self {
        match base_seed {
            Some(seed) => Self::with_seed(derive_worker_seed(seed, index)),
            None => Self::new(),
        }
    }

    /// Number of records generated so far.
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Generate one record for the given point.
    pub fn generate(&mut self, point: &str) -> PublishRecord {
        let values = (0..FIELD_COUNT)
            .map(|_| generate_rounded_range(&mut self.rng, VALUE_MIN, VALUE_MAX))
            .collect();

        self.generated += 1;

        PublishRecord::new(point, values)
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the RNG seed for the worker at `index`.
pub fn derive_worker_seed(base_seed: u64, index: usize) -> u64 {
    base_seed.wrapping_add((index as u64).wrapping_mul(0x9E3779B97F4A7C15))
}
