//! Seeded weight initialization.

use std::time::{SystemTime, UNIX_EPOCH};

/// 64-bit linear congruential generator (Knuth MMIX constants).
#[derive(Debug, Clone)]
pub(crate) struct Lcg {
    state: u64,
}

impl Lcg {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seeds from the wall clock when no seed is configured.
    pub(crate) fn from_seed_or_clock(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
        });
        Self::new(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform sample in `[0, 1)` from the top 53 bits.
    pub(crate) fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Glorot/Xavier uniform matrix of shape `fan_out x fan_in`.
pub(crate) fn glorot_uniform(fan_in: usize, fan_out: usize, rng: &mut Lcg) -> Vec<Vec<f64>> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    (0..fan_out)
        .map(|_| {
            (0..fan_in)
                .map(|_| (rng.next_f64() * 2.0 - 1.0) * limit)
                .collect()
        })
        .collect()
}
