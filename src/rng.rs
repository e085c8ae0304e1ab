//! Deterministic pseudo-random generator.
//!
//! Every stochastic operation in the crate threads a 32-bit state explicitly.
//! There is no global generator: the same seed always reproduces the same
//! population, which is what makes save/load bit-exact.

// Float/integer conversions are intentional throughout
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use serde::{Deserialize, Serialize};

/// Advance a seed and return `(value, next_seed)`.
///
/// This is a pure function: the caller owns the state.
#[must_use]
pub fn next(seed: u32) -> (u32, u32) {
    let state = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);

    // Temper the LCG state so the low bits are usable
    let mut x = state;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;

    (x, state)
}

/// Generator wrapper around a threaded 32-bit seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rng {
    state: u32,
}

impl Rng {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current seed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.state
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        let (value, state) = next(self.state);
        self.state = state;
        value
    }

    /// Uniform integer in `[0, n)`. Returns 0 when `n` is 0.
    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u32() as usize) % n
    }

    /// Returns true with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        if p <= 0.0 {
            return false;
        }
        self.unit() < p
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        // 24 bits of mantissa precision
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in `[min, max]`.
    pub fn float_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.unit() * (max - min)
    }

    /// Derive an independent seed for a child structure.
    pub fn fork(&mut self) -> u32 {
        self.next_u32()
    }

    /// Perturb `value` by a bell-shaped amount within `±range`.
    ///
    /// The result always lies in `[value - range, value + range]`.
    pub fn mutate_value(&mut self, value: f32, range: f32) -> f32 {
        let range = range.abs();
        // Irwin-Hall: the sum of four uniforms is close to normal on [0, 4]
        let sum: f32 = (0..4).map(|_| self.unit()).sum();
        let delta = (sum / 2.0 - 1.0) * range;
        (value + delta).clamp(value - range, value + range)
    }
}
