//! Deterministic random sampling.
//!
//! A small seeded generator backs weight initialization and the synthetic
//! demo data, so a training run reproduces exactly from its seed without
//! pulling in an external RNG crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Fallback state for a zero seed (the generator must never hold zero).
const NONZERO_STATE: u64 = 0x853c_49e6_748f_ea9b;

/// Seeded pseudo-random generator.
///
/// Uniform draws come from a xorshift64* core; the normal draws needed for
/// weight initialization are produced by a Box-Muller transform on top.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { NONZERO_STATE } else { seed },
        }
    }

    /// Replace the state with one derived from the wall clock, for demo runs
    /// that should differ between invocations. Mixes in the current state so
    /// repeated calls within one clock tick still diverge.
    pub fn reseed_from_time(&mut self) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.state = (self.state ^ nanos).max(1);
    }

    /// xorshift64* step: shift-register scramble, then a multiplicative mix
    /// of the state to whiten the output.
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Uniform sample in [0, 1), built from the top 24 bits so the value is
    /// exactly representable in an f32 mantissa.
    pub fn next_f32(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u32 << 24) as f32;
        (self.next_u64() >> 40) as f32 * SCALE
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            (self.next_u64() % upper as u64) as usize
        }
    }

    /// Normal sample via the Box-Muller transform. The first uniform draw is
    /// clamped away from zero so the logarithm stays finite.
    pub fn next_normal_f32(&mut self, mean: f32, std_dev: f32) -> f32 {
        let u1 = f64::from(self.next_f32()).max(1e-12);
        let u2 = f64::from(self.next_f32());
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        mean + std_dev * (radius * angle.cos()) as f32
    }
}
