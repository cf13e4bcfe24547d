// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The gate controller needs one uniform sample per batch element
// for every decision it takes. Where those samples come from is
// the caller's choice:
//
//   - any rand::Rng (seed a StdRng for reproducible passes)
//   - FixedThreshold → deterministic gating, e.g. at evaluation
//     time "execute the block when prob > 0.5"
//
// Reference: rand crate documentation

use rand::Rng;

// ─── GateSampler ──────────────────────────────────────────────────────────────
/// Source of the uniform samples compared against gate probabilities.
pub trait GateSampler {
    /// Return `len` values in `[0, 1)`.
    fn sample_uniform(&mut self, len: usize) -> Vec<f32>;
}

impl<R: Rng> GateSampler for R {
    fn sample_uniform(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.gen::<f32>()).collect()
    }
}

// ─── FixedThreshold ───────────────────────────────────────────────────────────
/// Replaces the random draw with a constant: a block runs when its
/// probability is strictly greater than the threshold.
///
/// `FixedThreshold(0.0)` opens every gate, `FixedThreshold(1.0)` closes
/// every gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedThreshold(pub f32);

impl GateSampler for FixedThreshold {
    fn sample_uniform(&mut self, len: usize) -> Vec<f32> {
        vec![self.0; len]
    }
}
