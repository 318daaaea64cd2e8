//! Kernel trait definition

use crate::core::Result;

/// Sequence kernel trait
///
/// A kernel K(x, y) over symbol sequences. Implementations must be symmetric
/// and deterministic so kernel matrices can be mirrored and reproduced.
pub trait SequenceKernel<S>: Send + Sync {
    /// Compute raw kernel value K(x, y)
    fn compute(&self, x: &[S], y: &[S]) -> Result<f64>;

    /// Optional: prepare per-thread buffers for sequences up to `max_len`
    /// This lets matrix builders fail fast before any pair is evaluated
    fn prepare(&self, max_len: usize) -> Result<()> {
        // Default implementation needs no buffers
        let _ = max_len;
        Ok(())
    }

    /// Compute K(x, y) / sqrt(K(x, x) * K(y, y))
    fn compute_normalized(&self, x: &[S], y: &[S]) -> Result<f64> {
        let kxy = self.compute(x, y)?;
        let kxx = self.compute(x, x)?;
        let kyy = self.compute(y, y)?;
        Ok(normalize(kxy, kxx, kyy))
    }
}

/// Normalize a raw kernel value by the self-similarities of its arguments
///
/// A zero (or non-positive) self-similarity yields 0 rather than NaN/Inf.
#[inline]
pub fn normalize(raw: f64, x_self: f64, y_self: f64) -> f64 {
    // sqrt each factor separately so large raw counts cannot overflow
    let denominator = x_self.sqrt() * y_self.sqrt();
    if denominator > 0.0 && denominator.is_finite() {
        raw / denominator
    } else {
        0.0
    }
}
