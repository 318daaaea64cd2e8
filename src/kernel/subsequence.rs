//! String subsequence kernel
//!
//! Counts the common (not necessarily contiguous) subsequences of two symbol
//! sequences up to length n, each weighted by λ raised to the total span it
//! covers in both sequences (Lodhi et al., "Text Classification using String
//! Kernels", JMLR 2002):
//!
//! K(s, t) = Σ_{k=1..n} Σ_u Σ_{i: u = s[i]} Σ_{j: u = t[j]} λ^(l(i) + l(j))
//!
//! The auxiliary table K'_k(s[..p], t[..q]) is evaluated with the O(n·|s|·|t|)
//! recursion, keeping only two rows of the |s| dimension alive at a time so
//! memory is O(n·|t|).

use crate::core::{KernelError, KernelParameters, Result};
use crate::kernel::SequenceKernel;
use std::cell::RefCell;

thread_local! {
    /// Per-thread DP arena, grown on demand and reused across pairs
    static SCRATCH: RefCell<Vec<f64>> = RefCell::new(Vec::new());
}

/// Subsequence string kernel with maximum subsequence length n and decay λ
///
/// The returned similarity is the sum of the per-length kernels for
/// k = 1..=n. Sequences shorter than n contribute nothing beyond their own
/// length, and an empty sequence has similarity 0 with everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsequenceKernel {
    params: KernelParameters,
}

impl SubsequenceKernel {
    /// Create a new subsequence kernel
    ///
    /// # Arguments
    /// * `max_subsequence_length` - Longest subsequence counted (must be >= 1)
    /// * `decay_factor` - Gap penalty λ (must be in (0, 1])
    ///
    /// # Examples
    /// ```
    /// use seqkernel::kernel::{SequenceKernel, SubsequenceKernel};
    ///
    /// let kernel = SubsequenceKernel::new(1, 1.0).unwrap();
    /// let a: Vec<char> = "aab".chars().collect();
    /// let b: Vec<char> = "ab".chars().collect();
    /// // three matching symbol pairs, no decay
    /// assert_eq!(kernel.compute(&a, &b).unwrap(), 3.0);
    /// ```
    pub fn new(max_subsequence_length: usize, decay_factor: f64) -> Result<Self> {
        Self::from_parameters(KernelParameters::new(
            max_subsequence_length,
            decay_factor,
        )?)
    }

    /// Create a kernel from already assembled parameters
    pub fn from_parameters(params: KernelParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Kernel parameters
    pub fn parameters(&self) -> KernelParameters {
        self.params
    }

    /// Maximum subsequence length n
    pub fn max_subsequence_length(&self) -> usize {
        self.params.max_subsequence_length
    }

    /// Decay factor λ
    pub fn decay_factor(&self) -> f64 {
        self.params.decay_factor
    }

    /// Kernel value per subsequence length
    ///
    /// Element k-1 holds K_k(x, y); the similarity is the sum of the vector.
    /// Lengths beyond the shorter sequence are always zero and are not
    /// evaluated.
    ///
    /// Fails with `NumericalRange` when the value does not fit in an f64, or
    /// when λ² underflows to zero although the sequences share a symbol.
    pub fn compute_per_length<S: PartialEq>(&self, x: &[S], y: &[S]) -> Result<Vec<f64>> {
        let n = self.params.max_subsequence_length;
        let lambda = self.params.decay_factor;
        let mut per_length = vec![0.0; n];
        if x.is_empty() || y.is_empty() {
            return Ok(per_length);
        }

        // Roll over the longer sequence, keep the shorter one as the row width
        let (outer, inner) = if x.len() >= y.len() { (x, y) } else { (y, x) };
        let levels = n.min(inner.len());

        let cells = scratch_cells(levels, inner.len())?;
        let shares_symbol = with_scratch(cells, |scratch| {
            accumulate(outer, inner, lambda, scratch, &mut per_length[..levels])
        })?;

        let total: f64 = per_length.iter().sum();
        if !total.is_finite() {
            return Err(KernelError::NumericalRange(format!(
                "kernel value overflows f64 (n = {}, λ = {}, lengths {} and {})",
                n,
                lambda,
                x.len(),
                y.len()
            )));
        }
        if shares_symbol && per_length[0] == 0.0 {
            return Err(KernelError::NumericalRange(format!(
                "decay factor {lambda} underflows: λ² is zero in f64"
            )));
        }

        Ok(per_length)
    }

    /// Pre-size the calling thread's DP arena for sequences up to `max_len`
    ///
    /// Fails with `ResourceExhausted` when the arena cannot be allocated, so
    /// callers can surface the problem before starting a long computation.
    pub fn reserve_scratch(&self, max_len: usize) -> Result<()> {
        let levels = self.params.max_subsequence_length.min(max_len);
        let cells = scratch_cells(levels, max_len)?;
        with_scratch(cells, |_| ())
    }
}

impl<S: PartialEq> SequenceKernel<S> for SubsequenceKernel {
    fn compute(&self, x: &[S], y: &[S]) -> Result<f64> {
        Ok(self.compute_per_length(x, y)?.iter().sum())
    }

    fn prepare(&self, max_len: usize) -> Result<()> {
        self.reserve_scratch(max_len)
    }
}

/// Cells needed for two rolled DP planes of levels x (width + 1)
fn scratch_cells(levels: usize, width: usize) -> Result<usize> {
    width
        .checked_add(1)
        .and_then(|row| row.checked_mul(levels))
        .and_then(|plane| plane.checked_mul(2))
        .ok_or(KernelError::ResourceExhausted {
            requested: usize::MAX,
        })
}

/// Run `f` on at least `cells` zeroed-or-stale slots of the thread-local arena
fn with_scratch<R>(cells: usize, f: impl FnOnce(&mut [f64]) -> R) -> Result<R> {
    SCRATCH.with(|arena| {
        let mut buf = arena.borrow_mut();
        if buf.len() < cells {
            let additional = cells - buf.len();
            buf.try_reserve_exact(additional)
                .map_err(|_| KernelError::ResourceExhausted { requested: cells })?;
            buf.resize(cells, 0.0);
        }
        Ok(f(&mut buf[..cells]))
    })
}

/// Core recursion
///
/// `prev` holds K'_l(outer[..p], inner[..q]) for every level l below
/// `per_length.len()` and q in 0..=|inner| at the current row p; `next`
/// receives row p + 1. Returns whether any pair of symbols matched.
///
/// K'_0 = 1 everywhere, and for l >= 1:
///   K''_l(p+1, q+1) = λ K''_l(p+1, q) + [outer[p] = inner[q]] λ² K'_{l-1}(p, q)
///   K'_l(p+1, q+1)  = λ K'_l(p, q+1) + K''_l(p+1, q+1)
///   K_l            += [outer[p] = inner[q]] λ² K'_{l-1}(p, q)
fn accumulate<S: PartialEq>(
    outer: &[S],
    inner: &[S],
    lambda: f64,
    scratch: &mut [f64],
    per_length: &mut [f64],
) -> bool {
    let levels = per_length.len();
    let width = inner.len() + 1;
    let plane = levels * width;
    let lambda_sq = lambda * lambda;
    let mut shares_symbol = false;

    let (prev, next) = scratch.split_at_mut(plane);
    let (mut prev, mut next) = (prev, &mut next[..plane]);

    prev.fill(0.0);
    prev[..inner.len()].fill(1.0);

    for symbol in outer {
        next[..inner.len()].fill(1.0);
        next[inner.len()] = 0.0;

        for level in 0..levels {
            let lower = &prev[level * width..(level + 1) * width];
            let mut matched = 0.0;

            if level + 1 < levels {
                let same = &prev[(level + 1) * width..(level + 2) * width];
                let out = &mut next[(level + 1) * width..(level + 2) * width];

                out[0] = 0.0;
                let mut running = 0.0;
                for (q, other) in inner.iter().enumerate() {
                    if symbol == other {
                        matched += lower[q];
                        running = lambda * (running + lambda * lower[q]);
                    } else {
                        running *= lambda;
                    }
                    out[q + 1] = lambda * same[q + 1] + running;
                }
            } else {
                // Top level: K'_{l+1} is never read
                for (q, other) in inner.iter().enumerate() {
                    if symbol == other {
                        matched += lower[q];
                    }
                }
            }

            if level == 0 && matched > 0.0 {
                shares_symbol = true;
            }
            per_length[level] += lambda_sq * matched;
        }

        std::mem::swap(&mut prev, &mut next);
    }

    shares_symbol
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[test]
    fn test_kernel_creation() {
        let kernel = SubsequenceKernel::new(3, 0.5).unwrap();
        assert_eq!(kernel.max_subsequence_length(), 3);
        assert_eq!(kernel.decay_factor(), 0.5);
        assert_eq!(kernel.parameters(), KernelParameters::new(3, 0.5).unwrap());
    }

    #[test]
    fn test_kernel_invalid_parameters() {
        assert!(matches!(
            SubsequenceKernel::new(0, 0.5),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(SubsequenceKernel::new(2, 0.0).is_err());
        assert!(SubsequenceKernel::new(2, 1.01).is_err());

        let bad = KernelParameters {
            max_subsequence_length: 2,
            decay_factor: -1.0,
        };
        assert!(SubsequenceKernel::from_parameters(bad).is_err());
    }

    #[test]
    fn test_length_one_counts_matching_pairs() {
        // n = 1: λ² times the number of equal symbol pairs
        let kernel = SubsequenceKernel::new(1, 1.0).unwrap();
        assert_eq!(kernel.compute(&chars("aab"), &chars("ab")).unwrap(), 3.0);

        let kernel = SubsequenceKernel::new(1, 0.5).unwrap();
        assert_relative_eq!(
            kernel.compute(&chars("ab"), &chars("ab")).unwrap(),
            0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gap_weighting() {
        // "ab" vs "ab": 2 single matches at λ², "ab" at λ⁴
        let kernel = SubsequenceKernel::new(2, 0.5).unwrap();
        let per_length = kernel.compute_per_length(&chars("ab"), &chars("ab")).unwrap();
        assert_relative_eq!(per_length[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(per_length[1], 0.0625, epsilon = 1e-12);

        // "ab" inside "axb" spans 3 symbols: λ^(2 + 3)
        let per_length = kernel
            .compute_per_length(&chars("ab"), &chars("axb"))
            .unwrap();
        assert_relative_eq!(per_length[1], 0.5_f64.powi(5), epsilon = 1e-12);
    }

    #[test]
    fn test_no_decay_counts_subsequences() {
        // λ = 1: C(7, 1) + C(7, 2) index pairs of distinct letters
        let kernel = SubsequenceKernel::new(2, 1.0).unwrap();
        let s = chars("ABCDEFG");
        assert_eq!(kernel.compute(&s, &s).unwrap(), 28.0);

        // shared E, F, G and EF, EG, FG
        let t = chars("EFGHIJK");
        assert_eq!(kernel.compute(&s, &t).unwrap(), 6.0);
    }

    #[test]
    fn test_longer_than_sequences() {
        let kernel = SubsequenceKernel::new(5, 1.0).unwrap();
        let per_length = kernel.compute_per_length(&chars("ab"), &chars("ab")).unwrap();
        assert_eq!(per_length, vec![2.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_sequence_is_zero() {
        let kernel = SubsequenceKernel::new(3, 0.8).unwrap();
        let empty: Vec<char> = Vec::new();
        assert_eq!(kernel.compute(&empty, &chars("abc")).unwrap(), 0.0);
        assert_eq!(kernel.compute(&chars("abc"), &empty).unwrap(), 0.0);
        assert_eq!(kernel.compute(&empty, &empty).unwrap(), 0.0);
    }

    #[test]
    fn test_self_similarity_positive() {
        let kernel = SubsequenceKernel::new(4, 0.1).unwrap();
        for text in ["a", "ab", "zzzz", "kernel"] {
            assert!(kernel.compute(&chars(text), &chars(text)).unwrap() > 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let kernel = SubsequenceKernel::new(3, 0.7).unwrap();
        let x = chars("GATTACA");
        let y = chars("TACTAG");
        let kxy = kernel.compute(&x, &y).unwrap();
        let kyx = kernel.compute(&y, &x).unwrap();
        assert_relative_eq!(kxy, kyx, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_reference_pair() {
        let kernel = SubsequenceKernel::new(2, 1.0).unwrap();
        let value = kernel
            .compute_normalized(&chars("ABCDEFG"), &chars("EFGHIJK"))
            .unwrap();
        assert_relative_eq!(value, 0.214285714285714246, epsilon = 1e-10);
    }

    #[test]
    fn test_byte_symbols() {
        let kernel = SubsequenceKernel::new(2, 1.0).unwrap();
        assert_eq!(kernel.compute(b"ab".as_slice(), b"ab".as_slice()).unwrap(), 3.0);
    }

    #[test]
    fn test_scratch_reuse_is_deterministic() {
        let kernel = SubsequenceKernel::new(3, 0.6).unwrap();
        kernel.reserve_scratch(64).unwrap();
        let x = chars("subsequence");
        let y = chars("sequences");
        let first = kernel.compute(&x, &y).unwrap();
        // Dirty the arena with a different shape before recomputing
        kernel.compute(&chars("zz"), &chars("zzzzzzzz")).unwrap();
        let second = kernel.compute(&x, &y).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_scratch_cells_overflow() {
        assert!(matches!(
            scratch_cells(usize::MAX, 4),
            Err(KernelError::ResourceExhausted { .. })
        ));
        assert_eq!(scratch_cells(2, 3).unwrap(), 16);
    }

    #[test]
    fn test_levels_capped_by_shorter_sequence() {
        // n far beyond both lengths still matches n = |shorter|
        let capped = SubsequenceKernel::new(3, 0.7).unwrap();
        let huge = SubsequenceKernel::new(1_000_000, 0.7).unwrap();
        let x = chars("abc");
        let y = chars("acbca");
        let expected = capped.compute_per_length(&x, &y).unwrap();
        let per_length = huge.compute_per_length(&x, &y).unwrap();
        assert_eq!(per_length.len(), 1_000_000);
        assert_eq!(&per_length[..3], expected.as_slice());
        assert!(per_length[3..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_overflowing_value_is_an_error() {
        // λ = 1 counts C(1200, 600) ≈ 1e359 common subsequence pairs
        let kernel = SubsequenceKernel::new(600, 1.0).unwrap();
        let long = vec![b'a'; 600];
        assert!(matches!(
            kernel.compute(long.as_slice(), long.as_slice()),
            Err(KernelError::NumericalRange(_))
        ));
    }

    #[test]
    fn test_underflowing_decay_is_an_error() {
        let kernel = SubsequenceKernel::new(2, 1e-170).unwrap();
        assert!(matches!(
            kernel.compute(&chars("ABC"), &chars("ABC")),
            Err(KernelError::NumericalRange(_))
        ));
        // no shared symbol: 0 is exact, not an underflow
        assert_eq!(kernel.compute(&chars("ABC"), &chars("XYZ")).unwrap(), 0.0);
    }
}
