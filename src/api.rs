//! High-level API for string kernel computation
//!
//! # Quick Start
//!
//! ```rust
//! use seqkernel::api::StringKernel;
//! use seqkernel::SequenceCollection;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let docs = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
//!
//! let matrix = StringKernel::new()
//!     .with_max_length(2)
//!     .with_decay(1.0)
//!     .matrix(&docs)?;
//!
//! assert!((matrix.get(0, 1) - 0.2142857142857142).abs() < 1e-10);
//! # Ok(())
//! # }
//! ```

use crate::core::{KernelMatrix, KernelParameters, Result, SequenceSource};
use crate::kernel::{SequenceKernel, SubsequenceKernel};
use crate::matrix::{CancellationToken, KernelMatrixBuilder};

/// Raw subsequence kernel value for one pair of sequences
pub fn similarity<S: PartialEq>(x: &[S], y: &[S], params: KernelParameters) -> Result<f64> {
    SubsequenceKernel::from_parameters(params)?.compute(x, y)
}

/// Normalized kernel matrix between two collections
///
/// Passing the same collection twice yields the symmetric self-kernel.
pub fn build_matrix<S, A, B>(left: &A, right: &B, params: KernelParameters) -> Result<KernelMatrix>
where
    S: PartialEq + Sync,
    A: SequenceSource<S> + ?Sized,
    B: SequenceSource<S> + ?Sized,
{
    KernelMatrixBuilder::new(params)?.build_matrix(left, right)
}

/// String kernel configuration with builder pattern
#[derive(Debug, Clone)]
pub struct StringKernel {
    params: KernelParameters,
    normalize: bool,
    parallel: bool,
    cancellation: Option<CancellationToken>,
}

impl StringKernel {
    /// Default configuration: n = 2, λ = 0.5, normalized, parallel
    pub fn new() -> Self {
        Self {
            params: KernelParameters::default(),
            normalize: true,
            parallel: true,
            cancellation: None,
        }
    }

    /// Set the maximum subsequence length n
    pub fn with_max_length(mut self, max_subsequence_length: usize) -> Self {
        self.params.max_subsequence_length = max_subsequence_length;
        self
    }

    /// Set the decay factor λ
    pub fn with_decay(mut self, decay_factor: f64) -> Self {
        self.params.decay_factor = decay_factor;
        self
    }

    /// Enable or disable unit-diagonal normalization
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Enable or disable parallel matrix construction
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Allow the caller to abandon matrix builds between rows
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Current parameters (not yet validated)
    pub fn parameters(&self) -> KernelParameters {
        self.params
    }

    /// Validate the configuration and produce a matrix builder
    pub fn build(&self) -> Result<KernelMatrixBuilder> {
        let mut builder = KernelMatrixBuilder::new(self.params)?
            .with_normalization(self.normalize)
            .with_parallelism(self.parallel);
        if let Some(token) = &self.cancellation {
            builder = builder.with_cancellation(token.clone());
        }
        Ok(builder)
    }

    /// Kernel matrix of a collection against itself
    pub fn matrix<S, A>(&self, collection: &A) -> Result<KernelMatrix>
    where
        S: PartialEq + Sync,
        A: SequenceSource<S> + ?Sized,
    {
        self.build()?.build_self_matrix(collection)
    }

    /// Kernel matrix between two collections
    pub fn cross_matrix<S, A, B>(&self, left: &A, right: &B) -> Result<KernelMatrix>
    where
        S: PartialEq + Sync,
        A: SequenceSource<S> + ?Sized,
        B: SequenceSource<S> + ?Sized,
    {
        self.build()?.build_matrix(left, right)
    }

    /// Kernel value for one pair, normalized if configured
    pub fn similarity<S: PartialEq>(&self, x: &[S], y: &[S]) -> Result<f64> {
        let kernel = SubsequenceKernel::from_parameters(self.params)?;
        if self.normalize {
            kernel.compute_normalized(x, y)
        } else {
            kernel.compute(x, y)
        }
    }
}

impl Default for StringKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;
    use crate::core::SequenceCollection;
    use crate::data::TextSequences;
    use std::path::Path;

    /// Normalized similarity of two strings
    pub fn text_similarity(x: &str, y: &str, max_length: usize, decay: f64) -> Result<f64> {
        let x: Vec<char> = x.chars().collect();
        let y: Vec<char> = y.chars().collect();
        StringKernel::new()
            .with_max_length(max_length)
            .with_decay(decay)
            .similarity(&x, &y)
    }

    /// Normalized self-kernel matrix of string slices
    pub fn text_matrix(texts: &[&str], max_length: usize, decay: f64) -> Result<KernelMatrix> {
        let collection = SequenceCollection::from_strs(texts);
        StringKernel::new()
            .with_max_length(max_length)
            .with_decay(decay)
            .matrix(&collection)
    }

    /// Normalized self-kernel matrix of a sequence file
    pub fn file_matrix<P: AsRef<Path>>(
        path: P,
        max_length: usize,
        decay: f64,
    ) -> Result<KernelMatrix> {
        let sequences = TextSequences::from_file(path)?;
        StringKernel::new()
            .with_max_length(max_length)
            .with_decay(decay)
            .matrix(&sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelError, SequenceCollection};
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_pattern() {
        let kernel = StringKernel::new()
            .with_max_length(4)
            .with_decay(0.25)
            .with_normalization(false)
            .with_parallelism(false);

        assert_eq!(kernel.parameters().max_subsequence_length, 4);
        assert_eq!(kernel.parameters().decay_factor, 0.25);
        assert!(!kernel.normalize);
        assert!(!kernel.parallel);
        assert!(!kernel.build().unwrap().normalizes());
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let result = StringKernel::new().with_decay(0.0).build();
        assert!(matches!(result, Err(KernelError::InvalidParameter(_))));

        let collection = SequenceCollection::from_strs(&["AB"]);
        let result = StringKernel::new().with_max_length(0).matrix(&collection);
        assert!(matches!(result, Err(KernelError::InvalidParameter(_))));
    }

    #[test]
    fn test_free_functions() {
        let params = KernelParameters::new(2, 1.0).unwrap();
        let x: Vec<char> = "ABCDEFG".chars().collect();
        let y: Vec<char> = "EFGHIJK".chars().collect();
        assert_eq!(similarity(&x, &y, params).unwrap(), 6.0);

        let docs = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
        let matrix = build_matrix(&docs, &docs, params).unwrap();
        assert_relative_eq!(matrix.get(1, 0), 0.214285714285714246, epsilon = 1e-10);
    }

    #[test]
    fn test_pair_similarity() {
        let kernel = StringKernel::new().with_max_length(2).with_decay(1.0);
        let x: Vec<char> = "ABCDEFG".chars().collect();
        let y: Vec<char> = "EFGHIJK".chars().collect();
        assert_relative_eq!(
            kernel.similarity(&x, &y).unwrap(),
            0.214285714285714246,
            epsilon = 1e-10
        );
        let raw = kernel.with_normalization(false).similarity(&x, &y).unwrap();
        assert_eq!(raw, 6.0);
    }

    #[test]
    fn test_cancellation_passes_through() {
        let token = CancellationToken::new();
        token.cancel();
        let collection = SequenceCollection::from_strs(&["AB", "BC"]);
        let result = StringKernel::new()
            .with_cancellation(token)
            .matrix(&collection);
        assert!(matches!(result, Err(KernelError::Cancelled { .. })));
    }

    #[test]
    fn test_quick_functions() {
        let value = quick::text_similarity("ABCDEFG", "EFGHIJK", 2, 1.0).unwrap();
        assert_relative_eq!(value, 0.214285714285714246, epsilon = 1e-10);

        let matrix = quick::text_matrix(&["cat", "cart", "dog"], 2, 0.5).unwrap();
        assert!(matrix.get(0, 1) > matrix.get(0, 2));

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "ABCDEFG").expect("Failed to write");
        writeln!(temp_file, "EFGHIJK").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let matrix = quick::file_matrix(temp_file.path(), 2, 1.0).unwrap();
        assert_relative_eq!(matrix.get(0, 1), 0.214285714285714246, epsilon = 1e-10);
    }
}
