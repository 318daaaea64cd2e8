//! Utility functions for kernel matrices

use crate::core::{KernelError, KernelMatrix, Result};

/// Spectral checks for symmetric kernel matrices
pub mod spectral {
    use super::*;
    use nalgebra::{DMatrix, SymmetricEigen};

    /// Iteration cap handed to the eigen-solver
    const MAX_ITERATIONS: usize = 10_000;

    /// Eigenvalues of a symmetric matrix in ascending order
    pub fn symmetric_eigenvalues(matrix: &KernelMatrix) -> Result<Vec<f64>> {
        if !matrix.is_square() {
            return Err(KernelError::InvalidParameter(format!(
                "Eigenvalues need a square matrix, got {}x{}",
                matrix.rows(),
                matrix.cols()
            )));
        }
        if matrix.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(KernelError::NumericalRange(
                "Kernel matrix holds non-finite values".to_string(),
            ));
        }

        let n = matrix.rows();
        if n == 0 {
            return Ok(Vec::new());
        }

        let dense = DMatrix::from_row_slice(n, n, matrix.as_slice());
        let eigen = SymmetricEigen::try_new(dense, f64::EPSILON, MAX_ITERATIONS)
            .ok_or_else(|| {
                KernelError::NumericalRange(format!(
                    "Eigen-decomposition did not converge within {MAX_ITERATIONS} iterations"
                ))
            })?;

        let mut eigenvalues: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        eigenvalues.sort_by(f64::total_cmp);
        Ok(eigenvalues)
    }

    /// Check that no eigenvalue is below `-epsilon`
    pub fn is_positive_semidefinite(matrix: &KernelMatrix, epsilon: f64) -> Result<bool> {
        let eigenvalues = symmetric_eigenvalues(matrix)?;
        Ok(eigenvalues.first().is_none_or(|&min| min >= -epsilon))
    }
}

/// Summary statistics
pub mod stats {
    use super::*;

    /// Value summary of a kernel matrix
    #[derive(Debug, Clone, PartialEq)]
    pub struct KernelMatrixStats {
        pub min: f64,
        pub max: f64,
        pub mean: f64,
        /// Mean of entries with i != j (0 when there are none)
        pub off_diagonal_mean: f64,
        pub symmetric: bool,
    }

    /// Summarize the entries of a matrix
    pub fn matrix_stats(matrix: &KernelMatrix) -> KernelMatrixStats {
        let values = matrix.as_slice();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };

        let cols = matrix.cols();
        let (off_sum, off_count) = values
            .iter()
            .enumerate()
            .filter(|(idx, _)| idx / cols != idx % cols)
            .fold((0.0, 0usize), |(sum, count), (_, &v)| (sum + v, count + 1));
        let off_diagonal_mean = if off_count == 0 {
            0.0
        } else {
            off_sum / off_count as f64
        };

        KernelMatrixStats {
            min,
            max,
            mean,
            off_diagonal_mean,
            symmetric: matrix.is_symmetric(),
        }
    }
}

/// Memory estimation utilities
pub mod memory {
    /// Bytes of the two rolled DP planes used per kernel evaluation
    pub fn estimate_scratch_bytes(max_subsequence_length: usize, max_sequence_len: usize) -> usize {
        2usize
            .saturating_mul(max_subsequence_length.min(max_sequence_len))
            .saturating_mul(max_sequence_len.saturating_add(1))
            .saturating_mul(std::mem::size_of::<f64>())
    }

    /// Bytes of a dense rows x cols kernel matrix
    pub fn estimate_matrix_bytes(rows: usize, cols: usize) -> usize {
        rows.saturating_mul(cols)
            .saturating_mul(std::mem::size_of::<f64>())
    }
}
