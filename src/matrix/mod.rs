//! Kernel matrix construction
//!
//! Every cell (i, j) is an independent kernel evaluation, so rows are handed
//! to rayon workers that each write only their own slice of the output.
//! Self-kernels evaluate the upper triangle and mirror it. Normalization
//! runs after all rows are complete and reads only the diagonal.

use crate::core::{KernelError, KernelMatrix, KernelParameters, Result, SequenceSource};
use crate::kernel::{normalize, SequenceKernel, SubsequenceKernel};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared flag that lets a caller abandon a matrix build between rows
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; rows already started still finish
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Builds kernel matrices between sequence collections
#[derive(Debug, Clone)]
pub struct KernelMatrixBuilder<K = SubsequenceKernel> {
    kernel: K,
    normalize: bool,
    parallel: bool,
    cancellation: Option<CancellationToken>,
}

impl KernelMatrixBuilder<SubsequenceKernel> {
    /// Create a builder for the subsequence kernel with validated parameters
    pub fn new(params: KernelParameters) -> Result<Self> {
        Ok(Self::with_kernel(SubsequenceKernel::from_parameters(params)?))
    }
}

impl<K> KernelMatrixBuilder<K> {
    /// Create a builder around any kernel, normalized and parallel by default
    pub fn with_kernel(kernel: K) -> Self {
        Self {
            kernel,
            normalize: true,
            parallel: true,
            cancellation: None,
        }
    }

    /// Enable or disable the unit-diagonal normalization pass
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Enable or disable row-parallel evaluation
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Attach a token checked before each row
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The underlying kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Whether the normalization pass is enabled
    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Build the kernel matrix between `left` and `right`
    ///
    /// Passing the same collection twice takes the symmetric path.
    pub fn build_matrix<S, A, B>(&self, left: &A, right: &B) -> Result<KernelMatrix>
    where
        K: SequenceKernel<S>,
        S: Sync,
        A: SequenceSource<S> + ?Sized,
        B: SequenceSource<S> + ?Sized,
    {
        let same = (left as *const A).cast::<()>() == (right as *const B).cast::<()>()
            && left.len() == right.len();
        if same {
            self.build_self_matrix(left)
        } else {
            self.build_cross_matrix(left, right)
        }
    }

    /// Build the symmetric kernel matrix of a collection against itself
    pub fn build_self_matrix<S, A>(&self, collection: &A) -> Result<KernelMatrix>
    where
        K: SequenceKernel<S>,
        S: Sync,
        A: SequenceSource<S> + ?Sized,
    {
        let n = collection.len();
        let max_len = collection.max_len();
        let start = Instant::now();
        debug!(
            "Building {}x{} self kernel matrix (max sequence length {}, normalize={}, parallel={})",
            n, n, max_len, self.normalize, self.parallel
        );

        let mut data = allocate(n, n)?;
        if n == 0 {
            return Ok(KernelMatrix::from_vec(0, 0, data));
        }
        self.kernel.prepare(max_len)?;

        self.fill_rows(&mut data, n, |i, row| {
            self.kernel.prepare(max_len)?;
            let x = collection.sequence(i);
            for (j, cell) in row.iter_mut().enumerate().skip(i) {
                *cell = self.kernel.compute(x, collection.sequence(j))?;
            }
            Ok(())
        })?;

        for i in 1..n {
            for j in 0..i {
                data[i * n + j] = data[j * n + i];
            }
        }

        let mut matrix = KernelMatrix::from_vec(n, n, data);
        if self.normalize {
            let diagonal = matrix.diagonal();
            self.normalize_in_place(&mut matrix, &diagonal, &diagonal);
        }

        info!(
            "Self kernel matrix of {} sequences computed in {:.3?}",
            n,
            start.elapsed()
        );
        Ok(matrix)
    }

    /// Build the rectangular kernel matrix between two distinct collections
    ///
    /// With normalization on, entry (i, j) is scaled by the self-similarities
    /// of left sequence i and right sequence j.
    pub fn build_cross_matrix<S, A, B>(&self, left: &A, right: &B) -> Result<KernelMatrix>
    where
        K: SequenceKernel<S>,
        S: Sync,
        A: SequenceSource<S> + ?Sized,
        B: SequenceSource<S> + ?Sized,
    {
        let (rows, cols) = (left.len(), right.len());
        let max_len = left.max_len().max(right.max_len());
        let start = Instant::now();
        debug!(
            "Building {}x{} cross kernel matrix (max sequence length {}, normalize={}, parallel={})",
            rows, cols, max_len, self.normalize, self.parallel
        );

        let mut data = allocate(rows, cols)?;
        if rows == 0 || cols == 0 {
            return Ok(KernelMatrix::from_vec(rows, cols, data));
        }
        self.kernel.prepare(max_len)?;

        self.fill_rows(&mut data, cols, |i, row| {
            self.kernel.prepare(max_len)?;
            let x = left.sequence(i);
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.kernel.compute(x, right.sequence(j))?;
            }
            Ok(())
        })?;

        let mut matrix = KernelMatrix::from_vec(rows, cols, data);
        if self.normalize {
            let left_diagonal = self.self_similarities(left)?;
            let right_diagonal = self.self_similarities(right)?;
            self.normalize_in_place(&mut matrix, &left_diagonal, &right_diagonal);
        }

        info!(
            "Cross kernel matrix {}x{} computed in {:.3?}",
            rows,
            cols,
            start.elapsed()
        );
        Ok(matrix)
    }

    /// Raw K(x_i, x_i) for every sequence of a collection
    pub fn self_similarities<S, A>(&self, collection: &A) -> Result<Vec<f64>>
    where
        K: SequenceKernel<S>,
        S: Sync,
        A: SequenceSource<S> + ?Sized,
    {
        let evaluate = |i: usize| {
            let x = collection.sequence(i);
            self.kernel.compute(x, x)
        };
        if self.parallel {
            (0..collection.len()).into_par_iter().map(evaluate).collect()
        } else {
            (0..collection.len()).map(evaluate).collect()
        }
    }

    /// Raw kernel values of one query against every sequence of a reference collection
    pub fn row_against<S, B>(&self, query: &[S], reference: &B) -> Result<Vec<f64>>
    where
        K: SequenceKernel<S>,
        S: Sync,
        B: SequenceSource<S> + ?Sized,
    {
        let evaluate = |j: usize| self.kernel.compute(query, reference.sequence(j));
        if self.parallel {
            (0..reference.len()).into_par_iter().map(evaluate).collect()
        } else {
            (0..reference.len()).map(evaluate).collect()
        }
    }

    /// Run `fill` once per matrix row, checking for cancellation before each row
    fn fill_rows<F>(&self, data: &mut [f64], cols: usize, fill: F) -> Result<()>
    where
        K: Sync,
        F: Fn(usize, &mut [f64]) -> Result<()> + Sync + Send,
    {
        let completed = AtomicUsize::new(0);
        let run = |(i, row): (usize, &mut [f64])| -> Result<()> {
            if self.is_cancelled() {
                return Err(KernelError::Cancelled {
                    completed_rows: completed.load(Ordering::SeqCst),
                });
            }
            fill(i, row)?;
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };

        let result = if self.parallel {
            data.par_chunks_mut(cols).enumerate().try_for_each(run)
        } else {
            data.chunks_mut(cols).enumerate().try_for_each(run)
        };
        if let Err(KernelError::Cancelled { completed_rows }) = &result {
            warn!("Kernel matrix build cancelled after {completed_rows} rows");
        }
        result
    }

    /// Divide each entry by sqrt(left_self[i]) * sqrt(right_self[j]); zero norms give 0
    fn normalize_in_place(&self, matrix: &mut KernelMatrix, left_self: &[f64], right_self: &[f64]) {
        let zero_rows = left_self.iter().filter(|&&v| v <= 0.0).count();
        let zero_cols = right_self.iter().filter(|&&v| v <= 0.0).count();
        if zero_rows + zero_cols > 0 {
            warn!(
                "Zero self-similarity in {zero_rows} rows and {zero_cols} columns; those entries normalize to 0"
            );
        }

        let cols = matrix.cols();
        let scale_row = |(i, row): (usize, &mut [f64])| {
            for (j, value) in row.iter_mut().enumerate() {
                *value = normalize(*value, left_self[i], right_self[j]);
            }
        };
        if self.parallel {
            matrix
                .as_mut_slice()
                .par_chunks_mut(cols)
                .enumerate()
                .for_each(scale_row);
        } else {
            matrix
                .as_mut_slice()
                .chunks_mut(cols)
                .enumerate()
                .for_each(scale_row);
        }
    }
}

/// Allocate a zeroed rows x cols buffer, reporting failure instead of aborting
fn allocate(rows: usize, cols: usize) -> Result<Vec<f64>> {
    let cells = rows
        .checked_mul(cols)
        .ok_or(KernelError::ResourceExhausted {
            requested: usize::MAX,
        })?;
    let mut data = Vec::new();
    data.try_reserve_exact(cells)
        .map_err(|_| KernelError::ResourceExhausted { requested: cells })?;
    data.resize(cells, 0.0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Sequence, SequenceCollection};
    use approx::assert_relative_eq;

    fn builder(n: usize, lambda: f64) -> KernelMatrixBuilder {
        KernelMatrixBuilder::new(KernelParameters::new(n, lambda).unwrap()).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let collection = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
        let matrix = builder(2, 1.0).build_matrix(&collection, &collection).unwrap();

        assert_relative_eq!(matrix.get(0, 0), 1.0, epsilon = 1e-10);
        assert_relative_eq!(matrix.get(1, 1), 1.0, epsilon = 1e-10);
        assert_relative_eq!(matrix.get(0, 1), 0.214285714285714246, epsilon = 1e-10);
        assert_relative_eq!(matrix.get(1, 0), 0.214285714285714246, epsilon = 1e-10);
    }

    #[test]
    fn test_raw_matrix_values() {
        let collection = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
        let matrix = builder(2, 1.0)
            .with_normalization(false)
            .build_self_matrix(&collection)
            .unwrap();

        assert_eq!(matrix.as_slice(), &[28.0, 6.0, 6.0, 28.0]);
    }

    #[test]
    fn test_self_matrix_symmetric() {
        let collection = SequenceCollection::from_strs(&["GATTACA", "CAT", "TAGACAT", "ACGT"]);
        let matrix = builder(3, 0.6).build_self_matrix(&collection).unwrap();
        assert!(matrix.is_symmetric());
        for value in matrix.diagonal() {
            assert_relative_eq!(value, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_cross_matrix_matches_self_block() {
        let left = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
        let right = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK", "XYZ"]);
        let matrix = builder(2, 1.0).build_matrix(&left, &right).unwrap();

        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.cols(), 3);
        assert_relative_eq!(matrix.get(0, 0), 1.0, epsilon = 1e-10);
        assert_relative_eq!(matrix.get(1, 0), 0.214285714285714246, epsilon = 1e-10);
        assert_eq!(matrix.get(0, 2), 0.0);
    }

    #[test]
    fn test_empty_sequence_normalizes_to_zero() {
        let mut collection = SequenceCollection::from_strs(&["ABC", "BCD"]);
        collection.push(Sequence::empty());
        let matrix = builder(2, 0.5).build_self_matrix(&collection).unwrap();

        for j in 0..3 {
            assert_eq!(matrix.get(2, j), 0.0);
            assert_eq!(matrix.get(j, 2), 0.0);
        }
        assert!(matrix.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_collections() {
        let empty: SequenceCollection<char> = SequenceCollection::new(Vec::new());
        let other = SequenceCollection::from_strs(&["A"]);

        let matrix = builder(2, 0.5).build_self_matrix(&empty).unwrap();
        assert_eq!((matrix.rows(), matrix.cols()), (0, 0));

        let matrix = builder(2, 0.5).build_matrix(&other, &empty).unwrap();
        assert_eq!((matrix.rows(), matrix.cols()), (1, 0));
    }

    #[test]
    fn test_parallel_and_sequential_identical() {
        let collection = SequenceCollection::from_strs(&[
            "kernel", "methods", "string", "subsequence", "gap", "weighted",
        ]);
        let parallel = builder(3, 0.7).build_self_matrix(&collection).unwrap();
        let sequential = builder(3, 0.7)
            .with_parallelism(false)
            .build_self_matrix(&collection)
            .unwrap();
        let bits = |m: &KernelMatrix| m.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&parallel), bits(&sequential));
    }

    #[test]
    fn test_cancelled_build_returns_error() {
        let collection = SequenceCollection::from_strs(&["ABC", "BCD", "CDE"]);
        let token = CancellationToken::new();
        token.cancel();

        let result = builder(2, 0.5)
            .with_cancellation(token.clone())
            .build_self_matrix(&collection);
        assert!(matches!(result, Err(KernelError::Cancelled { .. })));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_row_against_reference() {
        let reference = SequenceCollection::from_strs(&["ABCDEFG", "EFGHIJK"]);
        let query: Vec<char> = "ABCDEFG".chars().collect();
        let row = builder(2, 1.0).row_against(&query, &reference).unwrap();
        assert_eq!(row, vec![28.0, 6.0]);
    }

    #[test]
    fn test_self_similarities() {
        let collection = SequenceCollection::from_strs(&["AB", ""]);
        let diagonal = builder(2, 1.0).self_similarities(&collection).unwrap();
        assert_eq!(diagonal, vec![3.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_values_fail_the_build() {
        let long = "a".repeat(600);
        let collection = SequenceCollection::from_strs(&[long.as_str(), "AB"]);
        let result = builder(600, 1.0).build_self_matrix(&collection);
        assert!(matches!(result, Err(KernelError::NumericalRange(_))));

        let collection = SequenceCollection::from_strs(&["ABC", "ABD"]);
        let result = builder(2, 1e-170)
            .with_normalization(false)
            .build_self_matrix(&collection);
        assert!(matches!(result, Err(KernelError::NumericalRange(_))));
    }

    #[test]
    fn test_allocate_overflow() {
        assert!(matches!(
            allocate(usize::MAX, 2),
            Err(KernelError::ResourceExhausted { .. })
        ));
    }
}
