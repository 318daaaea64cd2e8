//! Core type definitions for string kernels

use crate::core::{KernelError, Result, SequenceSource};
use serde::{Deserialize, Serialize};

/// Immutable sequence of symbols
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sequence<S> {
    symbols: Box<[S]>,
}

impl<S> Sequence<S> {
    /// Create a new sequence from owned symbols
    pub fn new(symbols: Vec<S>) -> Self {
        Self {
            symbols: symbols.into_boxed_slice(),
        }
    }

    /// Create an empty sequence
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if sequence has no symbols
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Borrow the symbols
    pub fn as_slice(&self) -> &[S] {
        &self.symbols
    }
}

impl<S> AsRef<[S]> for Sequence<S> {
    fn as_ref(&self) -> &[S] {
        &self.symbols
    }
}

impl<S> From<Vec<S>> for Sequence<S> {
    fn from(symbols: Vec<S>) -> Self {
        Self::new(symbols)
    }
}

impl From<&str> for Sequence<char> {
    fn from(text: &str) -> Self {
        Self::new(text.chars().collect())
    }
}

impl From<&[u8]> for Sequence<u8> {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// Ordered collection of sequences with a tracked maximum length
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceCollection<S> {
    sequences: Vec<Sequence<S>>,
    max_len: usize,
}

impl<S> SequenceCollection<S> {
    /// Create a collection from sequences
    pub fn new(sequences: Vec<Sequence<S>>) -> Self {
        let max_len = sequences.iter().map(Sequence::len).max().unwrap_or(0);
        Self { sequences, max_len }
    }

    /// Append a sequence, growing the length bound if needed
    pub fn push(&mut self, sequence: Sequence<S>) {
        self.max_len = self.max_len.max(sequence.len());
        self.sequences.push(sequence);
    }

    /// Get a sequence by index
    pub fn get(&self, i: usize) -> Option<&Sequence<S>> {
        self.sequences.get(i)
    }

    /// Iterate over sequences in order
    pub fn iter(&self) -> std::slice::Iter<'_, Sequence<S>> {
        self.sequences.iter()
    }
}

impl SequenceCollection<char> {
    /// Build a character collection from string slices
    pub fn from_strs(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|&t| Sequence::from(t)).collect())
    }
}

impl<S> FromIterator<Sequence<S>> for SequenceCollection<S> {
    fn from_iter<I: IntoIterator<Item = Sequence<S>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<S: Send + Sync> SequenceSource<S> for SequenceCollection<S> {
    fn len(&self) -> usize {
        self.sequences.len()
    }

    fn sequence(&self, i: usize) -> &[S] {
        self.sequences[i].as_slice()
    }

    fn max_len(&self) -> usize {
        self.max_len
    }
}

/// Parameters of the subsequence string kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParameters {
    /// Longest common subsequence length counted (n >= 1)
    pub max_subsequence_length: usize,
    /// Gap decay factor lambda in (0, 1]
    pub decay_factor: f64,
}

impl KernelParameters {
    /// Create validated kernel parameters
    pub fn new(max_subsequence_length: usize, decay_factor: f64) -> Result<Self> {
        let params = Self {
            max_subsequence_length,
            decay_factor,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_subsequence_length < 1 {
            return Err(KernelError::InvalidParameter(format!(
                "Maximum subsequence length must be at least 1, got: {}",
                self.max_subsequence_length
            )));
        }
        if !self.decay_factor.is_finite() || self.decay_factor <= 0.0 || self.decay_factor > 1.0
        {
            return Err(KernelError::InvalidParameter(format!(
                "Decay factor must be in (0, 1], got: {}",
                self.decay_factor
            )));
        }
        Ok(())
    }
}

impl Default for KernelParameters {
    fn default() -> Self {
        Self {
            max_subsequence_length: 2,
            decay_factor: 0.5,
        }
    }
}

/// Dense row-major kernel matrix
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl KernelMatrix {
    /// Wrap row-major values
    ///
    /// # Panics
    /// Panics if data.len() != rows * cols
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "Matrix data must have rows * cols elements"
        );
        Self { rows, cols, data }
    }

    /// Number of rows (sequences on the left)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (sequences on the right)
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Check if the matrix is square
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Entry (i, j)
    ///
    /// # Panics
    /// Panics if the index is outside the matrix
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.rows && j < self.cols, "Matrix index out of bounds");
        self.data[i * self.cols + j]
    }

    /// Row i as a slice
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Diagonal entries (min(rows, cols) of them)
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols))
            .map(|i| self.data[i * self.cols + i])
            .collect()
    }

    /// Exact symmetry check
    pub fn is_symmetric(&self) -> bool {
        self.is_square()
            && (0..self.rows).all(|i| (0..i).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// Row-major values
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume into row-major values
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}
