//! Core traits for sequence access

/// Read-only access to an ordered collection of symbol sequences
///
/// Kernels only ever read through this trait, so callers may back it with
/// whatever storage they already have.
pub trait SequenceSource<S>: Send + Sync {
    /// Number of sequences in the collection
    fn len(&self) -> usize;

    /// Borrow sequence `i` as a slice of symbols
    ///
    /// # Panics
    /// Panics if i >= len()
    fn sequence(&self, i: usize) -> &[S];

    /// Length of sequence `i`
    fn sequence_len(&self, i: usize) -> usize {
        self.sequence(i).len()
    }

    /// Symbol at position `p` of sequence `i`
    fn symbol(&self, i: usize, p: usize) -> &S {
        &self.sequence(i)[p]
    }

    /// Upper bound on sequence length, used to pre-size DP buffers
    fn max_len(&self) -> usize {
        (0..self.len())
            .map(|i| self.sequence_len(i))
            .max()
            .unwrap_or(0)
    }

    /// Check if the collection is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
