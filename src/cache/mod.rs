//! Lazily evaluated, cached kernel entries
//!
//! Learners such as SMO solvers touch only a fraction of the kernel matrix,
//! and string kernels are expensive per pair. `CachedKernel` evaluates
//! entries on demand and keeps raw values in an LRU cache keyed by the
//! unordered pair, since K(i, j) = K(j, i).

use crate::core::{KernelError, Result, SequenceSource};
use crate::kernel::{normalize, SequenceKernel};
use log::debug;
use lru::LruCache;
use std::marker::PhantomData;
use std::num::NonZeroUsize;

/// Unordered sequence pair, stored with the smaller index first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(usize, usize);

impl PairKey {
    fn new(i: usize, j: usize) -> Self {
        Self(i.min(j), i.max(j))
    }
}

/// LRU cache of raw kernel values for sequence pairs
pub struct KernelCache {
    entries: LruCache<PairKey, f64>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl KernelCache {
    /// Create a cache holding at most `capacity` pairs (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Size the cache from a memory budget in bytes (~16 bytes per pair)
    pub fn with_memory_limit(memory_bytes: usize) -> Self {
        Self::new(memory_bytes / 16)
    }

    /// Look up K(i, j), counting a hit or a miss
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        let found = self.entries.get(&PairKey::new(i, j)).copied();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    /// Store K(i, j), evicting the least recently used pair when full
    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        let key = PairKey::new(i, j);
        if let Some((evicted, _)) = self.entries.push(key, value) {
            if evicted != key {
                self.evictions += 1;
            }
        }
    }

    /// Return the cached value or compute, store and return it
    pub fn get_or_insert_with<F>(&mut self, i: usize, j: usize, compute: F) -> Result<f64>
    where
        F: FnOnce() -> Result<f64>,
    {
        if let Some(value) = self.get(i, j) {
            return Ok(value);
        }
        let value = compute()?;
        self.put(i, j, value);
        Ok(value)
    }

    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            capacity: self.entries.cap().get(),
            size: self.entries.len(),
        }
    }

    /// Drop all entries and reset counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub capacity: usize,
    pub size: usize,
}

/// Kernel over one fixed collection, evaluated on demand
///
/// Self-similarities are computed once up front; they are the diagonal and
/// the normalization denominators for every other entry.
pub struct CachedKernel<'a, S, C: ?Sized, K> {
    kernel: K,
    collection: &'a C,
    diagonal: Vec<f64>,
    cache: KernelCache,
    normalize: bool,
    _symbol: PhantomData<fn(&S)>,
}

impl<'a, S, C, K> CachedKernel<'a, S, C, K>
where
    C: SequenceSource<S> + ?Sized,
    K: SequenceKernel<S>,
{
    /// Wrap `collection`, caching up to `capacity` off-diagonal pairs
    pub fn new(kernel: K, collection: &'a C, capacity: usize) -> Result<Self> {
        kernel.prepare(collection.max_len())?;
        let diagonal = (0..collection.len())
            .map(|i| {
                let x = collection.sequence(i);
                kernel.compute(x, x)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Cached kernel over {} sequences with capacity {}",
            diagonal.len(),
            capacity
        );

        Ok(Self {
            kernel,
            collection,
            diagonal,
            cache: KernelCache::new(capacity),
            normalize: true,
            _symbol: PhantomData,
        })
    }

    /// Enable or disable normalized output (enabled by default)
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Number of sequences
    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// Raw self-similarities
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(KernelError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Raw K(i, j)
    pub fn raw(&mut self, i: usize, j: usize) -> Result<f64> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Ok(self.diagonal[i]);
        }

        let (kernel, collection) = (&self.kernel, self.collection);
        self.cache.get_or_insert_with(i, j, || {
            kernel.compute(collection.sequence(i), collection.sequence(j))
        })
    }

    /// Entry (i, j), normalized unless disabled
    pub fn get(&mut self, i: usize, j: usize) -> Result<f64> {
        let raw = self.raw(i, j)?;
        if self.normalize {
            Ok(normalize(raw, self.diagonal[i], self.diagonal[j]))
        } else {
            Ok(raw)
        }
    }

    /// Full row i
    pub fn row(&mut self, i: usize) -> Result<Vec<f64>> {
        (0..self.len()).map(|j| self.get(i, j)).collect()
    }

    /// Evaluate an unseen query against every sequence of the collection
    ///
    /// Nothing is cached; the query has no index in the collection.
    pub fn evaluate_query(&self, query: &[S]) -> Result<Vec<f64>> {
        let query_self = if self.normalize {
            self.kernel.compute(query, query)?
        } else {
            0.0
        };
        (0..self.len())
            .map(|j| {
                let raw = self.kernel.compute(query, self.collection.sequence(j))?;
                Ok(if self.normalize {
                    normalize(raw, query_self, self.diagonal[j])
                } else {
                    raw
                })
            })
            .collect()
    }

    /// Cache counters
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
