//! String subsequence kernels in pure Rust
//!
//! Based on "Text Classification using String Kernels" by Lodhi, Saunders,
//! Shawe-Taylor, Cristianini and Watkins

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod matrix;
pub mod persistence;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{build_matrix, similarity, StringKernel};
pub use crate::cache::{CacheStats, CachedKernel, KernelCache};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{KernelError, Result};
pub use crate::data::TextSequences;
pub use crate::kernel::{SequenceKernel, SubsequenceKernel};
pub use crate::matrix::{CancellationToken, KernelMatrixBuilder};
pub use crate::persistence::SerializableKernelMatrix;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
