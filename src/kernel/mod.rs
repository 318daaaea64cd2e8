//! Kernel functions over symbol sequences

pub mod subsequence;
pub mod traits;

pub use self::subsequence::*;
pub use self::traits::*;
