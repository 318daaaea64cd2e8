//! Sequence loading
//!
//! Loaders produce collections that implement `SequenceSource` so they can
//! be passed straight to the kernel matrix builder.

pub mod text;

pub use self::text::*;
