//! Error types.

mod types;

pub use types::{MathError, ProcessingStage};

/// Result alias used throughout the crate.
pub type MathResult<T> = Result<T, MathError>;
