//! Capability interfaces.

use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use std::fmt::Debug;

/// A recognition backend: one image in, markup out.
///
/// Implementations are blocking; the cascade runs them on the blocking pool.
pub trait Recognizer: Send + Sync + Debug {
    /// Tier this recognizer occupies.
    fn tag(&self) -> SourceTag;

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure>;
}
