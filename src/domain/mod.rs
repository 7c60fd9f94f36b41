//! Domain types and recognition adapters.

pub mod adapters;
pub mod raster;
pub mod recognition;

pub use adapters::{Backend, RuleFallback};
pub use raster::RasterImage;
pub use recognition::{BackendFailure, RawRecognition, RecognitionResult, SourceTag};
