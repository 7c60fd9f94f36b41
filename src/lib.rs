//! # mathscrap
//!
//! Turns photographs of handwritten or printed mathematical expressions into
//! canonical markup, a validated symbolic expression with a structural
//! analysis, and a plain-language reading.
//!
//! Recognition runs through a cascade of backends (an ONNX formula model,
//! the Mathpix API, an ONNX text-line model and Tesseract), each loaded
//! lazily at most once per process. When every tier fails, a deterministic
//! rule fallback keyed on the file name answers instead.
//!
//! ## Modules
//!
//! * [`core`] - errors, configuration, ONNX Runtime session helpers
//! * [`domain`] - images, recognition results and backend adapters
//! * [`models`] - ONNX model wrappers
//! * [`processors`] - markup normalization, garble detection, rendering
//! * [`symbolic`] - expression tree, parser, translator, analyzer, solver
//! * [`pipeline`] - preprocessing, backend selection, cascade, jobs
//! * [`utils`] - tracing setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use mathscrap::prelude::*;
//!
//! # async fn run() -> Result<(), MathError> {
//! let pipeline = MathPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .build()?;
//! let outcome = pipeline.process_image("quadratic.png", None).await;
//! println!("{}", serde_json::to_string_pretty(&outcome).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod symbolic;
pub mod utils;

/// Commonly used types.
pub mod prelude {
    pub use crate::core::{ConfigValidator, MathError, MathResult};
    pub use crate::domain::{BackendFailure, RasterImage, RecognitionResult, SourceTag};
    pub use crate::pipeline::{
        BackendConfig, BackendSelector, ImageOutcome, JobReport, MathPipeline,
        MathPipelineBuilder, PipelineConfig, ValidationResult,
    };
    pub use crate::processors::{MarkupNormalizer, ReadableRenderer, normalize_markup};
    pub use crate::symbolic::{AnalysisReport, SymbolicExpression, SymbolicTranslator, analyze};
}
