//! Core building blocks: errors, configuration, inference session helpers
//! and the recognizer interface.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod traits;

pub use config::{ConfigError, ConfigValidator, ConfigValidatorExt, OrtSessionConfig};
pub use constants::*;
pub use errors::{MathError, MathResult, ProcessingStage};
pub use inference::{init_runtime, load_session};
pub use traits::Recognizer;
