//! Configuration management.
//!
//! Validation trait, error type and ONNX Runtime session options. Stage
//! configs live next to the stage they configure and implement
//! [`ConfigValidator`].

pub mod errors;
pub mod onnx;

pub use errors::{ConfigError, ConfigValidator, ConfigValidatorExt};
pub use onnx::{OrtGraphOptimizationLevel, OrtSessionConfig};

use serde::de::DeserializeOwned;
use std::path::Path;

/// Read a JSON config file and validate it.
pub fn load_json_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + ConfigValidator,
{
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: T = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
