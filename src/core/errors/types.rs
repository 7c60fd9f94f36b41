//! Core error types for the recognition pipeline.
//!
//! [`MathError`] covers everything that is fatal for one image. Recoverable
//! conditions (backend failures, garbled output, unparseable markup) are
//! modelled as data elsewhere and never become a `MathError`.

use thiserror::Error;

/// Stage of the pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Image preprocessing (grayscale, deskew, threshold).
    Preprocess,
    /// Running a recognition backend.
    Recognition,
    /// Markup normalization.
    Normalization,
    /// Markup to symbolic translation.
    Translation,
    /// Expression analysis.
    Analysis,
    /// Plain-language rendering.
    Rendering,
    /// Pipeline orchestration.
    PipelineExecution,
    /// Executing a recognition adapter.
    AdapterExecution,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Preprocess => write!(f, "preprocess"),
            ProcessingStage::Recognition => write!(f, "recognition"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Translation => write!(f, "translation"),
            ProcessingStage::Analysis => write!(f, "analysis"),
            ProcessingStage::Rendering => write!(f, "rendering"),
            ProcessingStage::PipelineExecution => write!(f, "pipeline execution"),
            ProcessingStage::AdapterExecution => write!(f, "adapter execution"),
        }
    }
}

/// Errors that abort processing of a single image.
#[derive(Error, Debug)]
pub enum MathError {
    /// Error occurred while loading or decoding an image.
    #[error("image load: {0}")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        kind: ProcessingStage,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred during inference.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        model_name: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("configuration: {message}")]
    ConfigError { message: String },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from ndarray shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading a model file, with context and suggestions.
    #[error("model load failed for '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        model_path: String,
        reason: String,
        /// Prefixed with '; ' when present.
        suggestion: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl From<image::ImageError> for MathError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for MathError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl MathError {
    /// Creates a configuration error with context and details.
    ///
    /// ```rust,no_run
    /// # use mathscrap::core::errors::MathError;
    /// let err = MathError::config_error_detailed(
    ///     "backend selection",
    ///     "no recognition tier is enabled",
    /// );
    /// assert!(matches!(err, MathError::ConfigError { .. }));
    /// ```
    pub fn config_error_detailed(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Creates a configuration error for missing required fields.
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!(
                "missing required field '{}' in {}",
                field.into(),
                context.into()
            ),
        }
    }

    /// Creates a configuration error for invalid field values.
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Wraps an error that occurred while executing a recognition adapter.
    pub fn adapter_execution_error(
        adapter: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::AdapterExecution,
            context: format!("{}: {}", adapter.into(), context.into()),
            source: Box::new(source),
        }
    }

    /// Wraps a failure in a pipeline stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a model load error with an optional suggestion.
    pub fn model_load(
        model_path: impl AsRef<std::path::Path>,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ModelLoad {
            model_path: model_path.as_ref().display().to_string(),
            reason: reason.into(),
            suggestion: suggestion.map(|s| format!("; {s}")).unwrap_or_default(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(ProcessingStage::Preprocess.to_string(), "preprocess");
        assert_eq!(
            ProcessingStage::PipelineExecution.to_string(),
            "pipeline execution"
        );
    }

    #[test]
    fn test_helper_messages() {
        let err = MathError::invalid_field("recognition_timeout_ms", "> 0", "0");
        assert_eq!(
            err.to_string(),
            "configuration: invalid value for field 'recognition_timeout_ms': expected > 0, got 0"
        );
        let err = MathError::model_load("m.onnx", "file not found", Some("download it"), None);
        assert_eq!(
            err.to_string(),
            "model load failed for 'm.onnx': file not found; download it"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: MathError = crate::core::config::ConfigError::invalid("bad").into();
        assert!(matches!(err, MathError::ConfigError { .. }));
    }
}
