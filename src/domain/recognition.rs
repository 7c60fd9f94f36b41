//! Recognition data model shared by the backends, the cascade and the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Backend that produced a recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// ONNX formula recognizer (image to markup).
    FormulaNet,
    /// Mathpix text API.
    Mathpix,
    /// ONNX CTC text-line recognizer.
    TextLine,
    /// Tesseract command line.
    Tesseract,
    /// Deterministic filename lookup.
    RuleFallback,
}

impl SourceTag {
    /// Neural tiers in priority order, most math-specialized first.
    pub const TIERS: [SourceTag; 4] = [
        SourceTag::FormulaNet,
        SourceTag::Mathpix,
        SourceTag::TextLine,
        SourceTag::Tesseract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::FormulaNet => "formula_net",
            SourceTag::Mathpix => "mathpix",
            SourceTag::TextLine => "text_line",
            SourceTag::Tesseract => "tesseract",
            SourceTag::RuleFallback => "rule_fallback",
        }
    }

    /// Fixed confidence of a tier. The rule fallback carries its own.
    pub fn tier_confidence(&self) -> f32 {
        match self {
            SourceTag::FormulaNet => 0.90,
            SourceTag::Mathpix => 0.85,
            SourceTag::TextLine => 0.75,
            SourceTag::Tesseract => 0.70,
            SourceTag::RuleFallback => 0.70,
        }
    }

    /// Position in [`SourceTag::TIERS`], `None` for the rule fallback.
    pub fn tier_index(&self) -> Option<usize> {
        Self::TIERS.iter().position(|t| t == self)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SourceTag::FormulaNet,
            SourceTag::Mathpix,
            SourceTag::TextLine,
            SourceTag::Tesseract,
            SourceTag::RuleFallback,
        ]
        .into_iter()
        .find(|tag| tag.as_str() == s)
        .ok_or_else(|| format!("unknown recognition source '{s}'"))
    }
}

/// Markup returned by one backend call, before confidence is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecognition {
    pub markup: String,
    /// Plain-language text when the backend provides its own.
    pub text: Option<String>,
}

impl RawRecognition {
    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            text: None,
        }
    }
}

/// Outcome of the recognition cascade for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub markup: String,
    confidence: f32,
    pub source: SourceTag,
    pub readable_text: String,
}

impl RecognitionResult {
    /// Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn new(
        markup: impl Into<String>,
        confidence: f32,
        source: SourceTag,
        readable_text: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            markup: markup.into(),
            confidence,
            source,
            readable_text: readable_text.into(),
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Replace markup and text after garble simplification; confidence is
    /// forced to `confidence`.
    pub fn simplified(self, markup: String, confidence: f32, readable_text: String) -> Self {
        Self::new(markup, confidence, self.source, readable_text)
    }
}

/// Why a backend tier did not produce a result. Every kind triggers fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendFailure {
    /// Runtime, credentials or binary missing.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("model weights missing: {0}")]
    MissingWeights(String),
    #[error("backend runtime error: {0}")]
    Runtime(String),
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
    #[error("recognition timed out after {0} ms")]
    TimedOut(u64),
    /// The blocking task panicked or was cancelled.
    #[error("recognition task failed: {0}")]
    Join(String),
}

impl BackendFailure {
    /// Short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendFailure::Unavailable(_) => "unavailable",
            BackendFailure::MissingWeights(_) => "missing_weights",
            BackendFailure::Runtime(_) => "runtime",
            BackendFailure::MalformedOutput(_) => "malformed_output",
            BackendFailure::TimedOut(_) => "timed_out",
            BackendFailure::Join(_) => "join",
        }
    }
}

impl From<crate::core::errors::MathError> for BackendFailure {
    fn from(error: crate::core::errors::MathError) -> Self {
        use crate::core::errors::MathError;
        match error {
            MathError::ModelLoad { .. } => BackendFailure::MissingWeights(error.to_string()),
            MathError::ConfigError { .. } => BackendFailure::Unavailable(error.to_string()),
            other => BackendFailure::Runtime(other.to_string()),
        }
    }
}
