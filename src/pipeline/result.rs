//! Serializable per-image and per-job outcomes.

use crate::core::constants::NO_SOURCE;
use crate::domain::RecognitionResult;
use crate::symbolic::{AnalysisReport, SolveReport};
use serde::{Deserialize, Serialize};

/// Recognition stage output as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionPayload {
    pub latex: String,
    pub confidence: f32,
    pub text: String,
    pub source: String,
}

impl RecognitionPayload {
    /// Payload for an image that never reached recognition.
    pub fn empty() -> Self {
        Self {
            latex: String::new(),
            confidence: 0.0,
            text: String::new(),
            source: NO_SOURCE.to_string(),
        }
    }
}

impl From<&RecognitionResult> for RecognitionPayload {
    fn from(result: &RecognitionResult) -> Self {
        Self {
            latex: result.markup.clone(),
            confidence: result.confidence(),
            text: result.readable_text.clone(),
            source: result.source.to_string(),
        }
    }
}

/// Validation stage output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sympy_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
    /// Canonical markup that was validated.
    pub original_latex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn failed(original_latex: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            sympy_expression: None,
            simplified: None,
            analysis: None,
            original_latex: original_latex.into(),
            error: Some(error.into()),
        }
    }
}

/// Everything produced for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutcome {
    pub image_path: String,
    pub recognition: RecognitionPayload,
    pub validation: ValidationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolveReport>,
    /// Caller context, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Outcomes of every image in a job, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub images: Vec<ImageOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobReport {
    pub fn new(job_id: impl Into<String>, images: Vec<ImageOutcome>) -> Self {
        let succeeded = images.iter().filter(|o| o.validation.valid).count();
        Self {
            job_id: job_id.into(),
            failed: images.len() - succeeded,
            images,
            succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceTag;

    #[test]
    fn test_optional_fields_are_skipped() {
        let validation = ValidationResult::failed("", "image unreadable");
        let json = serde_json::to_value(&validation).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["error"], "image unreadable");
        assert!(json.get("sympy_expression").is_none());
        assert!(json.get("analysis").is_none());
    }

    #[test]
    fn test_payload_from_recognition() {
        let result = RecognitionResult::new("x", 0.9, SourceTag::FormulaNet, "x");
        let payload = RecognitionPayload::from(&result);
        assert_eq!(payload.source, "formula_net");
        assert!((payload.confidence - 0.9).abs() < 1e-6);
        assert_eq!(RecognitionPayload::empty().source, "none");
    }

    #[test]
    fn test_job_report_counts() {
        let outcome = |valid| ImageOutcome {
            image_path: "a.png".into(),
            recognition: RecognitionPayload::empty(),
            validation: ValidationResult {
                valid,
                ..ValidationResult::failed("", "")
            },
            solution: None,
            context: None,
        };
        let report = JobReport::new("job", vec![outcome(true), outcome(false), outcome(true)]);
        assert_eq!((report.succeeded, report.failed), (2, 1));
    }
}
