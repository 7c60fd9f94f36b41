//! Pipeline configuration.

use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig, load_json_config};
use crate::core::constants::{
    DEFAULT_MATHPIX_ENDPOINT, DEFAULT_RECOGNITION_TIMEOUT_MS, DEFAULT_TESSERACT_BINARY,
};
use crate::domain::SourceTag;
use crate::pipeline::preprocess::PreprocessConfig;
use crate::processors::{GarbleThresholds, ReadableConfig};
use crate::symbolic::TranslatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where each recognition tier finds its runtime, weights and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub formula_model: Option<PathBuf>,
    pub formula_tokenizer: Option<PathBuf>,
    pub text_model: Option<PathBuf>,
    pub text_dict: Option<PathBuf>,
    /// ONNX Runtime shared library; `ORT_DYLIB_PATH` when unset.
    pub ort_dylib: Option<PathBuf>,
    pub mathpix_app_id: Option<String>,
    pub mathpix_app_key: Option<String>,
    pub mathpix_endpoint: String,
    pub tesseract_binary: PathBuf,
    pub ort_session: OrtSessionConfig,
    /// Tiers allowed to load, in any order; priority is fixed.
    pub enabled: Vec<SourceTag>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            formula_model: None,
            formula_tokenizer: None,
            text_model: None,
            text_dict: None,
            ort_dylib: None,
            mathpix_app_id: std::env::var("MATHPIX_APP_ID").ok(),
            mathpix_app_key: std::env::var("MATHPIX_APP_KEY").ok(),
            mathpix_endpoint: DEFAULT_MATHPIX_ENDPOINT.to_string(),
            tesseract_binary: PathBuf::from(DEFAULT_TESSERACT_BINARY),
            ort_session: OrtSessionConfig::default(),
            enabled: SourceTag::TIERS.to_vec(),
        }
    }
}

impl BackendConfig {
    /// Configuration with every neural tier disabled.
    pub fn rule_fallback_only() -> Self {
        Self {
            enabled: Vec::new(),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, tag: SourceTag) -> bool {
        self.enabled.contains(&tag)
    }
}

impl ConfigValidator for BackendConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled.contains(&SourceTag::RuleFallback) {
            return Err(ConfigError::invalid(
                "rule_fallback is always available and cannot be listed in enabled",
            ));
        }
        if self.mathpix_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "mathpix_endpoint".to_string(),
            });
        }
        self.ort_session.validate()
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Configuration of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub backends: BackendConfig,
    pub recognition_timeout_ms: u64,
    pub preprocess: PreprocessConfig,
    pub garble: GarbleThresholds,
    pub translator: TranslatorConfig,
    pub readable: ReadableConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backends: BackendConfig::default(),
            recognition_timeout_ms: DEFAULT_RECOGNITION_TIMEOUT_MS,
            preprocess: PreprocessConfig::default(),
            garble: GarbleThresholds::default(),
            translator: TranslatorConfig::default(),
            readable: ReadableConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_json_config(path)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "recognition_timeout_ms must be greater than 0",
            ));
        }
        self.backends.validate()?;
        self.preprocess.validate()?;
        self.garble.validate()?;
        self.translator.validate()?;
        self.readable.validate()
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
