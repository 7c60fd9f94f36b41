//! Command-line and environment options mapped onto [`PipelineConfig`].

use clap::Args;
use mathscrap::core::config::ConfigError;
use mathscrap::pipeline::{BackendConfig, PipelineConfig};
use std::path::PathBuf;

/// Backend and pipeline options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// JSON pipeline configuration; flags below override it
    #[arg(long, env = "MATHSCRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the ONNX formula recognition model
    #[arg(long = "formula-model", env = "MATHSCRAP_FORMULA_MODEL")]
    pub formula_model: Option<PathBuf>,

    /// Path to the formula model's tokenizer.json
    #[arg(long = "formula-tokenizer", env = "MATHSCRAP_FORMULA_TOKENIZER")]
    pub formula_tokenizer: Option<PathBuf>,

    /// Path to the ONNX text-line recognition model
    #[arg(long = "text-model", env = "MATHSCRAP_TEXT_MODEL")]
    pub text_model: Option<PathBuf>,

    /// Path to the text-line character dictionary
    #[arg(long = "text-dict", env = "MATHSCRAP_TEXT_DICT")]
    pub text_dict: Option<PathBuf>,

    /// ONNX Runtime shared library
    #[arg(long = "ort-dylib", env = "ORT_DYLIB_PATH")]
    pub ort_dylib: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, env = "MATHSCRAP_TESSERACT")]
    pub tesseract: Option<PathBuf>,

    /// Per-call recognition timeout in milliseconds
    #[arg(long = "timeout-ms", env = "MATHSCRAP_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Skip every recognition backend and use the rule fallback
    #[arg(long = "rule-fallback-only", env = "MATHSCRAP_RULE_FALLBACK_ONLY")]
    pub rule_fallback_only: bool,
}

impl PipelineArgs {
    /// Start from the JSON file (or defaults), then apply flags.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        let backends = &mut config.backends;
        override_path(&mut backends.formula_model, &self.formula_model);
        override_path(&mut backends.formula_tokenizer, &self.formula_tokenizer);
        override_path(&mut backends.text_model, &self.text_model);
        override_path(&mut backends.text_dict, &self.text_dict);
        override_path(&mut backends.ort_dylib, &self.ort_dylib);
        if let Some(binary) = &self.tesseract {
            backends.tesseract_binary = binary.clone();
        }
        if self.rule_fallback_only {
            backends.enabled = BackendConfig::rule_fallback_only().enabled;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.recognition_timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

fn override_path(target: &mut Option<PathBuf>, value: &Option<PathBuf>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
