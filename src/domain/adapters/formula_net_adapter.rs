//! Formula recognition adapter: ONNX formula model plus tokenizer decoding.

use crate::core::config::OrtSessionConfig;
use crate::core::errors::MathError;
use crate::core::traits::Recognizer;
use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use crate::models::recognition::{
    FormulaNetModel, FormulaNetModelBuilder, FormulaNetPostprocessConfig,
};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

/// Formula recognition adapter.
#[derive(Debug)]
pub struct FormulaNetAdapter {
    model: FormulaNetModel,
    tokenizer: Tokenizer,
    postprocess: FormulaNetPostprocessConfig,
    max_length: usize,
}

impl FormulaNetAdapter {
    fn decode(&self, tokens: &[u32]) -> Result<String, BackendFailure> {
        let tokens = if tokens.len() > self.max_length {
            debug!(
                "Truncating formula tokens from {} to {} (max_length)",
                tokens.len(),
                self.max_length
            );
            &tokens[..self.max_length]
        } else {
            tokens
        };

        let vocab_size = self.tokenizer.get_vocab_size(true) as u32;
        if let Some(&max_id) = tokens.iter().max()
            && max_id >= vocab_size
        {
            warn!(
                max_id,
                vocab_size, "token ids exceed tokenizer vocabulary; model and tokenizer mismatch"
            );
        }

        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| BackendFailure::MalformedOutput(format!("token decode failed: {e}")))?;
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl Recognizer for FormulaNetAdapter {
    fn tag(&self) -> SourceTag {
        SourceTag::FormulaNet
    }

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
        let gray = image.pixels().to_luma8();
        let token_ids = self.model.forward(&gray).map_err(|e| {
            BackendFailure::Runtime(
                MathError::adapter_execution_error("FormulaNetAdapter", "forward", e).to_string(),
            )
        })?;
        let rows = FormulaNetModel::filter_tokens(&token_ids, &self.postprocess);
        let tokens = rows
            .first()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendFailure::MalformedOutput("no tokens decoded".to_string()))?;

        let markup = self.decode(tokens)?;
        debug!(%markup, "formula model output");
        Ok(RawRecognition::markup(markup))
    }
}

/// Builder for [`FormulaNetAdapter`].
#[derive(Debug)]
pub struct FormulaNetAdapterBuilder {
    tokenizer_path: Option<PathBuf>,
    ort_config: OrtSessionConfig,
    max_length: usize,
}

impl Default for FormulaNetAdapterBuilder {
    fn default() -> Self {
        Self {
            tokenizer_path: None,
            ort_config: OrtSessionConfig::default(),
            max_length: 1536,
        }
    }
}

impl FormulaNetAdapterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokenizer_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.tokenizer_path = Some(path.into());
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = config;
        self
    }

    pub fn build(self, model_path: &Path) -> Result<FormulaNetAdapter, MathError> {
        let tokenizer_path = self
            .tokenizer_path
            .ok_or_else(|| MathError::missing_field("formula_tokenizer", "formula backend"))?;
        if !tokenizer_path.is_file() {
            return Err(MathError::model_load(
                &tokenizer_path,
                "tokenizer file not found",
                None,
                None,
            ));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            MathError::model_load(&tokenizer_path, "failed to load tokenizer", None, Some(err))
        })?;
        let model = FormulaNetModelBuilder::new()
            .with_ort_config(self.ort_config)
            .build(model_path)?;

        Ok(FormulaNetAdapter {
            model,
            tokenizer,
            postprocess: FormulaNetPostprocessConfig::default(),
            max_length: self.max_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_tokenizer() {
        let err = FormulaNetAdapterBuilder::new()
            .build(Path::new("/nonexistent/formula.onnx"))
            .unwrap_err();
        assert!(matches!(err, MathError::ConfigError { .. }));

        let err = FormulaNetAdapterBuilder::new()
            .tokenizer_path("/nonexistent/tokenizer.json")
            .build(Path::new("/nonexistent/formula.onnx"))
            .unwrap_err();
        assert!(matches!(err, MathError::ModelLoad { .. }));
    }
}
