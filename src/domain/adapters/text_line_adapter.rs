//! Text-line recognition adapter: CTC model output post-processed into markup.

use crate::core::config::OrtSessionConfig;
use crate::core::errors::MathError;
use crate::core::traits::Recognizer;
use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use crate::models::recognition::{CtcTextModel, CtcTextModelBuilder};
use crate::processors::TextMarkupPostProcessor;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct TextLineAdapter {
    model: CtcTextModel,
    postprocessor: TextMarkupPostProcessor,
}

impl TextLineAdapter {
    pub fn build(
        model_path: &Path,
        dict_path: &Path,
        ort_config: OrtSessionConfig,
        postprocessor: TextMarkupPostProcessor,
    ) -> Result<Self, MathError> {
        let model = CtcTextModelBuilder::new()
            .with_ort_config(ort_config)
            .build(model_path, dict_path)?;
        Ok(Self {
            model,
            postprocessor,
        })
    }
}

impl Recognizer for TextLineAdapter {
    fn tag(&self) -> SourceTag {
        SourceTag::TextLine
    }

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
        let text = self
            .model
            .recognize(&image.pixels().to_luma8())
            .map_err(|e| BackendFailure::Runtime(e.to_string()))?;
        debug!(%text, "text line output");
        let markup = self.postprocessor.process(&text);
        if markup.is_empty() {
            return Err(BackendFailure::MalformedOutput(
                "text line recognizer returned no text".to_string(),
            ));
        }
        Ok(RawRecognition::markup(markup))
    }
}
