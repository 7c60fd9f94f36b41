//! CTC text-line recognition model.

use crate::core::config::OrtSessionConfig;
use crate::core::errors::MathError;
use crate::core::inference::load_session;
use crate::processors::NormalizeImage;
use image::{GrayImage, imageops};
use ndarray::{Array4, ArrayView2, Axis, Ix3};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

const MODEL_NAME: &str = "CtcText";

/// Input geometry of the line recognizer.
#[derive(Debug, Clone)]
pub struct CtcTextPreprocessConfig {
    pub input_height: u32,
    pub max_width: u32,
}

impl Default for CtcTextPreprocessConfig {
    fn default() -> Self {
        Self {
            input_height: 48,
            max_width: 3200,
        }
    }
}

/// Line recognizer with a character dictionary. Class 0 is the CTC blank.
#[derive(Debug)]
pub struct CtcTextModel {
    session: Mutex<Session>,
    dictionary: Vec<String>,
    normalizer: NormalizeImage,
    config: CtcTextPreprocessConfig,
}

impl CtcTextModel {
    pub fn new(
        session: Session,
        dictionary: Vec<String>,
        config: CtcTextPreprocessConfig,
    ) -> Result<Self, MathError> {
        if dictionary.is_empty() {
            return Err(MathError::InvalidInput {
                message: "text recognition dictionary is empty".to_string(),
            });
        }
        Ok(Self {
            session: Mutex::new(session),
            dictionary,
            normalizer: NormalizeImage::for_text_recognition()?,
            config,
        })
    }

    /// Resize to the input height keeping aspect ratio, then normalize.
    pub fn preprocess(&self, image: &GrayImage) -> Array4<f32> {
        let (w, h) = image.dimensions();
        let target_h = self.config.input_height;
        let target_w = ((w as f32 * target_h as f32 / h.max(1) as f32).ceil() as u32)
            .clamp(target_h, self.config.max_width);
        let resized = imageops::resize(image, target_w, target_h, imageops::FilterType::Triangle);
        self.normalizer.normalize(&resized)
    }

    /// Class probabilities `[time, classes]` for one line.
    fn infer(&self, tensor: &Array4<f32>) -> Result<ndarray::Array2<f32>, MathError> {
        let mut session = self.session.lock().map_err(|_| MathError::Inference {
            model_name: MODEL_NAME.to_string(),
            context: "session lock poisoned".to_string(),
            source: "poisoned".into(),
        })?;
        let input = TensorRef::from_array_view(tensor.view())?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MathError::Inference {
                model_name: MODEL_NAME.to_string(),
                context: format!("failed to run inference on input with shape {:?}", tensor.shape()),
                source: Box::new(e),
            })?;
        let probs = outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?;
        Ok(probs.index_axis(Axis(0), 0).to_owned())
    }

    pub fn recognize(&self, image: &GrayImage) -> Result<String, MathError> {
        let tensor = self.preprocess(image);
        let probs = self.infer(&tensor)?;
        Ok(greedy_decode(probs.view(), &self.dictionary))
    }
}

/// Best class per step, repeats collapsed, blanks dropped.
pub fn greedy_decode(probs: ArrayView2<'_, f32>, dictionary: &[String]) -> String {
    let mut text = String::new();
    let mut previous = 0usize;
    for step in probs.axis_iter(Axis(0)) {
        let best = step
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if best != 0
            && best != previous
            && let Some(symbol) = dictionary.get(best - 1)
        {
            text.push_str(symbol);
        }
        previous = best;
    }
    text
}

/// One symbol per line; a trailing space entry is appended as in the
/// recognizer's training setup.
pub fn load_dictionary(path: &Path) -> Result<Vec<String>, MathError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        MathError::model_load(path, "failed to read dictionary", None, Some(Box::new(e)))
    })?;
    let mut dictionary: Vec<String> = text
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .filter(|line| !line.is_empty())
        .collect();
    dictionary.push(" ".to_string());
    Ok(dictionary)
}

/// Builder for the CTC text model.
#[derive(Debug, Default)]
pub struct CtcTextModelBuilder {
    config: Option<CtcTextPreprocessConfig>,
    ort_config: Option<OrtSessionConfig>,
}

impl CtcTextModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_height(mut self, height: u32) -> Self {
        let mut config = self.config.unwrap_or_default();
        config.input_height = height;
        self.config = Some(config);
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build(self, model_path: &Path, dict_path: &Path) -> Result<CtcTextModel, MathError> {
        let dictionary = load_dictionary(dict_path)?;
        let session = load_session(model_path, &self.ort_config.unwrap_or_default())?;
        CtcTextModel::new(session, dictionary, self.config.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dict() -> Vec<String> {
        ["x", "2", "+"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_greedy_decode_collapses_and_skips_blank() {
        // classes: blank, x, 2, +
        let probs = array![
            [0.1, 0.8, 0.05, 0.05],
            [0.1, 0.8, 0.05, 0.05],
            [0.9, 0.05, 0.03, 0.02],
            [0.1, 0.7, 0.1, 0.1],
            [0.1, 0.1, 0.1, 0.7],
            [0.1, 0.1, 0.7, 0.1],
        ];
        assert_eq!(greedy_decode(probs.view(), &dict()), "xx+2");
    }

    #[test]
    fn test_greedy_decode_ignores_out_of_range_class() {
        let probs = array![[0.0, 0.0, 0.0, 0.0, 1.0]];
        assert_eq!(greedy_decode(probs.view(), &dict()), "");
    }

    #[test]
    fn test_load_dictionary_appends_space() {
        let path = std::env::temp_dir().join(format!("{}-dict.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "a\nb\r\n\n").unwrap();
        let dictionary = load_dictionary(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(dictionary, vec!["a", "b", " "]);
    }
}
