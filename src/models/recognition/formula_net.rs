//! Formula recognition model (image to markup token ids).
//!
//! Pure model wrapper: preprocessing, ONNX inference and special-token
//! filtering. Decoding ids into markup is the adapter's job.

use crate::core::config::OrtSessionConfig;
use crate::core::errors::MathError;
use crate::core::inference::load_session;
use crate::processors::NormalizeImage;
use image::{GrayImage, Luma, imageops};
use ndarray::{Array2, Array4, ArrayBase, Axis, Data, Ix2};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

const MODEL_NAME: &str = "FormulaNet";

/// Preprocessing configuration for the formula model.
#[derive(Debug, Clone)]
pub struct FormulaNetPreprocessConfig {
    /// Target size (width, height)
    pub target_size: (u32, u32),
    /// Pixels darker than this count as ink when cropping margins
    pub crop_threshold: u8,
    pub normalize_mean: f32,
    pub normalize_std: f32,
    pub channels: usize,
}

impl Default for FormulaNetPreprocessConfig {
    fn default() -> Self {
        Self {
            target_size: (672, 192),
            crop_threshold: 200,
            normalize_mean: 0.7931,
            normalize_std: 0.1738,
            channels: 3,
        }
    }
}

/// Special token ids.
#[derive(Debug, Clone)]
pub struct FormulaNetPostprocessConfig {
    pub sos_token_id: i64,
    pub pad_token_id: i64,
    pub eos_token_id: i64,
}

impl Default for FormulaNetPostprocessConfig {
    fn default() -> Self {
        Self {
            sos_token_id: 0,
            pad_token_id: 1,
            eos_token_id: 2,
        }
    }
}

/// Formula recognition model.
#[derive(Debug)]
pub struct FormulaNetModel {
    session: Mutex<Session>,
    normalizer: NormalizeImage,
    preprocess_config: FormulaNetPreprocessConfig,
}

impl FormulaNetModel {
    pub fn new(
        session: Session,
        preprocess_config: FormulaNetPreprocessConfig,
    ) -> Result<Self, MathError> {
        let normalizer = NormalizeImage::new(
            1.0 / 255.0,
            preprocess_config.normalize_mean,
            preprocess_config.normalize_std,
            preprocess_config.channels,
        )?;
        Ok(Self {
            session: Mutex::new(session),
            normalizer,
            preprocess_config,
        })
    }

    /// Crop margins, fit into the target size and normalize.
    pub fn preprocess(&self, image: &GrayImage) -> Array4<f32> {
        let cropped = crop_margins(image, self.preprocess_config.crop_threshold);
        let fitted = fit_into(&cropped, self.preprocess_config.target_size);
        self.normalizer.normalize(&fitted)
    }

    /// Runs inference and returns raw token ids `[batch, max_length]`.
    pub fn infer(&self, tensor: &Array4<f32>) -> Result<Array2<i64>, MathError> {
        let inference_error = |context: String, source: Box<dyn std::error::Error + Send + Sync>| {
            MathError::Inference {
                model_name: MODEL_NAME.to_string(),
                context,
                source,
            }
        };
        let mut session = self.session.lock().map_err(|_| {
            inference_error("session lock poisoned".to_string(), "poisoned".into())
        })?;
        let input = TensorRef::from_array_view(tensor.view())?;
        let outputs = session.run(ort::inputs![input]).map_err(|e| {
            inference_error(
                format!("failed to run inference on input with shape {:?}", tensor.shape()),
                Box::new(e),
            )
        })?;
        let ids = outputs[0].try_extract_array::<i64>()?;
        Ok(ids.to_owned().into_dimensionality::<Ix2>()?)
    }

    /// Preprocess and infer one image.
    pub fn forward(&self, image: &GrayImage) -> Result<Array2<i64>, MathError> {
        let tensor = self.preprocess(image);
        self.infer(&tensor)
    }

    /// Drop SOS and pad tokens and stop at EOS, per batch row.
    pub fn filter_tokens<D>(
        token_ids: &ArrayBase<D, Ix2>,
        config: &FormulaNetPostprocessConfig,
    ) -> Vec<Vec<u32>>
    where
        D: Data<Elem = i64>,
    {
        token_ids
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .copied()
                    .take_while(|&id| id != config.eos_token_id)
                    .filter(|&id| id >= 0 && id != config.sos_token_id && id != config.pad_token_id)
                    .map(|id| id as u32)
                    .collect()
            })
            .collect()
    }
}

/// Bounding box of ink pixels, or the whole image when there is none.
fn crop_margins(image: &GrayImage, threshold: u8) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] < threshold {
            let (x0, y0, x1, y1) = bounds.unwrap_or((x, y, x, y));
            bounds = Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y)));
        }
    }
    match bounds {
        Some((x0, y0, x1, y1)) => {
            imageops::crop_imm(image, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
        }
        None if w > 0 && h > 0 => image.clone(),
        None => GrayImage::from_pixel(1, 1, Luma([255])),
    }
}

/// Aspect-preserving resize into `(width, height)`, padded with white at the
/// right and bottom.
fn fit_into(image: &GrayImage, (target_w, target_h): (u32, u32)) -> GrayImage {
    let (w, h) = image.dimensions();
    let scale = (target_w as f32 / w as f32).min(target_h as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, target_w);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, target_h);
    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
    let mut canvas = GrayImage::from_pixel(target_w, target_h, Luma([255]));
    imageops::replace(&mut canvas, &resized, 0, 0);
    canvas
}

/// Builder for the formula model.
#[derive(Debug, Default)]
pub struct FormulaNetModelBuilder {
    preprocess_config: Option<FormulaNetPreprocessConfig>,
    ort_config: Option<OrtSessionConfig>,
}

impl FormulaNetModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preprocess_config(mut self, config: FormulaNetPreprocessConfig) -> Self {
        self.preprocess_config = Some(config);
        self
    }

    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        let mut config = self.preprocess_config.unwrap_or_default();
        config.target_size = (width, height);
        self.preprocess_config = Some(config);
        self
    }

    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build(self, model_path: &Path) -> Result<FormulaNetModel, MathError> {
        let session = load_session(model_path, &self.ort_config.unwrap_or_default())?;
        FormulaNetModel::new(session, self.preprocess_config.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_filter_tokens() {
        let ids = array![[0, 15, 1, 27, 2, 33], [0, 2, 9, 9, 9, 9]];
        let filtered =
            FormulaNetModel::filter_tokens(&ids, &FormulaNetPostprocessConfig::default());
        assert_eq!(filtered, vec![vec![15, 27], vec![]]);
    }

    #[test]
    fn test_crop_margins_finds_ink() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([255]));
        img.put_pixel(3, 4, Luma([0]));
        img.put_pixel(6, 5, Luma([10]));
        let cropped = crop_margins(&img, 200);
        assert_eq!(cropped.dimensions(), (4, 2));

        let blank = GrayImage::from_pixel(5, 5, Luma([255]));
        assert_eq!(crop_margins(&blank, 200).dimensions(), (5, 5));
    }

    #[test]
    fn test_fit_into_preserves_aspect() {
        let img = GrayImage::from_pixel(100, 100, Luma([0]));
        let fitted = fit_into(&img, (672, 192));
        assert_eq!(fitted.dimensions(), (672, 192));
        assert_eq!(fitted.get_pixel(100, 100)[0], 0);
        assert_eq!(fitted.get_pixel(300, 100)[0], 255);
    }
}
