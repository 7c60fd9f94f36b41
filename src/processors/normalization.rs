//! Grayscale image to model-input tensor normalization.

use crate::core::errors::MathError;
use image::GrayImage;
use ndarray::Array4;

/// Maps pixel values to `value * alpha + beta` and lays them out as
/// `[1, channels, height, width]`, replicating the gray channel.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeImage {
    /// scale / std
    pub alpha: f32,
    /// -mean / std
    pub beta: f32,
    pub channels: usize,
}

impl NormalizeImage {
    /// # Errors
    ///
    /// Returns an error if scale or std is not positive, or channels is 0.
    pub fn new(scale: f32, mean: f32, std: f32, channels: usize) -> Result<Self, MathError> {
        if scale <= 0.0 {
            return Err(MathError::invalid_field("scale", "> 0", scale.to_string()));
        }
        if std <= 0.0 {
            return Err(MathError::invalid_field("std", "> 0", std.to_string()));
        }
        if channels == 0 {
            return Err(MathError::invalid_field("channels", ">= 1", "0"));
        }
        Ok(Self {
            alpha: scale / std,
            beta: -mean / std,
            channels,
        })
    }

    /// Formula recognizer statistics (mean 0.7931, std 0.1738 on [0, 1]).
    pub fn for_formula_recognition() -> Result<Self, MathError> {
        Self::new(1.0 / 255.0, 0.7931, 0.1738, 3)
    }

    /// Text-line recognizer input in [-1, 1].
    pub fn for_text_recognition() -> Result<Self, MathError> {
        Self::new(2.0 / 255.0, 1.0, 1.0, 3)
    }

    pub fn normalize(&self, image: &GrayImage) -> Array4<f32> {
        let (w, h) = image.dimensions();
        Array4::from_shape_fn(
            (1, self.channels, h as usize, w as usize),
            |(_, _, y, x)| image.get_pixel(x as u32, y as u32)[0] as f32 * self.alpha + self.beta,
        )
    }
}
