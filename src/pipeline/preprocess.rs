//! Geometric and contrast normalization before recognition.

use crate::core::config::{ConfigError, ConfigValidator, ConfigValidatorExt};
use crate::core::errors::MathError;
use crate::domain::RasterImage;
use image::{DynamicImage, GrayImage, Luma, imageops};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::geometry::min_area_rect;
use imageproc::morphology::close;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fewer ink pixels than this and skew estimation is skipped.
const MIN_SKEW_POINTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Return the input untouched.
    pub skip: bool,
    /// Images with a side shorter than this are upscaled.
    pub min_side: u32,
    pub upscale_factor: f32,
    /// Upper bound on the upscale factor, however thin the image.
    pub max_upscale_factor: f32,
    /// Upscaling never produces more pixels than this.
    pub max_pixels: u64,
    /// Skew (degrees) below which no rotation is applied.
    pub deskew_threshold_deg: f32,
    pub median_radius: u32,
    pub threshold_sigma: f32,
    /// Pixel is ink when darker than its blurred neighbourhood by more than this.
    pub threshold_offset: i16,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            skip: false,
            min_side: 64,
            upscale_factor: 2.0,
            max_upscale_factor: 8.0,
            max_pixels: 16_000_000,
            deskew_threshold_deg: 0.5,
            median_radius: 1,
            threshold_sigma: 3.0,
            threshold_offset: 2,
        }
    }
}

impl ConfigValidator for PreprocessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_side == 0 {
            return Err(ConfigError::invalid("min_side must be greater than 0"));
        }
        Self::ensure_positive("upscale_factor", self.upscale_factor as f64)?;
        if self.max_upscale_factor < 1.0 {
            return Err(ConfigError::invalid("max_upscale_factor must be at least 1"));
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::invalid("max_pixels must be greater than 0"));
        }
        Self::ensure_positive("threshold_sigma", self.threshold_sigma as f64)?;
        if self.deskew_threshold_deg < 0.0 {
            return Err(ConfigError::invalid("deskew_threshold_deg must not be negative"));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Produces a binarized, deskewed grayscale copy of an image.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// The input is never modified; empty images are returned as they are.
    pub fn preprocess(&self, image: &RasterImage) -> Result<RasterImage, MathError> {
        if self.config.skip || image.is_empty() {
            return Ok(image.clone());
        }
        let gray = image.pixels().to_luma8();
        let gray = self.upscale(gray);
        let gray = self.deskew(gray);
        let gray = equalize_histogram(&gray);
        let gray = median_filter(&gray, self.config.median_radius, self.config.median_radius);
        let binary = self.binarize(&gray);
        let binary = ensure_dark_ink(binary);
        debug!(
            path = %image.path().display(),
            width = binary.width(),
            height = binary.height(),
            "image preprocessed"
        );
        Ok(image.derive(DynamicImage::ImageLuma8(binary)))
    }

    fn upscale(&self, gray: GrayImage) -> GrayImage {
        let (w, h) = gray.dimensions();
        let min_side = self.config.min_side;
        if w >= min_side && h >= min_side {
            return gray;
        }
        let mut factor = (min_side as f32 / h as f32)
            .max(min_side as f32 / w as f32)
            .max(self.config.upscale_factor)
            .min(self.config.max_upscale_factor) as f64;
        let (mut new_w, mut new_h) = scaled(w, h, factor, f64::round);
        let max_pixels = self.config.max_pixels;
        if u64::from(new_w) * u64::from(new_h) > max_pixels {
            factor = (max_pixels as f64 / (u64::from(w) * u64::from(h)) as f64).sqrt();
            (new_w, new_h) = scaled(w, h, factor, f64::floor);
        }
        if factor <= 1.0 || new_w == 0 || new_h == 0 {
            return gray;
        }
        debug!(width = new_w, height = new_h, "upscaling");
        imageops::resize(&gray, new_w, new_h, imageops::FilterType::CatmullRom)
    }

    fn deskew(&self, gray: GrayImage) -> GrayImage {
        match estimate_skew(&gray) {
            Some(angle) if angle.abs() > self.config.deskew_threshold_deg => {
                debug!(angle, "deskewing");
                rotate_about_center(
                    &gray,
                    -angle.to_radians(),
                    Interpolation::Bicubic,
                    Luma([255]),
                )
            }
            _ => gray,
        }
    }

    /// Gaussian adaptive threshold followed by a morphological close of the
    /// ink mask. Ink is 0, background 255.
    fn binarize(&self, gray: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(gray, self.config.threshold_sigma);
        let offset = self.config.threshold_offset;
        let mut mask = GrayImage::new(gray.width(), gray.height());
        for (x, y, pixel) in gray.enumerate_pixels() {
            let local = blurred.get_pixel(x, y)[0] as i16;
            if (pixel[0] as i16) < local - offset {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let mut mask = close(&mask, Norm::LInf, 1);
        imageops::invert(&mut mask);
        mask
    }
}

/// Skew of the ink bounding rectangle in degrees, within (-45, 45].
pub fn estimate_skew(gray: &GrayImage) -> Option<f32> {
    let level = otsu_level(gray);
    let points: Vec<Point<i32>> = gray
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < level)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();
    if points.len() < MIN_SKEW_POINTS {
        return None;
    }
    let rect = min_area_rect(&points);
    let dx = (rect[1].x - rect[0].x) as f32;
    let dy = (rect[1].y - rect[0].y) as f32;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    let mut angle = dy.atan2(dx).to_degrees();
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    Some(angle)
}

fn scaled(w: u32, h: u32, factor: f64, round: fn(f64) -> f64) -> (u32, u32) {
    let side = |n: u32| round(f64::from(n) * factor) as u32;
    (side(w), side(h))
}

fn ensure_dark_ink(mut binary: GrayImage) -> GrayImage {
    let pixels = binary.as_raw();
    if pixels.is_empty() {
        return binary;
    }
    let mean = pixels.iter().map(|&p| p as u64).sum::<u64>() / pixels.len() as u64;
    if mean < 127 {
        imageops::invert(&mut binary);
    }
    binary
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn raster(img: GrayImage) -> RasterImage {
        RasterImage::from_image("/tmp/test.png", DynamicImage::ImageLuma8(img))
    }

    fn page_with_bar() -> GrayImage {
        let mut img = GrayImage::from_pixel(120, 80, Luma([240]));
        draw_filled_rect_mut(&mut img, Rect::at(20, 35).of_size(80, 10), Luma([20]));
        img
    }

    #[test]
    fn test_output_is_binary_and_input_untouched() {
        let input = raster(page_with_bar());
        let output = ImagePreprocessor::default().preprocess(&input).unwrap();
        let gray = output.pixels().to_luma8();
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(gray.pixels().any(|p| p[0] == 0));
        assert_eq!(input.pixels().to_luma8().get_pixel(0, 0)[0], 240);
    }

    #[test]
    fn test_small_images_are_upscaled() {
        let input = raster(GrayImage::from_pixel(20, 40, Luma([200])));
        let output = ImagePreprocessor::default().preprocess(&input).unwrap();
        assert_eq!(output.dimensions(), (64, 128));
    }

    #[test]
    fn test_thin_strip_upscale_is_bounded() {
        let input = raster(GrayImage::from_pixel(1, 4000, Luma([200])));
        let output = ImagePreprocessor::default().preprocess(&input).unwrap();
        assert_eq!(output.dimensions(), (8, 32000));

        let capped = ImagePreprocessor::new(PreprocessConfig {
            max_pixels: 1000,
            ..PreprocessConfig::default()
        });
        let input = raster(GrayImage::from_pixel(10, 50, Luma([200])));
        let (w, h) = capped.preprocess(&input).unwrap().dimensions();
        assert!(u64::from(w) * u64::from(h) <= 1000, "{w}x{h}");
        assert!(w > 10 && h > 50);
    }

    #[test]
    fn test_empty_and_skipped_images_pass_through() {
        let empty = raster(GrayImage::new(0, 0));
        let output = ImagePreprocessor::default().preprocess(&empty).unwrap();
        assert!(output.is_empty());

        let skip = ImagePreprocessor::new(PreprocessConfig {
            skip: true,
            ..PreprocessConfig::default()
        });
        let input = raster(page_with_bar());
        let output = skip.preprocess(&input).unwrap();
        assert_eq!(output.pixels().to_luma8().get_pixel(0, 0)[0], 240);
    }

    #[test]
    fn test_dark_background_is_inverted() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        img.put_pixel(0, 0, Luma([255]));
        let fixed = ensure_dark_ink(img);
        assert_eq!(fixed.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn test_axis_aligned_ink_has_no_skew() {
        let angle = estimate_skew(&page_with_bar()).unwrap();
        assert!(angle.abs() < 0.5, "angle = {angle}");
        assert_eq!(estimate_skew(&GrayImage::from_pixel(8, 8, Luma([255]))), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(PreprocessConfig::default().validate().is_ok());
        let bad = PreprocessConfig {
            upscale_factor: 0.0,
            ..PreprocessConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
