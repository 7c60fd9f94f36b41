//! Immutable image handle passed between pipeline stages.

use crate::core::errors::MathError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pixel data plus the path it was read from.
///
/// Cloning shares the pixels. Stages derive new images instead of mutating.
#[derive(Debug, Clone)]
pub struct RasterImage {
    path: PathBuf,
    pixels: Arc<DynamicImage>,
}

impl RasterImage {
    /// Decode the image at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MathError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MathError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("image not found: {}", path.display()),
            )));
        }
        let pixels = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        Ok(Self::from_image(path, pixels))
    }

    pub fn from_image(path: impl Into<PathBuf>, pixels: DynamicImage) -> Self {
        Self {
            path: path.into(),
            pixels: Arc::new(pixels),
        }
    }

    /// New image with the same path and different pixels.
    pub fn derive(&self, pixels: DynamicImage) -> Self {
        Self::from_image(self.path.clone(), pixels)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased file name, used by the rule fallback.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.pixels.width(), self.pixels.height())
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RasterImage::open("/nonexistent/fraction.png").unwrap_err();
        assert!(matches!(err, MathError::Io(_)));
    }

    #[test]
    fn test_garbage_file_is_image_load_error() {
        let path = std::env::temp_dir().join(format!("{}-garbage.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not an image").unwrap();
        let err = RasterImage::open(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, MathError::ImageLoad(_)));
    }

    #[test]
    fn test_derive_keeps_path_and_input() {
        let original = RasterImage::from_image(
            "/tmp/Quadratic.PNG",
            DynamicImage::ImageLuma8(GrayImage::new(4, 3)),
        );
        let derived = original.derive(DynamicImage::ImageLuma8(GrayImage::new(8, 6)));
        assert_eq!(original.dimensions(), (4, 3));
        assert_eq!(derived.dimensions(), (8, 6));
        assert_eq!(derived.file_name(), "quadratic.png");
    }
}
