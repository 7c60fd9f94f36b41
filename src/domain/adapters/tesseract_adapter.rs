//! Tesseract command-line adapter.

use crate::core::constants::TESSERACT_WHITELIST;
use crate::core::traits::Recognizer;
use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use crate::processors::TextMarkupPostProcessor;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug)]
pub struct TesseractAdapter {
    binary: PathBuf,
    postprocessor: TextMarkupPostProcessor,
}

impl TesseractAdapter {
    /// Probe `binary --version`; a missing or failing binary is unavailable.
    pub fn probe(
        binary: impl Into<PathBuf>,
        postprocessor: TextMarkupPostProcessor,
    ) -> Result<Self, BackendFailure> {
        let binary = binary.into();
        let output = Command::new(&binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                BackendFailure::Unavailable(format!("{}: {e}", binary.display()))
            })?;
        if !output.status.success() {
            return Err(BackendFailure::Unavailable(format!(
                "{} --version exited with {}",
                binary.display(),
                output.status
            )));
        }
        Ok(Self {
            binary,
            postprocessor,
        })
    }

    fn run(&self, png: &Path) -> Result<String, BackendFailure> {
        let output = Command::new(&self.binary)
            .arg(png)
            .arg("stdout")
            .args(["--oem", "3", "--psm", "6", "-c"])
            .arg(format!("tessedit_char_whitelist={TESSERACT_WHITELIST}"))
            .output()
            .map_err(|e| BackendFailure::Runtime(format!("tesseract: {e}")))?;
        if !output.status.success() {
            return Err(BackendFailure::Runtime(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Recognizer for TesseractAdapter {
    fn tag(&self) -> SourceTag {
        SourceTag::Tesseract
    }

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
        let png = std::env::temp_dir().join(format!("mathscrap-{}.png", uuid::Uuid::new_v4()));
        image
            .pixels()
            .save(&png)
            .map_err(|e| BackendFailure::Runtime(format!("temporary PNG: {e}")))?;
        let text = self.run(&png);
        std::fs::remove_file(&png).ok();

        let text = text?;
        debug!(text = %text.trim(), "tesseract output");
        let markup = self.postprocessor.process(&text);
        if markup.is_empty() {
            return Err(BackendFailure::MalformedOutput(
                "tesseract returned no text".to_string(),
            ));
        }
        Ok(RawRecognition::markup(markup))
    }
}
