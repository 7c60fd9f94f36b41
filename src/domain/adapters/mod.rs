//! Recognition backends.
//!
//! Each neural tier is one variant of [`Backend`]; the rule fallback sits
//! outside the enum because it cannot fail.

pub mod formula_net_adapter;
pub mod mathpix_adapter;
pub mod rule_fallback;
pub mod tesseract_adapter;
pub mod text_line_adapter;

pub use formula_net_adapter::{FormulaNetAdapter, FormulaNetAdapterBuilder};
pub use mathpix_adapter::MathpixAdapter;
pub use rule_fallback::RuleFallback;
pub use tesseract_adapter::TesseractAdapter;
pub use text_line_adapter::TextLineAdapter;

use crate::core::traits::Recognizer;
use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use std::sync::Arc;

/// A loaded recognition tier.
#[derive(Debug)]
pub enum Backend {
    FormulaNet(Box<FormulaNetAdapter>),
    Mathpix(MathpixAdapter),
    TextLine(Box<TextLineAdapter>),
    Tesseract(TesseractAdapter),
    /// Caller-supplied recognizer occupying a tier.
    External(Arc<dyn Recognizer>),
}

impl Recognizer for Backend {
    fn tag(&self) -> SourceTag {
        match self {
            Backend::FormulaNet(adapter) => adapter.tag(),
            Backend::Mathpix(adapter) => adapter.tag(),
            Backend::TextLine(adapter) => adapter.tag(),
            Backend::Tesseract(adapter) => adapter.tag(),
            Backend::External(recognizer) => recognizer.tag(),
        }
    }

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
        match self {
            Backend::FormulaNet(adapter) => adapter.recognize(image),
            Backend::Mathpix(adapter) => adapter.recognize(image),
            Backend::TextLine(adapter) => adapter.recognize(image),
            Backend::Tesseract(adapter) => adapter.recognize(image),
            Backend::External(recognizer) => recognizer.recognize(image),
        }
    }
}
