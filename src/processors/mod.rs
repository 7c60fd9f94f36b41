//! String and tensor processors applied around recognition.
//!
//! Markup processors are pure functions over `&str` built from ordered,
//! named [`RewriteRule`] lists.

pub mod garble;
pub mod markup;
pub mod normalization;
pub mod readable;
pub mod rewrite;
pub mod text_markup;

pub use garble::{GarbleDetector, GarbleReport, GarbleThresholds, Indicator, simplify_garbled};
pub use markup::{MarkupNormalizer, delimiters_balanced, normalize_markup};
pub use normalization::NormalizeImage;
pub use readable::{
    COMPLEX_EXPRESSION, EMPTY_EXPRESSION, GENERIC_EXPRESSION, ReadableConfig, ReadableRenderer,
    render_readable,
};
pub use rewrite::{RewriteRule, apply_rules};
pub use text_markup::TextMarkupPostProcessor;
