//! Markup post-processing for text-oriented recognizers.
//!
//! Line recognizers and Tesseract emit plain text with spaced operators and
//! bare digits after variables. [`TextMarkupPostProcessor`] turns that into
//! markup the normalizer and translator understand. Garbled output passes
//! through unchanged; the pipeline scores and repairs it for every tier.

use crate::processors::markup::MarkupNormalizer;
use crate::processors::rewrite::{RewriteRule, apply_rules};
use once_cell::sync::Lazy;

static TEXT_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new("spaced_star", r" \* ", r" \cdot "),
        RewriteRule::new("spaced_slash", r" / ", r" \div "),
        RewriteRule::new("coefficient", r"(\d)\s+([a-zA-Z])", "$1$2"),
        RewriteRule::new(
            "indexed_variable",
            r"(^|[^\\a-zA-Z])([a-zA-Z])\s*(\d)",
            "$1${2}_{$3}",
        )
        .repeated(),
    ]
});

static WHITESPACE: Lazy<RewriteRule> = Lazy::new(|| RewriteRule::new("whitespace", r"\s+", " "));

/// Converts recognizer text into markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMarkupPostProcessor;

impl TextMarkupPostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }

        let mut markup = text.to_string();
        if markup.contains(r"\begin{array}") {
            let missing = markup
                .matches('{')
                .count()
                .saturating_sub(markup.matches('}').count());
            markup.push_str(&"}".repeat(missing));
        }

        let markup = MarkupNormalizer::clean_malformed(&markup);
        let markup = apply_rules(&TEXT_RULES, &markup);
        let markup = MarkupNormalizer::group_scripts(&markup);
        WHITESPACE.apply(&markup).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(text: &str) -> String {
        TextMarkupPostProcessor::default().process(text)
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(process(""), "");
        assert_eq!(process("  \n "), "");
    }

    #[test]
    fn test_coefficients_join_variables() {
        assert_eq!(process("2 x + 3 = 7"), "2x + 3 = 7");
    }

    #[test]
    fn test_indexed_variables() {
        assert_eq!(process("x 1 + y2"), "x_{1} + y_{2}");
        assert_eq!(process("x1y2"), "x_{1}y_{2}");
        assert_eq!(process(r"\sin2"), r"\sin2");
    }

    #[test]
    fn test_spaced_operators() {
        assert_eq!(process("a * b"), r"a \cdot b");
        assert_eq!(process("a / b"), r"a \div b");
    }

    #[test]
    fn test_scripts_are_grouped() {
        assert_eq!(process("x^2 + 1"), "x^{2} + 1");
        assert_eq!(process("a ++ b"), "a + b");
    }

    #[test]
    fn test_garbled_text_is_left_for_the_pipeline() {
        let text = format!("{}x 2{}", "{".repeat(21), "}".repeat(21));
        let out = process(&text);
        assert!(out.contains("x_{2}"), "{out}");
        assert!(out.matches('{').count() > 20);
    }

    #[test]
    fn test_array_braces_are_padded() {
        let out = process(r"\begin{array}{cc} a & b \end{array");
        assert_eq!(out.matches('{').count(), out.matches('}').count());
    }
}
