//! Plain-language rendering of canonical markup.
//!
//! Independent of symbolic translation: it always produces a sentence, even
//! for markup the translator cannot parse.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::processors::rewrite::{RewriteRule, apply_rules};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Rendering of empty input.
pub const EMPTY_EXPRESSION: &str = "Empty expression";
/// Rendering of text that is too long or too nested to read aloud.
pub const COMPLEX_EXPRESSION: &str = "Complex mathematical expression";
/// Rendering when nothing readable survives cleanup.
pub const GENERIC_EXPRESSION: &str = "Mathematical expression";

/// Braced group allowing one level of nested braces.
const GROUP: &str = r"\{((?:[^{}]|\{[^{}]*\})*)\}";

/// Boundary after a command word, captured so it can be put back.
const END: &str = r"([^a-zA-Z]|$)";

fn word(name: &'static str, pattern: &str, words: &str) -> RewriteRule {
    RewriteRule::new(name, &format!(r"\\(?:{pattern}){END}"), format!("{words}$1")).repeated()
}

static READABLE_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new(
            "fraction",
            &format!(r"\\[dt]?frac{GROUP}{GROUP}"),
            "($1) divided by ($2)",
        )
        .repeated(),
        RewriteRule::new(
            "nth_root",
            &format!(r"\\sqrt\[([^\]]*)\]{GROUP}"),
            "root $1 of ($2)",
        ),
        RewriteRule::new("square_root", &format!(r"\\sqrt{GROUP}"), "square root of ($1)")
            .repeated(),
        RewriteRule::new(
            "bounded_sum",
            r"\\sum_\{([^{}]*)\}\^\{([^{}]*)\}",
            " sum from $1 to $2 of ",
        ),
        RewriteRule::new(
            "bounded_integral",
            r"\\int_\{([^{}]*)\}\^\{([^{}]*)\}",
            " integral from $1 to $2 of ",
        ),
        RewriteRule::new(
            "grouped_power",
            r"([a-zA-Z0-9]+)\^\{([^{}]+)\}",
            "$1 to the power of ($2)",
        ),
        RewriteRule::new("bare_power", r"([a-zA-Z0-9]+)\^([a-zA-Z0-9])", "$1 to the power of $2"),
        RewriteRule::new("other_power", r"\^\{([^{}]*)\}", " to the power of ($1)"),
        RewriteRule::new(
            "grouped_subscript",
            r"([a-zA-Z]+)_\{([^{}]+)\}",
            "$1 subscript ($2)",
        ),
        RewriteRule::new("bare_subscript", r"([a-zA-Z]+)_([a-zA-Z0-9])", "$1 subscript $2"),
        word("sum", "sum", "sum of "),
        word("integral", "int", "integral of "),
        word("limit", "lim", "limit of "),
        word("varepsilon", "varepsilon", "epsilon"),
        RewriteRule::new(
            "greek_letter",
            &format!(
                r"\\(alpha|beta|gamma|delta|epsilon|zeta|eta|theta|iota|kappa|lambda|mu|nu|xi|pi|rho|sigma|tau|upsilon|phi|chi|psi|omega){END}"
            ),
            "$1$2",
        )
        .repeated(),
        word("sine", "sin", "sine of "),
        word("cosine", "cos", "cosine of "),
        word("tangent", "tan", "tangent of "),
        word("logarithm", "log", "logarithm of "),
        word("natural_log", "ln", "natural log of "),
        word("times", "cdot|times", " times "),
        word("divided_by", "div", " divided by "),
        word("plus_or_minus", "pm", " plus or minus "),
        word("minus_or_plus", "mp", " minus or plus "),
        word("less_or_equal", "leq", " less than or equal to "),
        word("greater_or_equal", "geq", " greater than or equal to "),
        word("not_equal", "neq", " not equal to "),
        word("approximately", "approx", " approximately equal to "),
        word("infinity", "infty", "infinity"),
        word("partial", "partial", "partial derivative"),
        word("nabla", "nabla", "nabla"),
        RewriteRule::new("overline", r"\\overline\{([^{}]+)\}", "($1) with overline"),
        RewriteRule::new("underline", r"\\underline\{([^{}]+)\}", "($1) with underline"),
        RewriteRule::new(
            "inner_product",
            r"\\langle([^\\]+)\\rangle",
            "inner product of ($1)",
        ),
        RewriteRule::new(
            "array",
            r"(?s)\\begin\{array\}.*?\\end\{array\}",
            " matrix or array expression ",
        ),
        RewriteRule::new("unknown_command", r"\\(?:[a-zA-Z]+|.)", " "),
        RewriteRule::new("braces", r"[{}]", ""),
        RewriteRule::new("whitespace", r"\s+", " "),
        RewriteRule::new("equals", "=", " equals "),
        RewriteRule::new("plus", r"\+", " plus "),
        RewriteRule::new("minus", "-", " minus "),
        RewriteRule::new("star", r"\*", " times "),
        RewriteRule::new("slash", "/", " divided by "),
        RewriteRule::new("final_whitespace", r"\s+", " "),
    ]
});

/// Limits above which the rendering collapses to [`COMPLEX_EXPRESSION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadableConfig {
    pub max_len: usize,
    pub max_open_parens: usize,
}

impl Default for ReadableConfig {
    fn default() -> Self {
        Self {
            max_len: 200,
            max_open_parens: 10,
        }
    }
}

impl ConfigValidator for ReadableConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_len == 0 {
            return Err(ConfigError::invalid("readable max_len must be greater than 0"));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Renders markup as an English sentence.
#[derive(Debug, Clone, Default)]
pub struct ReadableRenderer {
    config: ReadableConfig,
}

impl ReadableRenderer {
    pub fn new(config: ReadableConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, markup: &str) -> String {
        if markup.trim().is_empty() {
            return EMPTY_EXPRESSION.to_string();
        }
        let readable = apply_rules(&READABLE_RULES, markup);
        let readable = readable.trim();

        let open_parens = readable.matches('(').count();
        if readable.chars().count() > self.config.max_len
            || open_parens > self.config.max_open_parens
        {
            return COMPLEX_EXPRESSION.to_string();
        }
        if readable.is_empty() {
            return GENERIC_EXPRESSION.to_string();
        }
        readable.to_string()
    }
}

/// Render with default limits.
pub fn render_readable(markup: &str) -> String {
    ReadableRenderer::default().render(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_mentions_division() {
        let text = render_readable(r"\frac{1}{3}");
        assert!(text.contains("divided by"));
        assert_eq!(text, "(1) divided by (3)");
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(render_readable(""), EMPTY_EXPRESSION);
        assert_eq!(render_readable("   "), EMPTY_EXPRESSION);
        assert_eq!(render_readable(r"\quad{}"), GENERIC_EXPRESSION);
        assert_eq!(render_readable(&"x+".repeat(60)), COMPLEX_EXPRESSION);
        assert_eq!(render_readable(&r"\sqrt{x}".repeat(11)), COMPLEX_EXPRESSION);
    }

    #[test]
    fn test_powers_and_operators() {
        assert_eq!(
            render_readable("x^{2} + 5x + 6 = 0"),
            "x to the power of (2) plus 5x plus 6 equals 0"
        );
        assert_eq!(render_readable("2x + 3 = 7"), "2x plus 3 equals 7");
        assert_eq!(render_readable(r"a \leq b"), "a less than or equal to b");
    }

    #[test]
    fn test_functions_and_greek() {
        assert_eq!(render_readable(r"\sin{\theta}"), "sine of theta");
        assert_eq!(render_readable(r"\sqrt{\alpha_{1}}"), "square root of (alpha subscript (1))");
        assert_eq!(render_readable(r"\ln x"), "natural log of x");
    }

    #[test]
    fn test_calculus_and_arrays() {
        assert_eq!(
            render_readable(r"\int_{0}^{1}x^{2}\,dx"),
            "integral from 0 to 1 of x to the power of (2) dx"
        );
        assert_eq!(
            render_readable(r"\begin{array}{cc} a & b \end{array}"),
            "matrix or array expression"
        );
    }

    #[test]
    fn test_independent_of_translation() {
        let text = render_readable(r"\mathcal{F} \nabla \infty");
        assert_eq!(text, "F nabla infinity");
    }
}
