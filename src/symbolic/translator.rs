//! Canonical markup to symbolic expression.
//!
//! Translation is a cascade of pure rewrites that turns markup into the plain
//! infix syntax accepted by [`parse_statement`], followed by a single parse.
//! Failure is never an error: the caller receives an
//! [`UnparseableMarker`] variant instead.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::processors::rewrite::{RewriteRule, apply_rules};
use crate::symbolic::expr::{SymbolicExpression, UnparseableMarker};
use crate::symbolic::parser::{Statement, parse_statement};
use crate::symbolic::simplify::canonicalize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Braced group allowing one level of nested braces.
const GROUP: &str = r"\{((?:[^{}]|\{[^{}]*\})*)\}";

/// Ordered markup-to-infix rewrites. Order is load-bearing: fractions and
/// powers must be rewritten before braces turn into parentheses, and big
/// operator bounds are matched in their already rewritten form.
static TRANSLATION_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new("overline", r"\\overline\{([^{}]*)\}", "$1"),
        RewriteRule::new("calligraphic", r"\\(?:mathcal|cal)\{([^{}]*)\}", "$1"),
        RewriteRule::new("angle_brackets", r"\\langle([^\\]*)\\rangle", "($1)"),
        RewriteRule::new(
            "fraction",
            &format!(r"\\[dt]?frac{GROUP}{GROUP}"),
            "($1)/($2)",
        )
        .repeated(),
        RewriteRule::new("grouped_power", r"\^\{([^{}]*)\}", "**($1)").repeated(),
        RewriteRule::new("bare_power", r"\^([a-zA-Z0-9])", "**$1"),
        RewriteRule::new(
            "nth_root",
            &format!(r"\\sqrt\[([^\]]*)\]{GROUP}"),
            "($2)**(1/($1))",
        ),
        RewriteRule::new("square_root", &format!(r"\\sqrt{GROUP}"), "sqrt($1)").repeated(),
        RewriteRule::new("grouped_subscript", r"_\{(\w+)\}", "_$1"),
        RewriteRule::new(
            "greek_letter",
            r"\\(alpha|beta|gamma|delta|epsilon|varepsilon|zeta|eta|theta|vartheta|iota|kappa|lambda|mu|nu|xi|pi|rho|sigma|tau|upsilon|phi|varphi|chi|psi|omega)([^a-zA-Z]|$)",
            "$1$2",
        )
        .repeated(),
        RewriteRule::new(
            "named_function",
            r"\\(sin|cos|tan|log|ln|exp)([^a-zA-Z]|$)",
            "$1$2",
        )
        .repeated(),
        RewriteRule::new(
            "product_operator",
            r"\\(?:cdot|times|ast)([^a-zA-Z]|$)",
            "*$1",
        )
        .repeated(),
        RewriteRule::new("division_operator", r"\\div([^a-zA-Z]|$)", "/$1").repeated(),
        RewriteRule::new(
            "big_operator",
            r"\\(?:int|iint|iiint|oint|sum|prod)(?:_\d+|_[a-zA-Z]|_\([^)]*\)|_\{[^}]*\}|\*\*\([^)]*\)|\*\*\w)*",
            "",
        ),
        RewriteRule::new("differential", r"\\[,;:!]\s*d[a-zA-Z]\b", ""),
        RewriteRule::new("unknown_command", r"\\(?:[a-zA-Z]+|[,;:! ])", ""),
        RewriteRule::new("open_group", r"[{\[]", "("),
        RewriteRule::new("close_group", r"[}\]]", ")"),
        RewriteRule::new("whitespace", r"\s+", ""),
        RewriteRule::new("allow_list", r"[^A-Za-z0-9+\-*/().,=_]", ""),
    ]
});

static ARRAY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{array\}(?:\{[^}]*\})?(.*?)\\end\{array\}")
        .expect("Invalid array block regex")
});

static REPEATED_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{+").expect("Invalid repeated brace regex"));
static REPEATED_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\}+").expect("Invalid repeated brace regex"));

/// Accepted length window for cleaned expressions, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            min_len: 2,
            max_len: 200,
        }
    }
}

impl ConfigValidator for TranslatorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_len > self.max_len {
            return Err(ConfigError::invalid(format!(
                "translator min_len ({}) must not exceed max_len ({})",
                self.min_len, self.max_len
            )));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Maps canonical markup to a [`SymbolicExpression`].
#[derive(Debug, Clone, Default)]
pub struct SymbolicTranslator {
    config: TranslatorConfig,
}

impl SymbolicTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    /// Names of the rewrite rules in application order.
    pub fn rule_names() -> Vec<&'static str> {
        TRANSLATION_RULES.iter().map(RewriteRule::name).collect()
    }

    /// Rewrite markup into the parser's infix syntax.
    pub fn clean(&self, markup: &str) -> String {
        apply_rules(&TRANSLATION_RULES, markup.trim())
    }

    /// Translate markup. Never fails; unparseable input yields a marker.
    pub fn translate(&self, markup: &str) -> SymbolicExpression {
        if markup.contains(r"\begin{array}") {
            return self.translate_array(markup);
        }

        let cleaned = self.clean(markup);
        let len = cleaned.chars().count();
        if len < self.config.min_len || len > self.config.max_len {
            debug!(len, "cleaned markup outside accepted length window");
            return SymbolicExpression::Unparseable(UnparseableMarker::ComplexExpression);
        }

        match parse_statement(&cleaned) {
            Ok(statement) => Self::from_statement(statement),
            Err(err) => {
                debug!(error = %err, expression = %cleaned, "symbolic parse failed");
                SymbolicExpression::Unparseable(UnparseableMarker::UnparseableExpression)
            }
        }
    }

    fn from_statement(statement: Statement) -> SymbolicExpression {
        match statement {
            Statement::Expr(expr) => SymbolicExpression::Expr(canonicalize(expr)),
            Statement::Equation(lhs, rhs) => SymbolicExpression::Equation {
                lhs: canonicalize(lhs),
                rhs: canonicalize(rhs),
            },
        }
    }

    /// Return the first array cell that carries an operator and parses.
    fn translate_array(&self, markup: &str) -> SymbolicExpression {
        let Some(body) = ARRAY_BLOCK.captures(markup).and_then(|c| c.get(1)) else {
            return SymbolicExpression::Unparseable(UnparseableMarker::ArrayExpression);
        };

        let candidates = body
            .as_str()
            .split(r"\\")
            .flat_map(|row| row.split('&'))
            .map(str::trim)
            .filter(|cell| cell.chars().count() > 2)
            .map(|cell| {
                let cell = REPEATED_OPEN.replace_all(cell, "{");
                REPEATED_CLOSE.replace_all(&cell, "}").into_owned()
            })
            .filter(|cell| cell.chars().any(|c| "+-*/^=()[]".contains(c)));

        for cell in candidates {
            let cleaned = self.clean(&cell);
            if cleaned.chars().count() < 2 {
                continue;
            }
            if let Ok(statement) = parse_statement(&cleaned) {
                return Self::from_statement(statement);
            }
        }
        SymbolicExpression::Unparseable(UnparseableMarker::ComplexArrayExpression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::poly::UnivariatePoly;
    use crate::symbolic::simplify;

    fn translator() -> SymbolicTranslator {
        SymbolicTranslator::default()
    }

    #[test]
    fn test_quadratic_equation() {
        let result = translator().translate("x^{2} + 5x + 6 = 0");
        let SymbolicExpression::Equation { lhs, rhs } = &result else {
            panic!("expected equation, got {result:?}");
        };
        let symbols: Vec<_> = result.free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["x".to_string()]);
        let poly = UnivariatePoly::from_expr(lhs, "x").unwrap();
        assert_eq!(poly.degree(), Some(2));
        assert!(rhs.is_zero());
        assert_eq!(result.to_string(), "Eq(x**2 + 5*x + 6, 0)");
    }

    #[test]
    fn test_failure_modes_are_markers() {
        let long = "x+".repeat(150);
        for input in ["", "x", long.as_str()] {
            assert_eq!(
                translator().translate(input),
                SymbolicExpression::Unparseable(UnparseableMarker::ComplexExpression),
                "input {input:?}"
            );
        }
        assert_eq!(
            translator().translate("x + + )"),
            SymbolicExpression::Unparseable(UnparseableMarker::UnparseableExpression)
        );
    }

    #[test]
    fn test_fraction_statement() {
        let result = translator().translate(r"\frac{3}{4} + \frac{1}{2} = \frac{5}{4}");
        let SymbolicExpression::Equation { lhs, rhs } = result else {
            panic!("expected equation");
        };
        assert_eq!(lhs.to_string(), "5/4");
        assert_eq!(rhs.to_string(), "5/4");
    }

    #[test]
    fn test_nested_fraction_and_root() {
        let cleaned = translator().clean(r"\frac{\frac{1}{2}}{x^{2}} + \sqrt{x}");
        assert_eq!(cleaned, "((1)/(2))/(x**(2))+sqrt(x)");
        let cleaned = translator().clean(r"\sqrt[3]{x}");
        assert_eq!(cleaned, "(x)**(1/(3))");
    }

    #[test]
    fn test_commands_become_names() {
        assert_eq!(translator().clean(r"\sin{\theta} \cdot 2"), "sin(theta)*2");
        assert_eq!(translator().clean(r"\alpha_{1} + \beta"), "alpha_1+beta");
        let result = translator().translate(r"\sin x");
        assert_eq!(result.to_string(), "sin(x)");
        assert_eq!(translator().clean(r"\alpha\beta"), "alphabeta");
        assert_eq!(translator().clean(r"2\cdot3"), "2*3");
    }

    #[test]
    fn test_integral_bounds_are_stripped() {
        let cleaned = translator().clean(r"\int_{0}^{1} x^{2} \,dx = \frac{1}{3}");
        assert_eq!(cleaned, "x**(2)=(1)/(3)");
        let cleaned = translator().clean(r"\sum_{i}^{n} i");
        assert_eq!(cleaned, "i");
    }

    #[test]
    fn test_array_cells() {
        let markup = r"\begin{array}{cc} a & x + 1 \\ y & 2 \end{array}";
        let result = translator().translate(markup);
        let SymbolicExpression::Expr(expr) = result else {
            panic!("expected expression");
        };
        assert_eq!(simplify(expr).to_string(), "x + 1");

        let no_cells = r"\begin{array}{c} abc \\ def \end{array}";
        assert_eq!(
            translator().translate(no_cells),
            SymbolicExpression::Unparseable(UnparseableMarker::ComplexArrayExpression)
        );
        assert_eq!(
            translator().translate(r"\begin{array}{c} x + 1"),
            SymbolicExpression::Unparseable(UnparseableMarker::ArrayExpression)
        );
    }

    #[test]
    fn test_integer_limits_fold_without_panicking() {
        let result = translator().translate("-9223372036854775807 - 1");
        let SymbolicExpression::Expr(expr) = result else {
            panic!("expected expression, got {result:?}");
        };
        assert_eq!(expr.to_string(), i64::MIN.to_string());

        let huge = translator().translate("x + 1^{999999999999}");
        let SymbolicExpression::Expr(expr) = huge else {
            panic!("expected expression, got {huge:?}");
        };
        assert_eq!(expr.to_string(), "x + 1");
    }

    #[test]
    fn test_config_validation() {
        assert!(TranslatorConfig::default().validate().is_ok());
        let bad = TranslatorConfig {
            min_len: 10,
            max_len: 5,
        };
        assert!(bad.validate().is_err());
    }
}
