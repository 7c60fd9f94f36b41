//! Detection and recovery of hallucinated recognizer output.
//!
//! Neural markup recognizers tend to emit deeply nested, repetitive markup on
//! ambiguous input. [`GarbleDetector`] scores a string with weighted
//! indicators; when the score reaches the threshold the markup is replaced by
//! the minimal expression returned from [`simplify_garbled`].

use crate::core::config::{ConfigError, ConfigValidator, ConfigValidatorExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static COMMAND_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+").expect("Invalid command word regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid digit run regex"));

/// A count limit and the weight added when the count exceeds it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub limit: usize,
    pub weight: u32,
}

impl Indicator {
    pub const fn new(limit: usize, weight: u32) -> Self {
        Self { limit, weight }
    }

    fn score(&self, count: usize) -> u32 {
        if count > self.limit { self.weight } else { 0 }
    }
}

/// Indicator limits and weights for garble detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarbleThresholds {
    /// Opening or closing braces.
    pub braces: Indicator,
    /// `\frac` commands.
    pub fractions: Indicator,
    /// `\scriptstyle` commands.
    pub scriptstyle: Indicator,
    /// `\overbrace` plus `\underbrace`.
    pub over_under_braces: Indicator,
    /// `\sqrt` commands.
    pub roots: Indicator,
    /// `\cdot` plus `\cdotp`.
    pub dots: Indicator,
    /// Total length in characters.
    pub length: Indicator,
    /// `\mathrm` commands.
    pub mathrm: Indicator,
    /// `\overline` commands.
    pub overlines: Indicator,
    /// Weight of the `\cdot{\cdot` / `\sqrt{\sqrt{\sqrt` repetition patterns.
    pub repetition_weight: u32,
    /// Weight of the `\scriptstyle{\frac{\scriptstyle` pattern.
    pub scriptstyle_fraction_weight: u32,
    /// Score at which markup counts as garbled.
    pub threshold: u32,
    /// Confidence assigned to a simplified result.
    pub simplified_confidence: f32,
}

impl Default for GarbleThresholds {
    fn default() -> Self {
        Self {
            braces: Indicator::new(20, 2),
            fractions: Indicator::new(8, 2),
            scriptstyle: Indicator::new(5, 1),
            over_under_braces: Indicator::new(3, 1),
            roots: Indicator::new(6, 1),
            dots: Indicator::new(10, 1),
            length: Indicator::new(500, 1),
            mathrm: Indicator::new(8, 1),
            overlines: Indicator::new(5, 1),
            repetition_weight: 2,
            scriptstyle_fraction_weight: 3,
            threshold: 2,
            simplified_confidence: 0.4,
        }
    }
}

impl ConfigValidator for GarbleThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::invalid("garble threshold must be greater than 0"));
        }
        Self::ensure_unit_interval("simplified_confidence", self.simplified_confidence)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Score breakdown for one markup string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GarbleReport {
    pub score: u32,
    pub triggered: Vec<&'static str>,
    pub garbled: bool,
}

/// Weighted-indicator garble detector.
#[derive(Debug, Clone, Default)]
pub struct GarbleDetector {
    thresholds: GarbleThresholds,
}

impl GarbleDetector {
    pub fn new(thresholds: GarbleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GarbleThresholds {
        &self.thresholds
    }

    /// Score `markup` against every indicator.
    pub fn detect(&self, markup: &str) -> GarbleReport {
        let t = &self.thresholds;
        let count = |needle: &str| markup.matches(needle).count();
        let braces = count("{").max(count("}"));

        let counted = [
            ("braces", t.braces, braces),
            ("scriptstyle", t.scriptstyle, count(r"\scriptstyle")),
            ("fractions", t.fractions, count(r"\frac")),
            (
                "over_under_braces",
                t.over_under_braces,
                count(r"\overbrace") + count(r"\underbrace"),
            ),
            ("roots", t.roots, count(r"\sqrt")),
            ("dots", t.dots, count(r"\cdot") + count(r"\cdotp")),
            ("length", t.length, markup.chars().count()),
            ("mathrm", t.mathrm, count(r"\mathrm")),
            ("overlines", t.overlines, count(r"\overline")),
        ];

        let mut score = 0;
        let mut triggered = Vec::new();
        for (name, indicator, n) in counted {
            let weight = indicator.score(n);
            if weight > 0 {
                score += weight;
                triggered.push(name);
            }
        }
        if markup.contains(r"\cdot{\cdot") || markup.contains(r"\sqrt{\sqrt{\sqrt") {
            score += t.repetition_weight;
            triggered.push("repetition");
        }
        if markup.contains(r"\scriptstyle{\frac{\scriptstyle") {
            score += t.scriptstyle_fraction_weight;
            triggered.push("scriptstyle_fraction");
        }

        GarbleReport {
            score,
            triggered,
            garbled: score >= t.threshold,
        }
    }

    pub fn is_garbled(&self, markup: &str) -> bool {
        self.detect(markup).garbled
    }
}

/// Collapse garbled markup to the simplest expression matching its first
/// structural cue: sum, integral, fraction, root, variable with number,
/// variable, number.
///
/// Variables are letters outside command words; numbers are digit runs.
pub fn simplify_garbled(markup: &str) -> String {
    let stripped = COMMAND_WORD.replace_all(markup, " ");
    let variables: Vec<char> = stripped.chars().filter(char::is_ascii_alphabetic).collect();
    let number = DIGIT_RUN.find(markup).map(|m| m.as_str());

    if markup.contains(r"\sum") {
        return match variables.first() {
            Some(v) => format!(r"\sum {v}"),
            None => r"\sum".to_string(),
        };
    }
    if markup.contains(r"\int") {
        return match variables.first() {
            Some(v) => format!(r"\int {v} dx"),
            None => r"\int f(x) dx".to_string(),
        };
    }
    if markup.contains(r"\frac")
        && let [a, b, ..] = variables.as_slice()
    {
        return format!(r"\frac{{{a}}}{{{b}}}");
    }
    if markup.contains(r"\sqrt")
        && let Some(a) = variables.first()
    {
        return format!(r"\sqrt{{{a}}}");
    }
    match (variables.first(), number) {
        (Some(v), Some(n)) => format!("{v}^{{{n}}}"),
        (Some(v), None) => v.to_string(),
        (None, Some(n)) => n.to_string(),
        (None, None) => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> GarbleDetector {
        GarbleDetector::default()
    }

    #[test]
    fn test_clean_markup_is_not_garbled() {
        let report = detector().detect(r"\frac{3}{4} + \frac{1}{2} = \frac{5}{4}");
        assert_eq!(report.score, 0);
        assert!(report.triggered.is_empty());
        assert!(!report.garbled);
        assert!(!detector().is_garbled(""));
    }

    #[test]
    fn test_many_braces_is_garbled() {
        let markup = "{".repeat(21);
        let report = detector().detect(&markup);
        assert!(report.garbled);
        assert_eq!(report.triggered, vec!["braces"]);
    }

    #[test]
    fn test_many_fractions_is_garbled() {
        let markup = r"\frac".repeat(9);
        assert!(detector().is_garbled(&markup));
    }

    #[test]
    fn test_single_weak_indicator_is_not_enough() {
        let markup = r"\sqrt x".repeat(7);
        let report = detector().detect(&markup);
        assert_eq!(report.score, 1);
        assert!(!report.garbled);
    }

    #[test]
    fn test_known_patterns() {
        assert!(detector().is_garbled(r"\sqrt{\sqrt{\sqrt{x}}}"));
        let report = detector().detect(r"\scriptstyle{\frac{\scriptstyle{a}}{b}}");
        assert!(report.triggered.contains(&"scriptstyle_fraction"));
        assert!(report.garbled);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let lenient = GarbleDetector::new(GarbleThresholds {
            threshold: 5,
            ..GarbleThresholds::default()
        });
        assert!(!lenient.is_garbled(&"{".repeat(21)));
        assert!(GarbleThresholds::default().validate().is_ok());
        let bad = GarbleThresholds {
            simplified_confidence: 1.5,
            ..GarbleThresholds::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_simplify_priority() {
        assert_eq!(simplify_garbled(r"\frac{\sum_{k} y}{\int z}"), r"\sum k");
        assert_eq!(simplify_garbled(r"\sum\frac{1}{2}"), r"\sum");
        assert_eq!(simplify_garbled(r"\int\sqrt{t}"), r"\int t dx");
        assert_eq!(simplify_garbled(r"\int{}"), r"\int f(x) dx");
        assert_eq!(simplify_garbled(r"\frac{a}{\frac{b}{c}}"), r"\frac{a}{b}");
        assert_eq!(simplify_garbled(r"\frac{a}{2}\sqrt{}"), r"\sqrt{a}");
        assert_eq!(simplify_garbled(r"\mathrm{x}^{12}3"), "x^{12}");
        assert_eq!(simplify_garbled(r"\mathrm{y}"), "y");
        assert_eq!(simplify_garbled(r"\frac{1}{7}"), "1");
        assert_eq!(simplify_garbled(r"\scriptstyle{}"), "0");
    }
}
