//! Named regex rewrite rules applied as an ordered list.
//!
//! Several processors (normalizer cleanup, translator, readable renderer) are
//! cascades of string substitutions whose order matters. Each step is a
//! [`RewriteRule`] so it can be tested on its own and listed by name.

use regex::Regex;
use std::borrow::Cow;

/// A compiled `pattern -> replacement` substitution.
#[derive(Debug)]
pub struct RewriteRule {
    name: &'static str,
    pattern: Regex,
    replacement: String,
    until_stable: bool,
}

/// Upper bound on passes for rules that repeat until nothing matches.
const MAX_REPEATS: usize = 32;

impl RewriteRule {
    /// Compile a rule.
    ///
    /// Rules are built from literal patterns inside `Lazy` statics, so an
    /// invalid pattern is a programming error.
    pub fn new(name: &'static str, pattern: &str, replacement: impl Into<String>) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|err| panic!("invalid pattern for rewrite rule '{name}': {err}"));
        Self {
            name,
            pattern,
            replacement: replacement.into(),
            until_stable: false,
        }
    }

    /// Re-apply the rule until it stops matching. Used for constructs that
    /// nest, where each pass rewrites the innermost level.
    pub fn repeated(mut self) -> Self {
        self.until_stable = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.pattern.is_match(input)
    }

    /// Apply the rule once (or until stable for repeated rules).
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut current = self.pattern.replace_all(input, self.replacement.as_str());
        if !self.until_stable {
            return current;
        }
        for _ in 0..MAX_REPEATS {
            let next = self
                .pattern
                .replace_all(&current, self.replacement.as_str())
                .into_owned();
            if next == current {
                break;
            }
            current = Cow::Owned(next);
        }
        current
    }
}

/// Run every rule in order.
pub fn apply_rules(rules: &[RewriteRule], input: &str) -> String {
    rules
        .iter()
        .fold(input.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rule() {
        let rule = RewriteRule::new("double_plus", r"\+\+", "+");
        assert_eq!(rule.apply("a++b"), "a+b");
        assert!(matches!(rule.apply("a+b"), Cow::Borrowed(_)));
        assert_eq!(rule.name(), "double_plus");
    }

    #[test]
    fn test_repeated_rule_reaches_innermost() {
        let rule = RewriteRule::new("group", r"\{([^{}]*)\}", "($1)").repeated();
        assert_eq!(rule.apply("{a{b{c}}}"), "(a(b(c)))");
    }

    #[test]
    fn test_order_is_respected() {
        let rules = vec![
            RewriteRule::new("a_to_b", "a", "b"),
            RewriteRule::new("b_to_c", "b", "c"),
        ];
        assert_eq!(apply_rules(&rules, "ab"), "cc");
        let reversed = vec![
            RewriteRule::new("b_to_c", "b", "c"),
            RewriteRule::new("a_to_b", "a", "b"),
        ];
        assert_eq!(apply_rules(&reversed, "ab"), "bc");
    }
}
