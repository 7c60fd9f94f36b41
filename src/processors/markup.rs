//! Markup normalization.
//!
//! Turns recognizer output into canonical markup in four ordered stages:
//!
//! 1. balance `{}`, `()` and `[]` by padding the short side,
//! 2. collapse malformed constructs (repeated operators, broken font
//!    decorations) with the rules in [`CLEANUP_RULES`],
//! 3. canonicalize spacing around binary operators and relations,
//! 4. wrap the token after every `^` and `_` in braces.
//!
//! The stages are repeated until the text stops changing, which makes
//! [`MarkupNormalizer::normalize`] idempotent.

use crate::processors::rewrite::{RewriteRule, apply_rules};
use once_cell::sync::Lazy;

/// Upper bound on full normalization passes.
const MAX_PASSES: usize = 16;

/// Paired grouping delimiters kept balanced by stage 1.
pub const DELIMITER_PAIRS: [(char, char); 3] = [('{', '}'), ('(', ')'), ('[', ']')];

/// Operator characters that get one space on each side.
const BINARY_CHARS: [char; 6] = ['+', '-', '=', '<', '>', '&'];

/// Relation and operator commands spaced like binary operators.
const RELATION_COMMANDS: [&str; 13] = [
    "leq", "geq", "neq", "approx", "pm", "mp", "cdot", "times", "div", "le", "ge", "equiv", "to",
];

/// Characters after which `+` and `-` are signs, not operators.
const SIGN_CONTEXT: [char; 7] = ['(', '{', '[', '^', '_', ',', '&'];

/// Stage 2 rules, in order. Every pattern tolerates interior whitespace so
/// that removing whitespace in stage 3 cannot create new matches.
pub static CLEANUP_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new(
            "calligraphic_star",
            r"\\cal\s*\{([^}]*)\}\s*\*",
            r"\mathcal{$1}",
        ),
        RewriteRule::new("calligraphic_equals", r"\\cal\s*\{\s*=\s*\}", "="),
        RewriteRule::new("calligraphic_minus", r"\\cal\s*\{\s*-\s*\}", "-"),
        RewriteRule::new(
            "overline_star",
            r"\\overline\s*\{([^}]*)\}\s*\*",
            r"\overline{$1}",
        ),
        RewriteRule::new(
            "gamma_double_star",
            r"\\gamma\s*\^\s*\*\s*\^\s*\*",
            r"\gamma^*",
        ),
        RewriteRule::new("gamma_star_star", r"\\gamma\s*\*\s*\*", r"\gamma^*"),
        RewriteRule::new("double_star", r"\*\s*\*", "^"),
        RewriteRule::new("repeated_star", r"\*(?:\s*\*)+", "*"),
        RewriteRule::new("repeated_caret", r"\^(?:\s*\^)+", "^"),
        RewriteRule::new("repeated_plus", r"\+(?:\s*\+)+", "+"),
        RewriteRule::new("repeated_equals", r"=(?:\s*=)+", "="),
    ]
});

/// Lexical unit of markup.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `\name` or `\` followed by one character.
    Command(String),
    Space(String),
    Char(char),
}

impl Token {
    fn push_to(&self, out: &mut String) {
        match self {
            Token::Command(text) | Token::Space(text) => out.push_str(text),
            Token::Char(c) => out.push(*c),
        }
    }

    fn is_space(&self) -> bool {
        matches!(self, Token::Space(_))
    }

    /// Command spelled with letters, e.g. `\alpha`.
    fn is_word_command(&self) -> bool {
        matches!(
            self,
            Token::Command(text) if text.chars().nth(1).is_some_and(|c| c.is_ascii_alphabetic())
        )
    }

    fn is_relation(&self) -> bool {
        match self {
            Token::Command(text) => RELATION_COMMANDS.contains(&&text[1..]),
            Token::Char(c) => BINARY_CHARS.contains(c),
            Token::Space(_) => false,
        }
    }

    fn is_char(&self, expected: char) -> bool {
        matches!(self, Token::Char(c) if *c == expected)
    }
}

fn tokenize(markup: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = markup.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut command = String::from('\\');
            match chars.peek().copied() {
                Some(next) if next.is_ascii_alphabetic() => {
                    while let Some(letter) = chars.next_if(|ch| ch.is_ascii_alphabetic()) {
                        command.push(letter);
                    }
                    tokens.push(Token::Command(command));
                }
                Some(next) => {
                    chars.next();
                    command.push(next);
                    tokens.push(Token::Command(command));
                }
                None => tokens.push(Token::Char('\\')),
            }
        } else if c.is_whitespace() {
            let mut space = String::from(c);
            while let Some(ws) = chars.next_if(|ch| ch.is_whitespace()) {
                space.push(ws);
            }
            tokens.push(Token::Space(space));
        } else {
            tokens.push(Token::Char(c));
        }
    }
    tokens
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        token.push_to(&mut out);
    }
    out
}

/// Canonicalizes recognizer markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupNormalizer;

impl MarkupNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Run all four stages to a fixed point.
    ///
    /// Empty and whitespace-only input is returned unchanged.
    pub fn normalize(&self, markup: &str) -> String {
        if markup.trim().is_empty() {
            return markup.to_string();
        }
        let mut current = markup.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn pass(&self, markup: &str) -> String {
        let balanced = Self::balance_delimiters(markup);
        let cleaned = Self::clean_malformed(&balanced);
        let spaced = Self::canonicalize_spacing(&cleaned);
        Self::group_scripts(&spaced)
    }

    /// Stage 1: pad missing openers at the front and missing closers at the end.
    pub fn balance_delimiters(markup: &str) -> String {
        let mut prefix = String::new();
        let mut suffix = String::new();
        for (open, close) in DELIMITER_PAIRS {
            let opens = markup.chars().filter(|c| *c == open).count();
            let closes = markup.chars().filter(|c| *c == close).count();
            if opens > closes {
                suffix.extend(std::iter::repeat_n(close, opens - closes));
            } else {
                prefix.extend(std::iter::repeat_n(open, closes - opens));
            }
        }
        if prefix.is_empty() && suffix.is_empty() {
            return markup.to_string();
        }
        format!("{prefix}{markup}{suffix}")
    }

    /// Stage 2: collapse repeated operators and broken decorations.
    pub fn clean_malformed(markup: &str) -> String {
        apply_rules(&CLEANUP_RULES, markup)
    }

    /// Stage 3: one space around binary operators and relations, none
    /// elsewhere except between a word command and a following letter.
    pub fn canonicalize_spacing(markup: &str) -> String {
        let tokens: Vec<Token> = tokenize(markup)
            .into_iter()
            .filter(|t| !t.is_space())
            .collect();

        let mut out = String::with_capacity(markup.len());
        let mut previous: Option<&Token> = None;
        for (i, token) in tokens.iter().enumerate() {
            let is_sign_position = previous.is_none_or(|p| {
                p.is_relation() || SIGN_CONTEXT.iter().any(|c| p.is_char(*c))
            });
            let unary = (token.is_char('+') || token.is_char('-')) && is_sign_position;

            if token.is_relation() && !unary {
                push_space(&mut out);
                token.push_to(&mut out);
                out.push(' ');
            } else {
                token.push_to(&mut out);
                let next_is_letter = matches!(
                    tokens.get(i + 1),
                    Some(Token::Char(c)) if c.is_ascii_alphabetic()
                );
                if token.is_word_command() && next_is_letter {
                    out.push(' ');
                }
            }
            previous = Some(token);
        }
        out.trim().to_string()
    }

    /// Stage 4: `x^2` becomes `x^{2}`, `a_\alpha` becomes `a_{\alpha}` and
    /// `x^-1` becomes `x^{-1}`.
    pub fn group_scripts(markup: &str) -> String {
        let tokens = tokenize(markup);
        let mut out: Vec<Token> = Vec::with_capacity(tokens.len() + 4);
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            out.push(token.clone());
            i += 1;
            if !(token.is_char('^') || token.is_char('_')) {
                continue;
            }
            if let Some(consumed) = script_operand(&tokens[i..]) {
                out.push(Token::Char('{'));
                out.extend(tokens[i..i + consumed].iter().cloned());
                out.push(Token::Char('}'));
                i += consumed;
                // Whitespace that only separated a command from the next letter.
                if matches!(tokens.get(i), Some(Token::Space(_))) {
                    i += 1;
                }
            }
        }
        render(&out)
    }
}

/// Number of tokens forming a bare script operand at the start of `rest`.
fn script_operand(rest: &[Token]) -> Option<usize> {
    let single = |token: &Token| match token {
        Token::Char(c) => c.is_ascii_alphanumeric() || *c == '*' || *c == '\'',
        Token::Command(_) => true,
        Token::Space(_) => false,
    };
    let first = rest.first()?;
    if first.is_char('+') || first.is_char('-') {
        return rest.get(1).filter(|t| single(t)).map(|_| 2);
    }
    if let Token::Command(_) = first
        && rest.get(1).is_some_and(|t| t.is_char('{'))
    {
        // A command taking arguments cannot be grouped on its own.
        return None;
    }
    single(first).then_some(1)
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

/// Normalize with the default normalizer.
pub fn normalize_markup(markup: &str) -> String {
    MarkupNormalizer.normalize(markup)
}

/// True when every delimiter pair has matching counts.
pub fn delimiters_balanced(markup: &str) -> bool {
    DELIMITER_PAIRS.iter().all(|(open, close)| {
        let opens = markup.chars().filter(|c| c == open).count();
        opens == markup.chars().filter(|c| c == close).count()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_balances_delimiters() {
        assert_eq!(MarkupNormalizer::balance_delimiters("x^{2"), "x^{2}");
        assert_eq!(MarkupNormalizer::balance_delimiters("a)+(b))"), "((a)+(b))");
        assert_eq!(normalize_markup(r"\frac{1}{2"), r"\frac{1}{2}");
    }

    #[test]
    fn test_collapses_malformed_constructs() {
        assert_eq!(MarkupNormalizer::clean_malformed("a++b"), "a+b");
        assert_eq!(MarkupNormalizer::clean_malformed("x**2"), "x^2");
        assert_eq!(MarkupNormalizer::clean_malformed("a = = b"), "a = b");
        assert_eq!(MarkupNormalizer::clean_malformed(r"\cal{A}*"), r"\mathcal{A}");
        assert_eq!(MarkupNormalizer::clean_malformed(r"a\cal{=}b"), "a=b");
        assert_eq!(MarkupNormalizer::clean_malformed(r"\overline{x}*"), r"\overline{x}");
        assert_eq!(MarkupNormalizer::clean_malformed(r"\gamma^*^*"), r"\gamma^*");
        assert_eq!(MarkupNormalizer::clean_malformed(r"\gamma**"), r"\gamma^*");
    }

    #[test]
    fn test_spacing() {
        assert_eq!(
            MarkupNormalizer::canonicalize_spacing("x+5x  +6=0"),
            "x + 5x + 6 = 0"
        );
        assert_eq!(MarkupNormalizer::canonicalize_spacing("-x+(-1)"), "-x + (-1)");
        assert_eq!(MarkupNormalizer::canonicalize_spacing(r"a\leq b"), r"a \leq b");
        assert_eq!(MarkupNormalizer::canonicalize_spacing(r"\sin   x"), r"\sin x");
        assert_eq!(
            MarkupNormalizer::canonicalize_spacing(r"\frac { 1 } { 2 }"),
            r"\frac{1}{2}"
        );
        assert_eq!(MarkupNormalizer::canonicalize_spacing("a=-b"), "a = -b");
    }

    #[test]
    fn test_groups_scripts() {
        assert_eq!(MarkupNormalizer::group_scripts("x^2"), "x^{2}");
        assert_eq!(MarkupNormalizer::group_scripts("x^{2}"), "x^{2}");
        assert_eq!(MarkupNormalizer::group_scripts("a_i^-1"), "a_{i}^{-1}");
        assert_eq!(MarkupNormalizer::group_scripts(r"x^\alpha y"), r"x^{\alpha}y");
        assert_eq!(MarkupNormalizer::group_scripts(r"e^\frac{1}{2}"), r"e^\frac{1}{2}");
    }

    #[test]
    fn test_full_normalization() {
        assert_eq!(normalize_markup("x^2 + 5x + 6 = 0"), "x^{2} + 5x + 6 = 0");
        assert_eq!(normalize_markup("x ** 2 ++ 1"), "x^{2} + 1");
        assert_eq!(
            normalize_markup(r"\frac{3}{4}+\frac{1}{2}=\frac{5}{4}"),
            r"\frac{3}{4} + \frac{1}{2} = \frac{5}{4}"
        );
        assert_eq!(
            normalize_markup(r"\int_{0}^{1} x^2 \, dx = \frac{1}{3}"),
            r"\int_{0}^{1}x^{2}\,dx = \frac{1}{3}"
        );
    }

    #[test]
    fn test_blank_input_is_unchanged() {
        assert_eq!(normalize_markup(""), "");
        assert_eq!(normalize_markup("   "), "   ");
        assert_eq!(normalize_markup("x"), "x");
    }

    fn markup_strategy() -> impl Strategy<Value = String> {
        let pieces = vec![
            "x", "y", "2", "+", "-", "*", "^", "_", "=", "<", "{", "}", "(", ")", "[", "]", " ",
            r"\frac", r"\alpha", r"\cal", r"\gamma", r"\leq", r"\cdot", r"\\", "&", r"\,", "'",
            ",", r"\",
        ];
        prop::collection::vec(prop::sample::select(pieces), 0..24).prop_map(|v| v.concat())
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(input in markup_strategy()) {
            let once = normalize_markup(&input);
            let twice = normalize_markup(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_normalize_balances_delimiters(input in markup_strategy()) {
            let output = normalize_markup(&input);
            prop_assert!(delimiters_balanced(&output), "unbalanced output {:?}", output);
        }
    }
}
