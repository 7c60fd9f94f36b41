//! Recursive-descent parser for the plain-text expressions produced by the
//! markup translator.
//!
//! Accepted syntax: decimal numbers, identifiers (optionally subscripted as
//! `x_1`), `+ - * / ** ^`, parentheses, calls of the known functions and a
//! single `=`. Adjacent operands multiply implicitly (`5x`, `2(x+1)`).
//! Letter runs that are not known names are split into single-letter symbols,
//! so `xy` is `x*y`.

use crate::symbolic::SymbolicError;
use crate::symbolic::expr::{Constant, Function, SymExpr};
use crate::symbolic::rational::Rational;

/// Spelled-out Greek letters that stay whole when splitting identifiers.
pub const GREEK_NAMES: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "upsilon", "phi", "chi", "psi", "omega",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Rational),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Equals,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Caret => "**".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Equals => "=".into(),
        }
    }
}

/// Parsed statement: a bare expression or an equation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expr(SymExpr),
    Equation(SymExpr, SymExpr),
}

/// Parse an expression or equation.
pub fn parse_statement(input: &str) -> Result<Statement, SymbolicError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let lhs = parser.parse_sum()?;
    let statement = if parser.eat(&Token::Equals) {
        let rhs = parser.parse_sum()?;
        Statement::Equation(lhs, rhs)
    } else {
        Statement::Expr(lhs)
    };
    match parser.peek() {
        None => Ok(statement),
        Some(Token::Equals) => Err(SymbolicError::MultipleRelations),
        Some(other) => Err(SymbolicError::UnexpectedToken {
            found: other.describe(),
            position: parser.pos,
        }),
    }
}

/// Parse an expression; equations are rejected.
pub fn parse_expression(input: &str) -> Result<SymExpr, SymbolicError> {
    match parse_statement(input)? {
        Statement::Expr(expr) => Ok(expr),
        Statement::Equation(..) => Err(SymbolicError::InvalidOperation(
            "expected an expression, found an equation".to_string(),
        )),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, SymbolicError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = Rational::parse_decimal(&text)
                    .ok_or_else(|| SymbolicError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let mut subscript = None;
                if i + 1 < chars.len() && chars[i] == '_' && chars[i + 1].is_ascii_alphanumeric() {
                    let sub_start = i + 1;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                        i += 1;
                    }
                    subscript = Some(chars[sub_start..i].iter().collect::<String>());
                }
                let mut names = split_identifier(&word);
                if let (Some(sub), Some(last)) = (subscript, names.last_mut()) {
                    *last = format!("{last}_{sub}");
                }
                tokens.extend(names.into_iter().map(Token::Ident));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            other => {
                return Err(SymbolicError::InvalidCharacter {
                    character: other,
                    position: i,
                });
            }
        }
    }
    Ok(tokens)
}

fn is_known_name(name: &str) -> bool {
    name == "pi" || Function::from_name(name).is_some() || GREEK_NAMES.contains(&name)
}

/// Split a letter run into known names and single letters, longest match first.
fn split_identifier(word: &str) -> Vec<String> {
    if is_known_name(word) {
        return vec![word.to_string()];
    }
    let mut parts = Vec::new();
    let mut rest = word;
    'outer: while !rest.is_empty() {
        for len in (2..=rest.len()).rev() {
            if is_known_name(&rest[..len]) {
                parts.push(rest[..len].to_string());
                rest = &rest[len..];
                continue 'outer;
            }
        }
        parts.push(rest[..1].to_string());
        rest = &rest[1..];
    }
    parts
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SymbolicError> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(other) => Err(SymbolicError::UnexpectedToken {
                found: other.describe(),
                position: self.pos - 1,
            }),
            None => Err(SymbolicError::UnexpectedEnd),
        }
    }

    fn parse_sum(&mut self) -> Result<SymExpr, SymbolicError> {
        let mut terms = vec![self.parse_product()?];
        loop {
            if self.eat(&Token::Plus) {
                terms.push(self.parse_product()?);
            } else if self.eat(&Token::Minus) {
                terms.push(SymExpr::neg(self.parse_product()?));
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            SymExpr::Add(terms)
        })
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Number(_) | Token::Ident(_) | Token::LParen)
        )
    }

    fn parse_product(&mut self) -> Result<SymExpr, SymbolicError> {
        let mut factors = vec![self.parse_unary()?];
        loop {
            if self.eat(&Token::Star) {
                factors.push(self.parse_unary()?);
            } else if self.eat(&Token::Slash) {
                let divisor = self.parse_unary()?;
                factors.push(SymExpr::pow(divisor, SymExpr::int(-1)));
            } else if self.starts_operand() {
                factors.push(self.parse_power()?);
            } else {
                break;
            }
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            SymExpr::Mul(factors)
        })
    }

    fn parse_unary(&mut self) -> Result<SymExpr, SymbolicError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            // Negative literals stay atomic so `x**-1` is a plain reciprocal.
            return Ok(match operand.as_num().and_then(|r| r.checked_neg()) {
                Some(negated) => SymExpr::Num(negated),
                None => SymExpr::neg(operand),
            });
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<SymExpr, SymbolicError> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(SymExpr::pow(base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<SymExpr, SymbolicError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(SymExpr::Num(value)),
            Some(Token::Ident(name)) => {
                if let Some(function) = Function::from_name(&name) {
                    let arg = if self.eat(&Token::LParen) {
                        let inner = self.parse_sum()?;
                        self.expect(&Token::RParen)?;
                        inner
                    } else {
                        self.parse_power()?
                    };
                    return Ok(SymExpr::func(function, arg));
                }
                match name.as_str() {
                    "pi" => Ok(SymExpr::Const(Constant::Pi)),
                    "e" | "E" => Ok(SymExpr::Const(Constant::E)),
                    _ => Ok(SymExpr::Sym(name)),
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(SymbolicError::UnexpectedToken {
                found: other.describe(),
                position: self.pos - 1,
            }),
            None => Err(SymbolicError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> String {
        parse_expression(text).unwrap().to_string()
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(parse("5x"), "5*x");
        assert_eq!(parse("2(x+1)"), "2*(x + 1)");
        assert_eq!(parse("xy"), "x*y");
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_expression("2**3**2").unwrap();
        let SymExpr::Pow(_, exp) = expr else {
            panic!("expected power");
        };
        assert!(matches!(*exp, SymExpr::Pow(_, _)));
        assert_eq!(parse("x^2"), "x**2");
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        assert_eq!(parse("-x**2"), "-x**2");
        assert_eq!(parse("x**-1"), "1/x");
        assert_eq!(parse("-3"), "-3");
    }

    #[test]
    fn test_functions_and_names() {
        assert_eq!(parse("sin(x)"), "sin(x)");
        assert_eq!(parse("sinx"), "sin(x)");
        assert_eq!(parse("2pi"), "2*pi");
        assert_eq!(parse("theta"), "theta");
        assert_eq!(parse("x_1+x_2"), "x_1 + x_2");
    }

    #[test]
    fn test_euler_constant() {
        let expr = parse_expression("e**(x)").unwrap();
        let SymExpr::Pow(base, _) = &expr else {
            panic!("expected power, got {expr}");
        };
        assert_eq!(**base, SymExpr::Const(Constant::E));
        assert!(expr.free_symbols().contains("x"));
        assert!(!expr.free_symbols().contains("e"));
        assert_eq!(parse("2e"), "2*E");
    }

    #[test]
    fn test_equation() {
        let statement = parse_statement("x**(2)+5x+6=0").unwrap();
        let Statement::Equation(lhs, rhs) = statement else {
            panic!("expected equation");
        };
        assert_eq!(lhs.free_symbols().len(), 1);
        assert!(rhs.is_zero());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_statement("x+"), Err(SymbolicError::UnexpectedEnd)));
        assert!(matches!(
            parse_statement("a=b=c"),
            Err(SymbolicError::MultipleRelations)
        ));
        assert!(matches!(
            parse_statement("x#2"),
            Err(SymbolicError::InvalidCharacter { character: '#', .. })
        ));
        assert!(parse_statement("(x").is_err());
        assert!(parse_statement("1.2.3").is_err());
        assert!(parse_expression("x=1").is_err());
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("pix"), vec!["pi", "x"]);
        assert_eq!(split_identifier("xsin"), vec!["x", "sin"]);
        assert_eq!(split_identifier("abc"), vec!["a", "b", "c"]);
    }
}
