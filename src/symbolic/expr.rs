//! Expression tree for validated math markup.
//!
//! Subtraction is represented as `a + (-1)*b` and division as `a * b^(-1)`,
//! so the tree only needs sums, products and powers.

use crate::symbolic::rational::Rational;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Named single-argument functions understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Log,
    Ln,
    Sqrt,
    Exp,
}

impl Function {
    pub const ALL: [Function; 7] = [
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Log,
        Function::Ln,
        Function::Sqrt,
        Function::Exp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Log => "log",
            Function::Ln => "ln",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn is_trigonometric(&self) -> bool {
        matches!(self, Function::Sin | Function::Cos | Function::Tan)
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self, Function::Log | Function::Ln | Function::Exp)
    }
}

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    Pi,
    /// Euler's number, written `e` in markup.
    E,
}

impl Constant {
    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }
}

/// A node of the symbolic expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymExpr {
    Num(Rational),
    Const(Constant),
    Sym(String),
    Add(Vec<SymExpr>),
    Mul(Vec<SymExpr>),
    Pow(Box<SymExpr>, Box<SymExpr>),
    Func(Function, Box<SymExpr>),
}

impl SymExpr {
    pub fn int(n: i64) -> Self {
        SymExpr::Num(Rational::int(n))
    }

    pub fn sym(name: impl Into<String>) -> Self {
        SymExpr::Sym(name.into())
    }

    pub fn pow(base: SymExpr, exp: SymExpr) -> Self {
        SymExpr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn func(function: Function, arg: SymExpr) -> Self {
        SymExpr::Func(function, Box::new(arg))
    }

    pub fn neg(expr: SymExpr) -> Self {
        SymExpr::Mul(vec![SymExpr::Num(Rational::NEG_ONE), expr])
    }

    pub fn sub(lhs: SymExpr, rhs: SymExpr) -> Self {
        SymExpr::Add(vec![lhs, SymExpr::neg(rhs)])
    }

    pub fn div(lhs: SymExpr, rhs: SymExpr) -> Self {
        SymExpr::Mul(vec![lhs, SymExpr::pow(rhs, SymExpr::Num(Rational::NEG_ONE))])
    }

    pub fn as_num(&self) -> Option<Rational> {
        match self {
            SymExpr::Num(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_num().is_some_and(|r| r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        self.as_num().is_some_and(|r| r.is_one())
    }

    /// Names of all symbols in the tree.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let SymExpr::Sym(name) = node {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Numeric atoms (including named constants) as display strings.
    pub fn numeric_atoms(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| match node {
            SymExpr::Num(r) => {
                out.insert(r.to_string());
            }
            SymExpr::Const(c) => {
                out.insert(c.name().to_string());
            }
            _ => {}
        });
        out
    }

    /// True when any function node satisfies the predicate.
    pub fn has_function(&self, pred: impl Fn(Function) -> bool) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            if let SymExpr::Func(f, _) = node
                && pred(*f)
            {
                found = true;
            }
        });
        found
    }

    pub fn is_constant(&self) -> bool {
        self.free_symbols().is_empty()
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut impl FnMut(&SymExpr)) {
        f(self);
        match self {
            SymExpr::Add(items) | SymExpr::Mul(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            SymExpr::Pow(base, exp) => {
                base.visit(f);
                exp.visit(f);
            }
            SymExpr::Func(_, arg) => arg.visit(f),
            SymExpr::Num(_) | SymExpr::Const(_) | SymExpr::Sym(_) => {}
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            SymExpr::Add(_) => 1,
            SymExpr::Mul(_) => 2,
            SymExpr::Num(r) if r.is_negative() || !r.is_integer() => 2,
            SymExpr::Pow(_, _) => 3,
            _ => 4,
        }
    }

    fn fmt_wrapped(&self, min_precedence: u8) -> String {
        if self.precedence() < min_precedence {
            format!("({self})")
        } else {
            self.to_string()
        }
    }

    /// Leading sign of a term, used when printing sums.
    fn split_sign(&self) -> Option<SymExpr> {
        match self {
            SymExpr::Num(r) if r.is_negative() => r.checked_neg().map(SymExpr::Num),
            SymExpr::Mul(items) => {
                let (first, rest) = items.split_first()?;
                let coeff = first.as_num().filter(|r| r.is_negative())?;
                let positive = coeff.checked_neg()?;
                let mut factors = Vec::with_capacity(items.len());
                if !positive.is_one() {
                    factors.push(SymExpr::Num(positive));
                }
                factors.extend(rest.iter().cloned());
                Some(match factors.len() {
                    1 => factors.remove(0),
                    _ => SymExpr::Mul(factors),
                })
            }
            _ => None,
        }
    }

    fn fmt_product(items: &[SymExpr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut numer: Vec<String> = Vec::new();
        let mut denom: Vec<String> = Vec::new();
        let mut negative = false;

        for item in items {
            match item {
                SymExpr::Num(r) => {
                    negative ^= r.is_negative();
                    let n = r.numer().unsigned_abs();
                    if n != 1 {
                        numer.push(n.to_string());
                    }
                    if r.denom() != 1 {
                        denom.push(r.denom().to_string());
                    }
                }
                SymExpr::Pow(base, exp) if exp.as_num().is_some_and(|e| e.is_negative()) => {
                    let positive = exp.as_num().and_then(|e| e.checked_neg());
                    match positive {
                        Some(p) if p.is_one() => denom.push(base.fmt_wrapped(3)),
                        Some(p) => denom.push(format!(
                            "{}**{}",
                            base.fmt_wrapped(4),
                            SymExpr::Num(p).fmt_wrapped(4)
                        )),
                        None => numer.push(item.fmt_wrapped(2)),
                    }
                }
                other => numer.push(other.fmt_wrapped(2)),
            }
        }

        if negative {
            write!(f, "-")?;
        }
        if numer.is_empty() {
            write!(f, "1")?;
        } else {
            write!(f, "{}", numer.join("*"))?;
        }
        match denom.len() {
            0 => Ok(()),
            1 => write!(f, "/{}", denom[0]),
            _ => write!(f, "/({})", denom.join("*")),
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Num(r) => write!(f, "{r}"),
            SymExpr::Const(c) => write!(f, "{}", c.name()),
            SymExpr::Sym(name) => write!(f, "{name}"),
            SymExpr::Add(items) => {
                if items.is_empty() {
                    return write!(f, "0");
                }
                for (i, term) in items.iter().enumerate() {
                    match (i, term.split_sign()) {
                        (0, Some(abs)) => write!(f, "-{}", abs.fmt_wrapped(2))?,
                        (0, None) => write!(f, "{term}")?,
                        (_, Some(abs)) => write!(f, " - {}", abs.fmt_wrapped(2))?,
                        (_, None) => write!(f, " + {term}")?,
                    }
                }
                Ok(())
            }
            SymExpr::Mul(items) => {
                if items.is_empty() {
                    return write!(f, "1");
                }
                SymExpr::fmt_product(items, f)
            }
            SymExpr::Pow(base, exp) => {
                if let Some(e) = exp.as_num()
                    && e.is_negative()
                {
                    return SymExpr::fmt_product(std::slice::from_ref(self), f);
                }
                write!(f, "{}**{}", base.fmt_wrapped(4), exp.fmt_wrapped(4))
            }
            SymExpr::Func(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

/// Placeholder produced when markup cannot be turned into an expression.
///
/// Displays as (and parses back from) its symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparseableMarker {
    /// Cleaned markup fell outside the accepted length window.
    ComplexExpression,
    /// The parser rejected the cleaned markup.
    UnparseableExpression,
    /// An array body was found but none of its cells parsed.
    ComplexArrayExpression,
    /// Array markup without an extractable body.
    ArrayExpression,
}

impl UnparseableMarker {
    pub const ALL: [UnparseableMarker; 4] = [
        UnparseableMarker::ComplexExpression,
        UnparseableMarker::UnparseableExpression,
        UnparseableMarker::ComplexArrayExpression,
        UnparseableMarker::ArrayExpression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UnparseableMarker::ComplexExpression => "complex_expression",
            UnparseableMarker::UnparseableExpression => "unparseable_expression",
            UnparseableMarker::ComplexArrayExpression => "complex_array_expression",
            UnparseableMarker::ArrayExpression => "array_expression",
        }
    }
}

impl fmt::Display for UnparseableMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnparseableMarker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown marker '{s}'"))
    }
}

/// Result of translating canonical markup.
///
/// Never absent: translation failure is the `Unparseable` variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicExpression {
    Expr(SymExpr),
    Equation { lhs: SymExpr, rhs: SymExpr },
    Unparseable(UnparseableMarker),
}

impl SymbolicExpression {
    pub fn is_unparseable(&self) -> bool {
        matches!(self, SymbolicExpression::Unparseable(_))
    }

    /// Free symbols of the expression, or of both sides of an equation.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        match self {
            SymbolicExpression::Expr(e) => e.free_symbols(),
            SymbolicExpression::Equation { lhs, rhs } => {
                lhs.free_symbols().union(&rhs.free_symbols()).cloned().collect()
            }
            SymbolicExpression::Unparseable(_) => BTreeSet::new(),
        }
    }
}

impl fmt::Display for SymbolicExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicExpression::Expr(e) => write!(f, "{e}"),
            SymbolicExpression::Equation { lhs, rhs } => write!(f, "Eq({lhs}, {rhs})"),
            SymbolicExpression::Unparseable(marker) => write!(f, "{marker}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SymExpr {
        SymExpr::sym("x")
    }

    #[test]
    fn test_display_polynomial() {
        let expr = SymExpr::Add(vec![
            SymExpr::pow(x(), SymExpr::int(2)),
            SymExpr::Mul(vec![SymExpr::int(5), x()]),
            SymExpr::int(6),
        ]);
        assert_eq!(expr.to_string(), "x**2 + 5*x + 6");
    }

    #[test]
    fn test_display_negative_terms_and_fractions() {
        let expr = SymExpr::Add(vec![x(), SymExpr::Mul(vec![SymExpr::int(-3), x()])]);
        assert_eq!(expr.to_string(), "x - 3*x");

        let half_x = SymExpr::Mul(vec![SymExpr::Num(Rational::new(1, 2).unwrap()), x()]);
        assert_eq!(half_x.to_string(), "x/2");

        let inv = SymExpr::pow(x(), SymExpr::int(-1));
        assert_eq!(inv.to_string(), "1/x");
    }

    #[test]
    fn test_display_function_and_equation() {
        let eq = SymbolicExpression::Equation {
            lhs: SymExpr::func(Function::Sin, x()),
            rhs: SymExpr::int(0),
        };
        assert_eq!(eq.to_string(), "Eq(sin(x), 0)");
    }

    #[test]
    fn test_free_symbols_and_atoms() {
        let expr = SymExpr::Add(vec![
            SymExpr::Mul(vec![SymExpr::int(2), SymExpr::sym("y")]),
            x(),
            SymExpr::Const(Constant::Pi),
        ]);
        let symbols: Vec<_> = expr.free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["x".to_string(), "y".to_string()]);
        assert!(expr.numeric_atoms().contains("pi"));
        assert!(expr.numeric_atoms().contains("2"));

        let growth = SymExpr::pow(SymExpr::Const(Constant::E), x());
        assert_eq!(growth.to_string(), "E**x");
        assert_eq!(growth.free_symbols().len(), 1);
        assert!(growth.numeric_atoms().contains("E"));
    }

    #[test]
    fn test_marker_round_trip() {
        for marker in UnparseableMarker::ALL {
            let text = marker.to_string();
            assert_eq!(text.parse::<UnparseableMarker>().unwrap(), marker);
            let json = serde_json::to_string(&marker).unwrap();
            assert_eq!(json, format!("\"{text}\""));
            let back: UnparseableMarker = serde_json::from_str(&json).unwrap();
            assert_eq!(back, marker);
        }
        assert!("nonsense".parse::<UnparseableMarker>().is_err());
    }

    #[test]
    fn test_function_lookup() {
        assert_eq!(Function::from_name("ln"), Some(Function::Ln));
        assert!(Function::Tan.is_trigonometric());
        assert!(Function::Exp.is_exponential());
        assert_eq!(Function::from_name("sinh"), None);
    }
}
