//! Polynomial views of expression trees.

use crate::symbolic::SymbolicError;
use crate::symbolic::expr::SymExpr;
use crate::symbolic::rational::Rational;
use std::collections::BTreeMap;

/// Largest degree a polynomial view may reach.
const MAX_DEGREE: u32 = 64;

/// True when the expression is a polynomial in its free symbols.
pub fn is_polynomial(expr: &SymExpr) -> bool {
    match expr {
        SymExpr::Num(_) | SymExpr::Const(_) | SymExpr::Sym(_) => true,
        SymExpr::Add(items) | SymExpr::Mul(items) => items.iter().all(is_polynomial),
        SymExpr::Pow(base, exp) => {
            if base.is_constant() && exp.is_constant() {
                return true;
            }
            let non_negative_int = exp
                .as_num()
                .is_some_and(|e| e.is_integer() && !e.is_negative());
            non_negative_int && is_polynomial(base)
        }
        SymExpr::Func(_, arg) => arg.is_constant(),
    }
}

/// True when the expression is a ratio of polynomials.
pub fn is_rational_function(expr: &SymExpr) -> bool {
    match expr {
        SymExpr::Num(_) | SymExpr::Const(_) | SymExpr::Sym(_) => true,
        SymExpr::Add(items) | SymExpr::Mul(items) => items.iter().all(is_rational_function),
        SymExpr::Pow(base, exp) => {
            if base.is_constant() && exp.is_constant() {
                return true;
            }
            exp.as_num().is_some_and(|e| e.is_integer()) && is_rational_function(base)
        }
        SymExpr::Func(_, arg) => arg.is_constant(),
    }
}

/// Degree in `var` read off the tree structure, without expanding.
///
/// Returns `None` when the expression is not polynomial in `var`.
pub fn structural_degree(expr: &SymExpr, var: &str) -> Option<u32> {
    match expr {
        SymExpr::Num(_) | SymExpr::Const(_) => Some(0),
        SymExpr::Sym(name) => Some(u32::from(name == var)),
        SymExpr::Add(items) => items
            .iter()
            .map(|i| structural_degree(i, var))
            .try_fold(0u32, |acc, d| d.map(|d| acc.max(d))),
        SymExpr::Mul(items) => items
            .iter()
            .map(|i| structural_degree(i, var))
            .try_fold(0u32, |acc, d| acc.checked_add(d?)),
        SymExpr::Pow(base, exp) => {
            let base_degree = structural_degree(base, var)?;
            if base_degree == 0 && !exp.free_symbols().contains(var) {
                return Some(0);
            }
            let n = exp.as_num()?.as_integer()?;
            base_degree.checked_mul(u32::try_from(n).ok()?)
        }
        SymExpr::Func(_, arg) => (!arg.free_symbols().contains(var)).then_some(0),
    }
}

/// Dense view of a polynomial in one variable with exact coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct UnivariatePoly {
    var: String,
    coeffs: BTreeMap<u32, Rational>,
}

impl UnivariatePoly {
    fn constant(var: &str, value: Rational) -> Self {
        let mut coeffs = BTreeMap::new();
        if !value.is_zero() {
            coeffs.insert(0, value);
        }
        Self {
            var: var.to_string(),
            coeffs,
        }
    }

    fn monomial(var: &str) -> Self {
        Self {
            var: var.to_string(),
            coeffs: BTreeMap::from([(1, Rational::ONE)]),
        }
    }

    /// Build the view. Fails for other symbols, named constants, functions of
    /// the variable and non-integer powers.
    pub fn from_expr(expr: &SymExpr, var: &str) -> Result<Self, SymbolicError> {
        let not_poly = || SymbolicError::InvalidOperation(format!("not a polynomial in {var}"));
        match expr {
            SymExpr::Num(r) => Ok(Self::constant(var, *r)),
            SymExpr::Sym(name) if name == var => Ok(Self::monomial(var)),
            SymExpr::Add(items) => items
                .iter()
                .try_fold(Self::constant(var, Rational::ZERO), |acc, item| {
                    acc.add(&Self::from_expr(item, var)?)
                }),
            SymExpr::Mul(items) => items
                .iter()
                .try_fold(Self::constant(var, Rational::ONE), |acc, item| {
                    acc.mul(&Self::from_expr(item, var)?)
                }),
            SymExpr::Pow(base, exp) => {
                let n = exp
                    .as_num()
                    .and_then(|e| e.as_integer())
                    .filter(|n| *n >= 0)
                    .ok_or_else(not_poly)?;
                let base = Self::from_expr(base, var)?;
                base.pow(n)
            }
            SymExpr::Func(_, arg) if arg.is_constant() => {
                match crate::symbolic::canonicalize(expr.clone()) {
                    SymExpr::Num(r) => Ok(Self::constant(var, r)),
                    _ => Err(not_poly()),
                }
            }
            _ => Err(not_poly()),
        }
    }

    fn add(&self, other: &Self) -> Result<Self, SymbolicError> {
        let mut coeffs = self.coeffs.clone();
        for (&d, &c) in &other.coeffs {
            let entry = coeffs.entry(d).or_insert(Rational::ZERO);
            *entry = entry.checked_add(c).ok_or(SymbolicError::NumericOverflow)?;
        }
        coeffs.retain(|_, c| !c.is_zero());
        Ok(Self {
            var: self.var.clone(),
            coeffs,
        })
    }

    fn mul(&self, other: &Self) -> Result<Self, SymbolicError> {
        let mut coeffs: BTreeMap<u32, Rational> = BTreeMap::new();
        for (&d1, &c1) in &self.coeffs {
            for (&d2, &c2) in &other.coeffs {
                let degree = d1 + d2;
                if degree > MAX_DEGREE {
                    return Err(SymbolicError::InvalidOperation(format!(
                        "degree exceeds {MAX_DEGREE}"
                    )));
                }
                let product = c1.checked_mul(c2).ok_or(SymbolicError::NumericOverflow)?;
                let entry = coeffs.entry(degree).or_insert(Rational::ZERO);
                *entry = entry.checked_add(product).ok_or(SymbolicError::NumericOverflow)?;
            }
        }
        coeffs.retain(|_, c| !c.is_zero());
        Ok(Self {
            var: self.var.clone(),
            coeffs,
        })
    }

    /// Constant bases fold exactly; otherwise square-and-multiply, refusing
    /// exponents that must push the degree past `MAX_DEGREE`.
    fn pow(&self, n: i64) -> Result<Self, SymbolicError> {
        if self.degree().is_none_or(|d| d == 0) {
            let value = self
                .coeff(0)
                .checked_pow(n)
                .ok_or(SymbolicError::NumericOverflow)?;
            return Ok(Self::constant(&self.var, value));
        }
        if n > i64::from(MAX_DEGREE) {
            return Err(SymbolicError::InvalidOperation(format!(
                "degree exceeds {MAX_DEGREE}"
            )));
        }
        let mut result = Self::constant(&self.var, Rational::ONE);
        let mut square = self.clone();
        let mut rest = n;
        while rest > 0 {
            if rest & 1 == 1 {
                result = result.mul(&square)?;
            }
            rest >>= 1;
            if rest > 0 {
                square = square.mul(&square)?;
            }
        }
        Ok(result)
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    /// Degree of the polynomial; `None` for the zero polynomial.
    pub fn degree(&self) -> Option<u32> {
        self.coeffs.keys().next_back().copied()
    }

    /// Coefficient of `var^degree`.
    pub fn coeff(&self, degree: u32) -> Rational {
        self.coeffs.get(&degree).copied().unwrap_or(Rational::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parser::parse_expression;

    fn parse(text: &str) -> SymExpr {
        parse_expression(text).unwrap()
    }

    #[test]
    fn test_polynomial_predicates() {
        assert!(is_polynomial(&parse("x**2+5x+6")));
        assert!(is_polynomial(&parse("2**3*x")));
        assert!(!is_polynomial(&parse("1/x")));
        assert!(!is_polynomial(&parse("sin(x)")));
        assert!(is_rational_function(&parse("1/(x+1)")));
        assert!(!is_rational_function(&parse("sqrt(x)")));
        assert!(!is_rational_function(&parse("x**y")));
    }

    #[test]
    fn test_univariate_view() {
        let poly = UnivariatePoly::from_expr(&parse("(x+1)*(x+2)"), "x").unwrap();
        assert_eq!(poly.degree(), Some(2));
        assert_eq!(poly.coeff(1), Rational::int(3));
        assert_eq!(poly.coeff(0), Rational::int(2));

        let zero = UnivariatePoly::from_expr(&parse("x-x"), "x").unwrap();
        assert_eq!(zero.degree(), None);

        assert!(UnivariatePoly::from_expr(&parse("x*y"), "x").is_err());
        assert!(UnivariatePoly::from_expr(&parse("pi*x"), "x").is_err());
    }

    #[test]
    fn test_power_of_constant_base_folds() {
        let poly = UnivariatePoly::from_expr(&parse("x + 1**999999999999"), "x").unwrap();
        assert_eq!(poly.degree(), Some(1));
        assert_eq!(poly.coeff(0), Rational::ONE);

        let sign = UnivariatePoly::from_expr(&parse("(-1)**999999999999*x"), "x").unwrap();
        assert_eq!(sign.coeff(1), Rational::NEG_ONE);

        let zero = UnivariatePoly::from_expr(&parse("0**12345678901"), "x").unwrap();
        assert_eq!(zero.degree(), None);
        assert!(UnivariatePoly::from_expr(&parse("2**999999999999"), "x").is_err());
    }

    #[test]
    fn test_power_of_variable_base() {
        let cube = UnivariatePoly::from_expr(&parse("(x+1)**3"), "x").unwrap();
        assert_eq!(cube.degree(), Some(3));
        assert_eq!(cube.coeff(2), Rational::int(3));
        assert_eq!(cube.coeff(0), Rational::ONE);

        let max = UnivariatePoly::from_expr(&parse("x**64"), "x").unwrap();
        assert_eq!(max.degree(), Some(64));
        assert!(UnivariatePoly::from_expr(&parse("x**999999999999"), "x").is_err());
        assert!(UnivariatePoly::from_expr(&parse("(x+1)**65"), "x").is_err());
    }

    #[test]
    fn test_structural_degree() {
        assert_eq!(structural_degree(&parse("pi*x**3+x"), "x"), Some(3));
        assert_eq!(structural_degree(&parse("sin(x)"), "x"), None);
        assert_eq!(structural_degree(&parse("sin(y)*x"), "x"), Some(1));
    }
}
