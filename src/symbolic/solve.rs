//! Exact solutions of linear and quadratic equations in one variable.

use crate::symbolic::SymbolicError;
use crate::symbolic::expr::{Function, SymExpr, SymbolicExpression};
use crate::symbolic::poly::UnivariatePoly;
use crate::symbolic::rational::{Rational, isqrt};
use crate::symbolic::simplify::canonicalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Largest trial divisor used when pulling square factors out of a radicand.
const MAX_TRIAL_DIVISOR: i64 = 1_000_000;

/// Outcome of solving an equation for each of its variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub solvable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equation: Option<String>,
    pub variables: Vec<String>,
    /// Roots per variable, ascending. An empty list means no real root.
    pub solutions: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SolveReport {
    fn failure(
        equation: Option<String>,
        variables: Vec<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            solvable: false,
            equation,
            variables,
            solutions: BTreeMap::new(),
            error: Some(error.into()),
        }
    }
}

/// Solve `lhs = rhs` for every free variable in which it is a polynomial of
/// degree at most two.
pub fn solve_equation(expression: &SymbolicExpression) -> SolveReport {
    let (lhs, rhs) = match expression {
        SymbolicExpression::Equation { lhs, rhs } => (lhs, rhs),
        SymbolicExpression::Expr(_) => {
            return SolveReport::failure(None, Vec::new(), "no equation found (missing = sign)");
        }
        SymbolicExpression::Unparseable(marker) => {
            return SolveReport::failure(
                None,
                Vec::new(),
                format!("could not parse equation sides ({marker})"),
            );
        }
    };

    let equation = expression.to_string();
    let variables: Vec<String> = expression.free_symbols().into_iter().collect();
    if variables.is_empty() {
        return SolveReport::failure(Some(equation), variables, "no variables found in equation");
    }

    let difference = canonicalize(SymExpr::sub(lhs.clone(), rhs.clone()));
    let mut solutions = BTreeMap::new();
    let mut last_error = None;
    for var in &variables {
        match solve_for(&difference, var) {
            Ok(roots) => {
                solutions.insert(var.clone(), roots);
            }
            Err(err) => {
                debug!(variable = %var, error = %err, "equation not solvable for variable");
                last_error = Some(format!("could not solve for {var}: {err}"));
            }
        }
    }

    if solutions.is_empty() {
        let error = last_error.unwrap_or_else(|| "could not solve equation".to_string());
        return SolveReport::failure(Some(equation), variables, error);
    }
    SolveReport {
        solvable: true,
        equation: Some(equation),
        variables,
        solutions,
        error: None,
    }
}

fn solve_for(expr: &SymExpr, var: &str) -> Result<Vec<String>, SymbolicError> {
    let poly = UnivariatePoly::from_expr(expr, var)?;
    match poly.degree() {
        None | Some(0) => Ok(Vec::new()),
        Some(1) => {
            let root = poly
                .coeff(0)
                .checked_neg()
                .and_then(|n| n.checked_div(poly.coeff(1)))
                .ok_or(SymbolicError::NumericOverflow)?;
            Ok(vec![root.to_string()])
        }
        Some(2) => solve_quadratic(poly.coeff(2), poly.coeff(1), poly.coeff(0)),
        Some(d) => Err(SymbolicError::InvalidOperation(format!(
            "degree {d} equations are not supported"
        ))),
    }
}

fn solve_quadratic(a: Rational, b: Rational, c: Rational) -> Result<Vec<String>, SymbolicError> {
    let overflow = || SymbolicError::NumericOverflow;
    let two_a = a.checked_mul(Rational::int(2)).ok_or_else(overflow)?;
    let discriminant = b
        .checked_mul(b)
        .zip(a.checked_mul(c).and_then(|ac| ac.checked_mul(Rational::int(4))))
        .and_then(|(bb, four_ac)| bb.checked_sub(four_ac))
        .ok_or_else(overflow)?;

    if discriminant.is_negative() {
        return Ok(Vec::new());
    }
    let center = b
        .checked_neg()
        .and_then(|nb| nb.checked_div(two_a))
        .ok_or_else(overflow)?;

    if let Some(root) = discriminant.exact_sqrt() {
        let offset = root
            .checked_div(two_a)
            .and_then(Rational::abs)
            .ok_or_else(overflow)?;
        let low = center.checked_sub(offset).ok_or_else(overflow)?;
        let high = center.checked_add(offset).ok_or_else(overflow)?;
        let mut roots = vec![low.to_string()];
        if high != low {
            roots.push(high.to_string());
        }
        return Ok(roots);
    }

    // sqrt(p/q) = sqrt(p*q)/q, then sqrt(k^2 * m) = k*sqrt(m).
    let radicand = discriminant
        .numer()
        .checked_mul(discriminant.denom())
        .ok_or_else(overflow)?;
    let (outer, inner) = split_square_factor(radicand);
    let scale = Rational::new(outer, discriminant.denom())
        .and_then(|r| r.checked_div(two_a))
        .and_then(Rational::abs)
        .ok_or_else(overflow)?;
    let neg_scale = scale.checked_neg().ok_or_else(overflow)?;

    let radical = SymExpr::func(Function::Sqrt, SymExpr::int(inner));
    Ok([neg_scale, scale]
        .into_iter()
        .map(|coeff| {
            let term = SymExpr::Mul(vec![SymExpr::Num(coeff), radical.clone()]);
            if center.is_zero() {
                term.to_string()
            } else {
                SymExpr::Add(vec![SymExpr::Num(center), term]).to_string()
            }
        })
        .collect())
}

/// Write `n` as `k^2 * m`, returning `(k, m)`.
fn split_square_factor(n: i64) -> (i64, i64) {
    let mut outer = 1;
    let mut inner = n;
    let limit = isqrt(n).min(MAX_TRIAL_DIVISOR);
    let mut f = 2;
    while f <= limit {
        let square = f * f;
        if square > inner {
            break;
        }
        while inner % square == 0 {
            inner /= square;
            outer *= f;
        }
        f += 1;
    }
    (outer, inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::translator::SymbolicTranslator;

    fn solve(markup: &str) -> SolveReport {
        solve_equation(&SymbolicTranslator::default().translate(markup))
    }

    #[test]
    fn test_quadratic_with_rational_roots() {
        let report = solve("x^{2} + 5x + 6 = 0");
        assert!(report.solvable);
        assert_eq!(report.solutions["x"], vec!["-3", "-2"]);
        assert_eq!(report.equation.as_deref(), Some("Eq(x**2 + 5*x + 6, 0)"));
    }

    #[test]
    fn test_linear() {
        let report = solve("2x + 3 = 7");
        assert_eq!(report.solutions["x"], vec!["2"]);
        let report = solve(r"\frac{x}{3} = 1");
        assert_eq!(report.solutions["x"], vec!["3"]);
    }

    #[test]
    fn test_irrational_and_complex_roots() {
        let report = solve("x^{2} + 5x + 3 = 0");
        assert_eq!(
            report.solutions["x"],
            vec!["-5/2 - sqrt(13)/2", "-5/2 + sqrt(13)/2"]
        );
        let report = solve("x^{2} = 8");
        assert_eq!(report.solutions["x"], vec!["-2*sqrt(2)", "2*sqrt(2)"]);
        let report = solve("x^{2} + 1 = 0");
        assert!(report.solvable);
        assert!(report.solutions["x"].is_empty());
    }

    #[test]
    fn test_double_root() {
        let report = solve("x^{2} - 2x + 1 = 0");
        assert_eq!(report.solutions["x"], vec!["1"]);
    }

    #[test]
    fn test_unsolvable_inputs() {
        let report = solve("x + 1");
        assert!(!report.solvable);
        assert!(report.error.unwrap().contains("missing = sign"));

        let report = solve(r"\frac{3}{4} + \frac{1}{2} = \frac{5}{4}");
        assert!(!report.solvable);
        assert!(report.variables.is_empty());

        let report = solve(r"\sin{x} = 0");
        assert!(!report.solvable);
        assert_eq!(report.variables, vec!["x"]);

        let report = solve("");
        assert!(!report.solvable);
    }

    #[test]
    fn test_square_factor_split() {
        assert_eq!(split_square_factor(8), (2, 2));
        assert_eq!(split_square_factor(13), (1, 13));
        assert_eq!(split_square_factor(72), (6, 2));
    }
}
