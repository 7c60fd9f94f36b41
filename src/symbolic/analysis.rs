//! Structural classification of symbolic expressions.

use crate::symbolic::expr::{Constant, Function, SymExpr, SymbolicExpression};
use crate::symbolic::poly::{
    UnivariatePoly, is_polynomial, is_rational_function, structural_degree,
};
use crate::symbolic::simplify::canonicalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Primary class of an expression, decided in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Constant,
    Variable,
    Sum,
    Product,
    Power,
    Trigonometric,
    Exponential,
    Polynomial,
    Rational,
    General,
    Equation,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Constant => "constant",
            Classification::Variable => "variable",
            Classification::Sum => "sum",
            Classification::Product => "product",
            Classification::Power => "power",
            Classification::Trigonometric => "trigonometric",
            Classification::Exponential => "exponential",
            Classification::Polynomial => "polynomial",
            Classification::Rational => "rational",
            Classification::General => "general",
            Classification::Equation => "equation",
        };
        f.write_str(name)
    }
}

/// Special-form flags, reported independently of the classification.
pub const FORM_TRIGONOMETRIC: &str = "trigonometric";
pub const FORM_EXPONENTIAL: &str = "exponential/logarithmic";
pub const FORM_RADICAL: &str = "radical";

/// Read-only structural summary of an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(rename = "type")]
    pub classification: Classification,
    pub variables: BTreeSet<String>,
    pub constants: BTreeSet<String>,
    /// Present only for polynomials in exactly one variable.
    pub degree: Option<u32>,
    pub is_polynomial: bool,
    #[serde(rename = "is_rational")]
    pub is_rational_function: bool,
    pub special_forms: BTreeSet<String>,
}

/// Analyze a translated expression.
///
/// Returns `None` for the unparseable marker. Equations are classified as
/// [`Classification::Equation`]; their properties describe `lhs - rhs`.
pub fn analyze(expression: &SymbolicExpression) -> Option<AnalysisReport> {
    match expression {
        SymbolicExpression::Unparseable(_) => None,
        SymbolicExpression::Expr(expr) => Some(analyze_expr(expr, classify(expr))),
        SymbolicExpression::Equation { lhs, rhs } => {
            let difference = canonicalize(SymExpr::sub(lhs.clone(), rhs.clone()));
            Some(analyze_expr(&difference, Classification::Equation))
        }
    }
}

/// Decision order: constant, symbol, sum, product, power, trigonometric,
/// exponential, polynomial, rational, general.
pub fn classify(expr: &SymExpr) -> Classification {
    if expr.is_constant() {
        return Classification::Constant;
    }
    match expr {
        SymExpr::Sym(_) => Classification::Variable,
        SymExpr::Add(_) => Classification::Sum,
        SymExpr::Mul(_) => Classification::Product,
        SymExpr::Pow(base, _) if is_euler(base) => Classification::Exponential,
        SymExpr::Pow(_, _) | SymExpr::Func(Function::Sqrt, _) => Classification::Power,
        _ if expr.has_function(|f| f.is_trigonometric()) => Classification::Trigonometric,
        _ if expr.has_function(|f| f.is_exponential()) => Classification::Exponential,
        _ if is_polynomial(expr) => Classification::Polynomial,
        _ if is_rational_function(expr) => Classification::Rational,
        _ => Classification::General,
    }
}

fn analyze_expr(expr: &SymExpr, classification: Classification) -> AnalysisReport {
    let variables = expr.free_symbols();
    let polynomial = is_polynomial(expr);
    let degree = match variables.iter().next() {
        Some(var) if polynomial && variables.len() == 1 => polynomial_degree(expr, var),
        _ => None,
    };

    AnalysisReport {
        classification,
        constants: expr.numeric_atoms(),
        degree,
        is_polynomial: polynomial,
        is_rational_function: is_rational_function(expr),
        special_forms: special_forms(expr),
        variables,
    }
}

fn polynomial_degree(expr: &SymExpr, var: &str) -> Option<u32> {
    match UnivariatePoly::from_expr(expr, var) {
        Ok(poly) => Some(poly.degree().unwrap_or(0)),
        Err(_) => structural_degree(expr, var),
    }
}

fn special_forms(expr: &SymExpr) -> BTreeSet<String> {
    let mut forms = BTreeSet::new();
    if expr.has_function(|f| f.is_trigonometric()) {
        forms.insert(FORM_TRIGONOMETRIC.to_string());
    }
    if expr.has_function(|f| f.is_exponential()) || has_euler_power(expr) {
        forms.insert(FORM_EXPONENTIAL.to_string());
    }
    if expr.has_function(|f| f == Function::Sqrt) || has_fractional_power(expr) {
        forms.insert(FORM_RADICAL.to_string());
    }
    forms
}

fn is_euler(expr: &SymExpr) -> bool {
    matches!(expr, SymExpr::Const(Constant::E))
}

/// `E**(...)` anywhere in the tree.
fn has_euler_power(expr: &SymExpr) -> bool {
    let mut found = false;
    expr.visit(&mut |node| {
        if let SymExpr::Pow(base, _) = node
            && is_euler(base)
        {
            found = true;
        }
    });
    found
}

fn has_fractional_power(expr: &SymExpr) -> bool {
    let mut found = false;
    expr.visit(&mut |node| {
        if let SymExpr::Pow(_, exp) = node
            && exp.as_num().is_some_and(|e| !e.is_integer())
        {
            found = true;
        }
    });
    found
}
