//! Staged normalization of expression trees.
//!
//! A pipeline is an ordered list of [`NormPass`]es that is re-applied until the
//! tree stops changing. The default pipeline mirrors automatic evaluation of a
//! computer-algebra system (constant folding, like-term collection); the
//! aggressive pipeline additionally expands products of sums whose expansion
//! stays small.

use crate::symbolic::expr::{Function, SymExpr};
use crate::symbolic::rational::Rational;
use itertools::Itertools;
use std::cmp::Reverse;

/// Upper bound on pipeline repetitions.
const MAX_ROUNDS: usize = 12;

/// Largest exponent expanded by [`NormPass::Expand`].
const MAX_EXPAND_POWER: i64 = 8;

/// A single rewrite pass over the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormPass {
    /// Flatten nested sums and products.
    Flatten,
    /// Fold numeric sub-expressions.
    MergeConstants,
    /// Drop `+ 0`, `* 1` and collapse singleton sums and products.
    RemoveIdentity,
    /// `x^0 = 1`, `x^1 = x`, `(x^a)^n = x^(a*n)`, `(a*b)^n = a^n * b^n`.
    SimplifyPowers,
    /// `2*x + 3*x = 5*x`, `x * x^2 = x^3`.
    CollectLikeTerms,
    /// Distribute products over sums.
    Expand,
    /// Canonical term and factor order.
    Sort,
}

/// Ordered list of passes applied to a fixed point.
#[derive(Debug, Clone)]
pub struct StagedNormalizer {
    passes: Vec<NormPass>,
}

impl StagedNormalizer {
    pub fn new(passes: Vec<NormPass>) -> Self {
        Self { passes }
    }

    /// Evaluation-style canonicalization without expansion.
    pub fn default_pipeline() -> Self {
        Self::new(vec![
            NormPass::Flatten,
            NormPass::MergeConstants,
            NormPass::RemoveIdentity,
            NormPass::SimplifyPowers,
            NormPass::CollectLikeTerms,
            NormPass::RemoveIdentity,
            NormPass::Sort,
        ])
    }

    /// Canonicalization plus expansion of products of sums.
    pub fn aggressive() -> Self {
        Self::new(vec![
            NormPass::Flatten,
            NormPass::MergeConstants,
            NormPass::RemoveIdentity,
            NormPass::SimplifyPowers,
            NormPass::Expand,
            NormPass::Flatten,
            NormPass::CollectLikeTerms,
            NormPass::MergeConstants,
            NormPass::RemoveIdentity,
            NormPass::Sort,
        ])
    }

    pub fn normalize(&self, expr: SymExpr) -> SymExpr {
        let mut current = expr;
        for _ in 0..MAX_ROUNDS {
            let next = self
                .passes
                .iter()
                .fold(current.clone(), |acc, pass| apply_pass(&acc, *pass));
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

impl Default for StagedNormalizer {
    fn default() -> Self {
        Self::default_pipeline()
    }
}

/// Canonical form of an expression, as produced right after parsing.
pub fn canonicalize(expr: SymExpr) -> SymExpr {
    StagedNormalizer::default_pipeline().normalize(expr)
}

/// Simplified form, expanding polynomial products.
pub fn simplify(expr: SymExpr) -> SymExpr {
    StagedNormalizer::aggressive().normalize(expr)
}

fn apply_pass(expr: &SymExpr, pass: NormPass) -> SymExpr {
    let rebuilt = map_children(expr, |child| apply_pass(child, pass));
    match pass {
        NormPass::Flatten => flatten(rebuilt),
        NormPass::MergeConstants => merge_constants(rebuilt),
        NormPass::RemoveIdentity => remove_identity(rebuilt),
        NormPass::SimplifyPowers => simplify_powers(rebuilt),
        NormPass::CollectLikeTerms => collect_like_terms(rebuilt),
        NormPass::Expand => expand(rebuilt),
        NormPass::Sort => sort_terms(rebuilt),
    }
}

fn map_children(expr: &SymExpr, f: impl Fn(&SymExpr) -> SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => SymExpr::Add(items.iter().map(&f).collect()),
        SymExpr::Mul(items) => SymExpr::Mul(items.iter().map(&f).collect()),
        SymExpr::Pow(base, exp) => SymExpr::pow(f(base), f(exp)),
        SymExpr::Func(func, arg) => SymExpr::func(*func, f(arg)),
        leaf => leaf.clone(),
    }
}

fn flatten(expr: SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => SymExpr::Add(
            items
                .into_iter()
                .flat_map(|item| match item {
                    SymExpr::Add(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        SymExpr::Mul(items) => SymExpr::Mul(
            items
                .into_iter()
                .flat_map(|item| match item {
                    SymExpr::Mul(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        other => other,
    }
}

fn merge_constants(expr: SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => fold_numeric(items, Rational::ZERO, Rational::checked_add, SymExpr::Add),
        SymExpr::Mul(items) => fold_numeric(items, Rational::ONE, Rational::checked_mul, SymExpr::Mul),
        SymExpr::Pow(base, exp) => match (base.as_num(), exp.as_num()) {
            (Some(b), Some(e)) => {
                if let Some(n) = e.as_integer()
                    && let Some(value) = b.checked_pow(n)
                {
                    return SymExpr::Num(value);
                }
                // Rational square roots of perfect squares.
                if e == half()
                    && let Some(root) = b.exact_sqrt()
                {
                    return SymExpr::Num(root);
                }
                SymExpr::Pow(base, exp)
            }
            _ => SymExpr::Pow(base, exp),
        },
        SymExpr::Func(func, arg) => match arg.as_num().and_then(|value| eval_function(func, value)) {
            Some(value) => SymExpr::Num(value),
            None => SymExpr::Func(func, arg),
        },
        other => other,
    }
}

fn half() -> Rational {
    Rational::new(1, 2).unwrap_or(Rational::ONE)
}

fn eval_function(func: Function, value: Rational) -> Option<Rational> {
    match func {
        Function::Sqrt => value.exact_sqrt(),
        Function::Sin | Function::Tan if value.is_zero() => Some(Rational::ZERO),
        Function::Cos | Function::Exp if value.is_zero() => Some(Rational::ONE),
        Function::Ln | Function::Log if value.is_one() => Some(Rational::ZERO),
        _ => None,
    }
}

fn fold_numeric(
    items: Vec<SymExpr>,
    identity: Rational,
    op: fn(Rational, Rational) -> Option<Rational>,
    rebuild: fn(Vec<SymExpr>) -> SymExpr,
) -> SymExpr {
    let (mut numbers, mut rest): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| item.as_num().is_some());
    if numbers.len() < 2 {
        numbers.extend(rest);
        return rebuild(numbers);
    }

    let folded = numbers
        .iter()
        .filter_map(SymExpr::as_num)
        .try_fold(identity, op);
    let Some(acc) = folded else {
        // Overflow: keep the numbers unfolded.
        numbers.extend(rest);
        return rebuild(numbers);
    };
    rest.insert(0, SymExpr::Num(acc));
    rebuild(rest)
}

fn remove_identity(expr: SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => {
            let mut kept: Vec<SymExpr> = items.into_iter().filter(|i| !i.is_zero()).collect();
            match kept.len() {
                0 => SymExpr::int(0),
                1 => kept.remove(0),
                _ => SymExpr::Add(kept),
            }
        }
        SymExpr::Mul(items) => {
            if items.iter().any(SymExpr::is_zero) {
                return SymExpr::int(0);
            }
            let mut kept: Vec<SymExpr> = items.into_iter().filter(|i| !i.is_one()).collect();
            match kept.len() {
                0 => SymExpr::int(1),
                1 => kept.remove(0),
                _ => SymExpr::Mul(kept),
            }
        }
        other => other,
    }
}

fn simplify_powers(expr: SymExpr) -> SymExpr {
    let SymExpr::Pow(base, exp) = expr else {
        return expr;
    };
    if exp.is_zero() {
        return SymExpr::int(1);
    }
    if exp.is_one() {
        return *base;
    }
    let Some(outer) = exp.as_num().filter(Rational::is_integer) else {
        return SymExpr::Pow(base, exp);
    };
    match *base {
        SymExpr::Pow(inner_base, inner_exp) => match inner_exp.as_num().and_then(|e| e.checked_mul(outer)) {
            Some(product) => SymExpr::pow(*inner_base, SymExpr::Num(product)),
            None => SymExpr::Pow(Box::new(SymExpr::Pow(inner_base, inner_exp)), exp),
        },
        SymExpr::Mul(factors) => SymExpr::Mul(
            factors
                .into_iter()
                .map(|factor| SymExpr::pow(factor, SymExpr::Num(outer)))
                .collect(),
        ),
        other => SymExpr::Pow(Box::new(other), exp),
    }
}

/// Split a term into its numeric coefficient and the remaining factors.
fn split_coefficient(term: &SymExpr) -> (Rational, SymExpr) {
    match term {
        SymExpr::Num(r) => (*r, SymExpr::int(1)),
        SymExpr::Mul(items) => {
            let mut coeff = Rational::ONE;
            let mut rest = Vec::with_capacity(items.len());
            for item in items {
                match item.as_num().and_then(|n| coeff.checked_mul(n)) {
                    Some(next) => coeff = next,
                    None => rest.push(item.clone()),
                }
            }
            let rest = match rest.len() {
                0 => SymExpr::int(1),
                1 => rest.remove(0),
                _ => SymExpr::Mul(rest),
            };
            (coeff, rest)
        }
        other => (Rational::ONE, other.clone()),
    }
}

fn split_power(factor: &SymExpr) -> (SymExpr, SymExpr) {
    match factor {
        SymExpr::Pow(base, exp) => ((**base).clone(), (**exp).clone()),
        other => (other.clone(), SymExpr::int(1)),
    }
}

fn collect_like_terms(expr: SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => {
            let mut groups: Vec<(SymExpr, Rational)> = Vec::new();
            let mut overflowed: Vec<SymExpr> = Vec::new();
            for item in &items {
                let (coeff, rest) = split_coefficient(item);
                match groups.iter_mut().find(|(key, _)| *key == rest) {
                    Some((_, total)) => match total.checked_add(coeff) {
                        Some(sum) => *total = sum,
                        None => overflowed.push(item.clone()),
                    },
                    None => groups.push((rest, coeff)),
                }
            }
            let mut terms: Vec<SymExpr> = groups
                .into_iter()
                .filter(|(_, coeff)| !coeff.is_zero())
                .map(|(rest, coeff)| match (coeff.is_one(), rest.is_one()) {
                    (_, true) => SymExpr::Num(coeff),
                    (true, false) => rest,
                    (false, false) => SymExpr::Mul(vec![SymExpr::Num(coeff), rest]),
                })
                .collect();
            terms.extend(overflowed);
            SymExpr::Add(terms)
        }
        SymExpr::Mul(items) => {
            let mut numbers = Vec::new();
            let mut groups: Vec<(SymExpr, Vec<SymExpr>)> = Vec::new();
            for item in items {
                if item.as_num().is_some() {
                    numbers.push(item);
                    continue;
                }
                let (base, exp) = split_power(&item);
                match groups.iter_mut().find(|(key, _)| *key == base) {
                    Some((_, exps)) => exps.push(exp),
                    None => groups.push((base, vec![exp])),
                }
            }
            let mut factors = numbers;
            for (base, mut exps) in groups {
                let exp = if exps.len() == 1 {
                    exps.remove(0)
                } else {
                    merge_constants(SymExpr::Add(exps))
                };
                factors.push(if exp.is_one() { base } else { SymExpr::pow(base, exp) });
            }
            SymExpr::Mul(factors)
        }
        other => other,
    }
}

/// Number of terms the full distribution of a product may produce. Products
/// above this stay factored.
const MAX_EXPANDED_TERMS: usize = 512;

/// Terms produced by distributing `expr`, saturating on overflow.
fn expanded_term_count(expr: &SymExpr) -> usize {
    match expr {
        SymExpr::Add(terms) => terms.len(),
        SymExpr::Mul(items) => items
            .iter()
            .map(expanded_term_count)
            .fold(1, usize::saturating_mul),
        SymExpr::Pow(base, exp) => match (base.as_ref(), exp.as_num().and_then(|e| e.as_integer())) {
            (SymExpr::Add(terms), Some(n)) if (2..=MAX_EXPAND_POWER).contains(&n) => {
                (0..n).fold(1, |acc: usize, _| acc.saturating_mul(terms.len()))
            }
            _ => 1,
        },
        _ => 1,
    }
}

/// Canonical shape of one distributed product, so like terms compare equal.
fn tidy_product(term: SymExpr) -> SymExpr {
    sort_terms(remove_identity(collect_like_terms(merge_constants(flatten(term)))))
}

fn expand(expr: SymExpr) -> SymExpr {
    if expanded_term_count(&expr) > MAX_EXPANDED_TERMS {
        return expr;
    }
    match expr {
        SymExpr::Mul(items) => {
            let mut acc: Vec<SymExpr> = vec![SymExpr::int(1)];
            let mut distributed = false;
            for item in items {
                match item {
                    SymExpr::Add(terms) => {
                        distributed = true;
                        let products = acc
                            .iter()
                            .cartesian_product(terms.iter())
                            .map(|(a, b)| tidy_product(SymExpr::Mul(vec![a.clone(), b.clone()])))
                            .collect();
                        // Collect after every factor so intermediates stay small.
                        acc = match collect_like_terms(SymExpr::Add(products)) {
                            SymExpr::Add(collected) => collected,
                            single => vec![single],
                        };
                    }
                    other => {
                        acc = acc
                            .into_iter()
                            .map(|a| SymExpr::Mul(vec![a, other.clone()]))
                            .collect();
                    }
                }
            }
            if !distributed {
                flatten(SymExpr::Mul(acc))
            } else if acc.is_empty() {
                SymExpr::int(0)
            } else {
                SymExpr::Add(acc.into_iter().map(flatten).collect())
            }
        }
        SymExpr::Pow(base, exp) => {
            let power = exp.as_num().and_then(|e| e.as_integer());
            match (*base, power) {
                (SymExpr::Add(terms), Some(n)) if (2..=MAX_EXPAND_POWER).contains(&n) => {
                    let factors = (0..n).map(|_| SymExpr::Add(terms.clone())).collect();
                    expand(SymExpr::Mul(factors))
                }
                (other, _) => SymExpr::Pow(Box::new(other), exp),
            }
        }
        other => other,
    }
}

/// Total polynomial degree of a term, used to order sums like `x**2 + x + 1`.
fn term_degree(term: &SymExpr) -> i64 {
    match term {
        SymExpr::Sym(_) => 1,
        SymExpr::Pow(base, exp) => match (base.as_ref(), exp.as_num().and_then(|e| e.as_integer())) {
            (SymExpr::Sym(_), Some(n)) => n,
            _ => 0,
        },
        SymExpr::Mul(items) => items.iter().map(term_degree).sum(),
        _ => 0,
    }
}

fn sort_key(expr: &SymExpr) -> String {
    let (_, rest) = split_coefficient(expr);
    rest.to_string()
}

fn sort_terms(expr: SymExpr) -> SymExpr {
    match expr {
        SymExpr::Add(items) => SymExpr::Add(
            items
                .into_iter()
                .sorted_by_cached_key(|term| {
                    (Reverse(term_degree(term)), term.as_num().is_some(), sort_key(term))
                })
                .collect(),
        ),
        SymExpr::Mul(items) => SymExpr::Mul(
            items
                .into_iter()
                .sorted_by_cached_key(|factor| (factor.as_num().is_none(), factor.to_string()))
                .collect(),
        ),
        other => other,
    }
}
