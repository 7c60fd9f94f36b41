//! Symbolic layer: expression tree, parser, simplifier, markup translator,
//! structural analysis and a small equation solver.

pub mod analysis;
pub mod expr;
pub mod parser;
pub mod poly;
pub mod rational;
pub mod simplify;
pub mod solve;
pub mod translator;

pub use analysis::{AnalysisReport, Classification, analyze};
pub use expr::{Constant, Function, SymExpr, SymbolicExpression, UnparseableMarker};
pub use parser::{Statement, parse_expression, parse_statement};
pub use rational::Rational;
pub use simplify::{NormPass, StagedNormalizer, canonicalize, simplify};
pub use solve::{SolveReport, solve_equation};
pub use translator::{SymbolicTranslator, TranslatorConfig};

/// Errors raised while parsing or manipulating expressions.
///
/// These never leave the translator: a failed parse becomes
/// [`UnparseableMarker::UnparseableExpression`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolicError {
    #[error("unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("more than one '=' in statement")]
    MultipleRelations,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("numeric overflow")]
    NumericOverflow,
}
