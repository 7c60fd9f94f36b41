//! Recognition model wrappers.

pub mod ctc_text;
pub mod formula_net;

pub use ctc_text::{CtcTextModel, CtcTextModelBuilder, CtcTextPreprocessConfig};
pub use formula_net::{
    FormulaNetModel, FormulaNetModelBuilder, FormulaNetPostprocessConfig,
    FormulaNetPreprocessConfig,
};
