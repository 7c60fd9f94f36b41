//! ONNX Runtime integration.
//!
//! The runtime library is loaded dynamically, so a missing shared library
//! surfaces as an error at session creation instead of a link failure.

mod session;

pub use session::{init_runtime, load_session};
