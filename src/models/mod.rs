//! Pure ONNX model implementations, independent of the recognition cascade.

pub mod recognition;
