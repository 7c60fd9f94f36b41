//! Constants shared across the pipeline.

/// Default per-call recognition timeout.
pub const DEFAULT_RECOGNITION_TIMEOUT_MS: u64 = 30_000;

/// Default Mathpix API endpoint.
pub const DEFAULT_MATHPIX_ENDPOINT: &str = "https://api.mathpix.com";

/// Default Tesseract executable.
pub const DEFAULT_TESSERACT_BINARY: &str = "tesseract";

/// Characters Tesseract may emit for math input.
pub const TESSERACT_WHITELIST: &str = r"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+-=(){}[]^_/\|<>";

/// Source reported when no recognition ran (unreadable image).
pub const NO_SOURCE: &str = "none";
