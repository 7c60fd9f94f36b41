//! Configuration errors and the validation trait shared by every config struct.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent with another value.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A required value is absent.
    #[error("missing configuration field: {field}")]
    MissingField { field: String },

    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("failed to parse configuration file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Validation hook implemented by configuration structs.
pub trait ConfigValidator {
    /// Check ranges and cross-field consistency.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Default configuration for this type.
    fn get_defaults() -> Self
    where
        Self: Sized;
}

/// Range helpers used by `ConfigValidator` implementations.
pub trait ConfigValidatorExt: ConfigValidator {
    fn ensure_unit_interval(name: &str, value: f32) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::invalid(format!(
                "{name} must be within [0, 1], got {value}"
            )))
        }
    }

    fn ensure_positive(name: &str, value: f64) -> Result<(), ConfigError> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::invalid(format!(
                "{name} must be greater than 0, got {value}"
            )))
        }
    }
}

impl<T: ConfigValidator> ConfigValidatorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl ConfigValidator for Probe {
        fn validate(&self) -> Result<(), ConfigError> {
            Self::ensure_unit_interval("confidence", 1.5)
        }

        fn get_defaults() -> Self {
            Probe
        }
    }

    #[test]
    fn test_range_helpers() {
        assert!(Probe::ensure_unit_interval("c", 0.4).is_ok());
        assert!(Probe::ensure_positive("t", 0.0).is_err());
        let err = Probe.validate().unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }
}
