//! ONNX Runtime session configuration shared by the neural recognition tiers.

use crate::core::config::{ConfigError, ConfigValidator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
    /// Alias for Level3.
    All,
}

/// Session options applied to every model the recognition tiers load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtSessionConfig {
    /// Threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Log severity level (0=Verbose, 1=Info, 2=Warning, 3=Error, 4=Fatal)
    pub log_severity_level: Option<i32>,
    /// Raw session configuration entries (key-value pairs)
    pub session_config_entries: Option<HashMap<String, String>>,
}

impl OrtSessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    pub fn with_log_severity_level(mut self, level: i32) -> Self {
        self.log_severity_level = Some(level);
        self
    }

    pub fn add_config_entry<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.session_config_entries
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Intra-op threads, defaulting to the available parallelism.
    pub fn get_intra_threads(&self) -> usize {
        self.intra_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn get_optimization_level(&self) -> OrtGraphOptimizationLevel {
        self.optimization_level.unwrap_or_default()
    }
}

impl ConfigValidator for OrtSessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.intra_threads == Some(0) || self.inter_threads == Some(0) {
            return Err(ConfigError::invalid("ORT thread counts must be greater than 0"));
        }
        if let Some(level) = self.log_severity_level
            && !(0..=4).contains(&level)
        {
            return Err(ConfigError::invalid(format!(
                "ORT log severity must be within 0..=4, got {level}"
            )));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ort_session_config_builder() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(2)
            .with_optimization_level(OrtGraphOptimizationLevel::Level2)
            .add_config_entry("session.use_env_allocators", "1");

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(2));
        assert_eq!(
            config.get_optimization_level(),
            OrtGraphOptimizationLevel::Level2
        );
        assert_eq!(config.session_config_entries.map(|e| e.len()), Some(1));
    }

    #[test]
    fn test_ort_session_config_validation() {
        assert!(OrtSessionConfig::get_defaults().validate().is_ok());
        assert!(OrtSessionConfig::new().with_intra_threads(0).validate().is_err());
        assert!(
            OrtSessionConfig::new()
                .with_log_severity_level(7)
                .validate()
                .is_err()
        );
        assert_eq!(OrtSessionConfig::new().with_intra_threads(3).get_intra_threads(), 3);
    }
}
