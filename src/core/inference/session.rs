use crate::core::config::{OrtGraphOptimizationLevel as OG, OrtSessionConfig};
use crate::core::errors::MathError;
use once_cell::sync::OnceCell;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel as GOL, SessionBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RUNTIME: OnceCell<PathBuf> = OnceCell::new();

/// Load the ONNX Runtime shared library once per process.
///
/// `dylib` falls back to `ORT_DYLIB_PATH`. Later calls return the path that
/// was loaded first.
pub fn init_runtime(dylib: Option<&Path>) -> Result<&'static Path, MathError> {
    RUNTIME
        .get_or_try_init(|| {
            let path = dylib
                .map(Path::to_path_buf)
                .or_else(|| std::env::var_os("ORT_DYLIB_PATH").map(PathBuf::from))
                .ok_or_else(|| {
                    MathError::missing_field("ort_dylib", "ONNX Runtime configuration")
                })?;
            if !path.is_file() {
                return Err(MathError::model_load(
                    &path,
                    "ONNX Runtime library not found",
                    Some("set ORT_DYLIB_PATH to libonnxruntime"),
                    None,
                ));
            }
            ort::init_from(path.display().to_string()).commit()?;
            info!(path = %path.display(), "ONNX Runtime loaded");
            Ok(path)
        })
        .map(PathBuf::as_path)
}

/// Create a session for `model_path` with the given options.
pub fn load_session(model_path: &Path, cfg: &OrtSessionConfig) -> Result<Session, MathError> {
    if !model_path.is_file() {
        return Err(MathError::model_load(
            model_path,
            "model file not found",
            Some("check the model path or download the weights"),
            None,
        ));
    }
    let builder = Session::builder()?;
    let builder = apply_ort_config(builder, cfg)?;
    let session = builder.commit_from_file(model_path).map_err(|e| {
        MathError::model_load(model_path, "failed to create session", None, Some(Box::new(e)))
    })?;
    debug!(model = %model_path.display(), "ONNX session created");
    Ok(session)
}

fn apply_ort_config(
    mut builder: SessionBuilder,
    cfg: &OrtSessionConfig,
) -> Result<SessionBuilder, ort::Error> {
    builder = builder.with_intra_threads(cfg.get_intra_threads())?;
    if let Some(inter) = cfg.inter_threads {
        builder = builder.with_inter_threads(inter)?;
    }
    let level = match cfg.get_optimization_level() {
        OG::DisableAll => GOL::Disable,
        OG::Level1 => GOL::Level1,
        OG::Level2 => GOL::Level2,
        OG::Level3 | OG::All => GOL::Level3,
    };
    builder = builder.with_optimization_level(level)?;
    if let Some(severity) = cfg.log_severity_level {
        let level = match severity {
            0 => LogLevel::Verbose,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::Fatal,
        };
        builder = builder.with_log_level(level)?;
    }
    if let Some(entries) = &cfg.session_config_entries {
        for (key, value) in entries {
            builder = builder.with_config_entry(key, value)?;
        }
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_model_load_error() {
        let err = load_session(Path::new("/nonexistent/model.onnx"), &OrtSessionConfig::new())
            .unwrap_err();
        assert!(matches!(err, MathError::ModelLoad { .. }));
        assert!(err.to_string().contains("model file not found"));
    }
}
