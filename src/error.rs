use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunerError {
    #[error("Failed to find {tool}: {path}")]
    ExecutableNotFound { tool: String, path: PathBuf },

    #[error("Smoke test of {tool} failed ({status}): {command}")]
    SmokeTestFailed {
        tool: String,
        command: String,
        status: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid parameter space: {0}")]
    InvalidSpace(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TunerError>;
