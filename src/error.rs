//! Error types for MirrorMind

use thiserror::Error;

/// Errors that can occur while acquiring, aggregating or persisting sessions.
///
/// Classification and context inference are total and never produce one of these.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Frame source failure: {0}")]
    Device(String),

    #[error("Failed to persist loop log: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for LoopError {
    fn from(e: figment::Error) -> Self {
        LoopError::Config(e.to_string())
    }
}
