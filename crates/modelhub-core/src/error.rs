//! Error types for the Model Hub core.

use std::path::PathBuf;

use thiserror::Error;

/// Core error taxonomy.
///
/// The enum is `Clone` (variants carry rendered strings rather than
/// source errors) so the model cache can hand a single construction
/// failure to every waiter that joined the in-flight load.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Unknown model identifier.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The identifier resolved, but a required file is absent on disk.
    #[error("Model file missing for {id}: {}", path.display())]
    ModelFileMissing { id: String, path: PathBuf },

    /// Model construction failed (corrupt weights, resource exhaustion).
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// No model runtime is available to construct backends.
    #[error("Model runtime unavailable: {0}")]
    BackendUnavailable(String),

    /// The model loaded but the generation call failed.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Soft failure: the object detector is missing or failed.
    #[error("Object detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
