//! Error types for checkpoint discovery, loading and swapping

use thiserror::Error;

/// Process exit codes used when a fatal error reaches the process boundary.
pub mod exit_codes {
    pub const EXIT_SUCCESS: i32 = 0;
    pub const EXIT_GENERIC_FAIL: i32 = 1;
    pub const EXIT_NO_CHECKPOINT: i32 = 3;
    pub const EXIT_CODEC_UNAVAILABLE: i32 = 4;
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SwapError>;

/// Top-level error for every sdswap operation.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors tied to a specific artifact or to the registry of artifacts.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model not found: {path}")]
    NotFound { path: String },

    #[error("Invalid model format: {format}")]
    InvalidFormat { format: String },

    #[error("Model loading failed: {reason}")]
    LoadingFailed { reason: String },

    /// The decoder or encoder for a format is not present in this build.
    #[error("No {operation} available for {format} artifacts (file: {path})")]
    CodecUnavailable { format: String, operation: String, path: String },

    /// Nothing was found in any searched location.
    #[error("No checkpoints found. Searched: {}", join_locations(.searched))]
    NoCheckpoints { searched: Vec<String> },

    #[error("Invalid architecture config {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("No model is loaded")]
    NotLoaded,
}

fn join_locations(searched: &[String]) -> String {
    if searched.is_empty() { "<nothing>".to_string() } else { searched.join(", ") }
}

impl SwapError {
    /// Whether no safe default exists and the process is expected to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwapError::Model(ModelError::CodecUnavailable { .. })
                | SwapError::Model(ModelError::NoCheckpoints { .. })
        )
    }

    /// Exit code to report when this error terminates the process.
    pub fn exit_code(&self) -> i32 {
        match self {
            SwapError::Model(ModelError::NoCheckpoints { .. }) => exit_codes::EXIT_NO_CHECKPOINT,
            SwapError::Model(ModelError::CodecUnavailable { .. }) => {
                exit_codes::EXIT_CODEC_UNAVAILABLE
            }
            _ => exit_codes::EXIT_GENERIC_FAIL,
        }
    }
}
