use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the `ledgerlens` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid audit or retry configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ledgerlens_audit::error::ConfigError),

    /// The configuration file could not be read or parsed.
    #[error("Config file {path}: {message}")]
    ConfigFile {
        /// File that failed to load.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Extraction pipeline error.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ledgerlens_extraction::error::ExtractionError),

    /// Error from the vision adapter.
    #[error("Vision adapter error: {0}")]
    Vision(#[from] ledgerlens_vision::VisionError),

    /// A document file could not be parsed.
    #[error("Document {path}: {source}")]
    Document {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
