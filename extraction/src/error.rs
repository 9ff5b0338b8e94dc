//! Error types for extraction, plus the per-attempt history kept by the retry loop.

use std::time::Duration;

use ledgerlens_audit::error::ConfigError;
use ledgerlens_audit::report::OverallStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happened on one re-extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The extractor returned an error.
    CallFailed {
        /// Error text from the extractor.
        reason: String,
    },
    /// The extractor did not answer within the configured call timeout.
    TimedOut {
        /// The configured limit.
        limit: Duration,
    },
    /// The extractor answered and the result was audited.
    Audited {
        /// Verdict of the re-audit.
        overall_status: OverallStatus,
        /// Failed checks in the re-audit.
        failed_count: usize,
        /// Warnings in the re-audit.
        warning_count: usize,
    },
}

/// Record of a single re-extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// Estimated tokens in the feedback prompt sent on this attempt.
    pub prompt_tokens: usize,
    /// What the attempt produced.
    pub outcome: AttemptOutcome,
    /// Time spent on this attempt.
    pub elapsed: Duration,
}

impl AttemptRecord {
    /// `true` when the extractor errored or timed out.
    #[must_use]
    pub const fn is_failed_call(&self) -> bool {
        matches!(
            self.outcome,
            AttemptOutcome::CallFailed { .. } | AttemptOutcome::TimedOut { .. }
        )
    }
}

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Model output was not valid JSON or did not deserialize.
    #[error("JSON parsing failed: {message}")]
    Parse {
        /// Parse error message.
        message: String,
        /// Raw text that failed to parse.
        raw_text: String,
    },

    /// Model output was JSON but violated the document schema.
    #[error("schema validation failed: {}", errors.join("; "))]
    SchemaValidation {
        /// One entry per violation, `At path '...': ...`.
        errors: Vec<String>,
    },

    /// Schema generation or compilation failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The extractor itself failed (process error, transport error, ...).
    #[error("Extractor failed: {0}")]
    Extractor(String),

    /// The extractor did not answer in time.
    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid pipeline configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
