//! Metrics tracking and token estimation for the retry loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AttemptRecord;

/// Metrics collected while retrying one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMetrics {
    /// Re-extraction attempts made (the initial extraction is not counted).
    pub total_attempts: usize,
    /// Attempts where the extractor errored or timed out.
    pub failed_calls: usize,
    /// Wall-clock time spent in the loop.
    pub wall_time: Duration,
    /// Estimated tokens across all feedback prompts.
    pub estimated_prompt_tokens: usize,
    /// One record per attempt, in order.
    pub history: Vec<AttemptRecord>,
}

impl RetryMetrics {
    pub(crate) fn record(&mut self, record: AttemptRecord) {
        self.total_attempts = record.attempt_number;
        self.estimated_prompt_tokens += record.prompt_tokens;
        if record.is_failed_call() {
            self.failed_calls += 1;
        }
        self.history.push(record);
    }
}

/// Estimate token count from text using the 4-chars-per-token heuristic.
///
/// Counts chars rather than bytes and rounds up.
///
/// # Examples
///
/// ```
/// use ledgerlens_extraction::metrics::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("Attempt 1/2"), 3);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
