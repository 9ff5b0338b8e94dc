//! Feedback-driven retry loop: re-extract with audit feedback until the audit
//! passes or the retry budget runs out.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use ledgerlens_audit::error::ConfigError;
use ledgerlens_audit::report::{AuditCheck, AuditReport};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::error::{AttemptOutcome, AttemptRecord};
use crate::feedback::build_feedback_prompt;
use crate::metrics::{estimate_tokens, RetryMetrics};

/// Final state of the retry loop for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryResult<T> {
    /// The initial extraction was good enough; the extractor was not called again.
    NoRetryNeeded {
        /// The initial extraction.
        data: T,
    },
    /// A re-extraction passed the audit.
    CorrectedOnRetry {
        /// The corrected extraction.
        data: T,
        /// 1-based attempt that succeeded.
        attempt: usize,
        /// Fields that failed initially and no longer fail.
        corrected_fields: BTreeSet<String>,
        /// The checks that triggered the loop.
        original_failures: Vec<AuditCheck>,
    },
    /// Retries were exhausted without a passing audit.
    StillFailing {
        /// The last successfully produced extraction.
        data: T,
        /// Number of attempts made.
        attempts: usize,
        /// Failed checks followed by warnings from the last report.
        remaining_failures: Vec<AuditCheck>,
    },
}

/// [`RetryResult`] without the extracted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetrySummary {
    /// See [`RetryResult::NoRetryNeeded`].
    NoRetryNeeded,
    /// See [`RetryResult::CorrectedOnRetry`].
    CorrectedOnRetry {
        /// 1-based attempt that succeeded.
        attempt: usize,
        /// Fields that failed initially and no longer fail.
        corrected_fields: BTreeSet<String>,
        /// The checks that triggered the loop.
        original_failures: Vec<AuditCheck>,
    },
    /// See [`RetryResult::StillFailing`].
    StillFailing {
        /// Number of attempts made.
        attempts: usize,
        /// Failed checks followed by warnings from the last report.
        remaining_failures: Vec<AuditCheck>,
    },
}

impl<T> RetryResult<T> {
    /// The extraction carried by any variant.
    pub const fn data(&self) -> &T {
        match self {
            Self::NoRetryNeeded { data }
            | Self::CorrectedOnRetry { data, .. }
            | Self::StillFailing { data, .. } => data,
        }
    }

    /// Consumes the result, returning the extraction.
    pub fn into_data(self) -> T {
        self.into_parts().0
    }

    /// Splits off the extraction from the loop verdict.
    pub fn into_parts(self) -> (T, RetrySummary) {
        match self {
            Self::NoRetryNeeded { data } => (data, RetrySummary::NoRetryNeeded),
            Self::CorrectedOnRetry {
                data,
                attempt,
                corrected_fields,
                original_failures,
            } => (
                data,
                RetrySummary::CorrectedOnRetry {
                    attempt,
                    corrected_fields,
                    original_failures,
                },
            ),
            Self::StillFailing {
                data,
                attempts,
                remaining_failures,
            } => (
                data,
                RetrySummary::StillFailing {
                    attempts,
                    remaining_failures,
                },
            ),
        }
    }
}

/// Everything the loop produced for one document.
#[derive(Debug, Clone)]
pub struct RetryRun<T> {
    /// Loop verdict and the extraction it settled on.
    pub result: RetryResult<T>,
    /// Audit report of the extraction in `result`.
    pub final_report: AuditReport,
    /// Attempt counts, timing and history.
    pub metrics: RetryMetrics,
}

enum CallFailure {
    Errored(String),
    TimedOut(Duration),
}

/// Bounded retry loop driven by audit feedback.
///
/// The loop only ever talks to its two collaborators: a validator that audits
/// an extraction, and a re-extraction function that takes a feedback prompt.
#[derive(Debug, Clone, Default)]
pub struct FeedbackRetryLoop {
    config: RetryConfig,
}

impl FeedbackRetryLoop {
    /// Creates a loop with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyRetries`] when `max_retries` exceeds the ceiling.
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn needs_retry(&self, report: &AuditReport) -> bool {
        !report.critical_failures.is_empty() || (report.has_warnings() && self.config.retry_on_warnings)
    }

    fn is_success(&self, report: &AuditReport) -> bool {
        report.is_passed() || (report.critical_failures.is_empty() && !self.config.retry_on_warnings)
    }

    async fn call<F, Fut, T, E>(&self, re_extract: &F, prompt: String) -> Result<T, CallFailure>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let pending = re_extract(prompt);
        let answer = match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| CallFailure::TimedOut(limit))?,
            None => pending.await,
        };
        answer.map_err(|e| CallFailure::Errored(e.to_string()))
    }

    /// Runs the loop.
    ///
    /// Calls `re_extract` at most `max_retries` times and `validator` once per
    /// successful call. A failed or timed-out call is recorded and the loop
    /// moves on with the previous extraction and report unchanged.
    #[tracing::instrument(
        name = "feedback_retry_loop",
        skip_all,
        fields(
            max_retries = self.config.max_retries,
            retry_on_warnings = self.config.retry_on_warnings,
            initial_failures = initial_report.failed_count,
        )
    )]
    pub async fn run<T, V, F, Fut, E>(
        &self,
        initial: T,
        initial_report: AuditReport,
        validator: V,
        re_extract: F,
    ) -> RetryRun<T>
    where
        V: Fn(&T) -> AuditReport,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        let mut metrics = RetryMetrics::default();

        if !self.needs_retry(&initial_report) {
            tracing::debug!(event = "retry_not_needed", warnings = initial_report.warning_count);
            metrics.wall_time = start.elapsed();
            return RetryRun {
                result: RetryResult::NoRetryNeeded { data: initial },
                final_report: initial_report,
                metrics,
            };
        }

        let include_warnings = self.config.retry_on_warnings;
        let original_failures: Vec<AuditCheck> =
            initial_report.retryable_checks(include_warnings).cloned().collect();
        let original_fields = initial_report.failure_fields(include_warnings);
        let max = self.config.max_retries;

        let mut current = initial;
        let mut current_report = initial_report;

        for attempt in 1..=max {
            let attempt_start = Instant::now();
            let prompt = build_feedback_prompt(&current_report, attempt, max);
            let prompt_tokens = estimate_tokens(&prompt);
            tracing::info!(event = "retry_attempt", attempt, max, prompt_tokens, "re-extracting with feedback");

            match self.call(&re_extract, prompt).await {
                Err(failure) => {
                    let outcome = match failure {
                        CallFailure::Errored(reason) => {
                            tracing::warn!(event = "retry_call_failed", attempt, error = %reason, "re-extraction failed");
                            AttemptOutcome::CallFailed { reason }
                        }
                        CallFailure::TimedOut(limit) => {
                            tracing::warn!(event = "retry_call_timed_out", attempt, limit_ms = limit.as_millis() as u64, "re-extraction timed out");
                            AttemptOutcome::TimedOut { limit }
                        }
                    };
                    metrics.record(AttemptRecord {
                        attempt_number: attempt,
                        prompt_tokens,
                        outcome,
                        elapsed: attempt_start.elapsed(),
                    });
                }
                Ok(candidate) => {
                    let report = validator(&candidate);
                    metrics.record(AttemptRecord {
                        attempt_number: attempt,
                        prompt_tokens,
                        outcome: AttemptOutcome::Audited {
                            overall_status: report.overall_status,
                            failed_count: report.failed_count,
                            warning_count: report.warning_count,
                        },
                        elapsed: attempt_start.elapsed(),
                    });

                    if self.is_success(&report) {
                        let remaining = report.failure_fields(include_warnings);
                        let corrected_fields: BTreeSet<String> =
                            original_fields.difference(&remaining).cloned().collect();
                        tracing::info!(event = "retry_corrected", attempt, corrected = corrected_fields.len());
                        metrics.wall_time = start.elapsed();
                        return RetryRun {
                            result: RetryResult::CorrectedOnRetry {
                                data: candidate,
                                attempt,
                                corrected_fields,
                                original_failures,
                            },
                            final_report: report,
                            metrics,
                        };
                    }

                    tracing::debug!(event = "retry_still_failing", attempt, failed = report.failed_count, warnings = report.warning_count);
                    current = candidate;
                    current_report = report;
                }
            }
        }

        let remaining_failures: Vec<AuditCheck> = current_report.retryable_checks(true).cloned().collect();
        tracing::warn!(event = "retry_exhausted", attempts = max, remaining = remaining_failures.len(), "retries exhausted");
        metrics.wall_time = start.elapsed();
        RetryRun {
            result: RetryResult::StillFailing {
                data: current,
                attempts: max,
                remaining_failures,
            },
            final_report: current_report,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ledgerlens_audit::report::CheckType;

    use super::*;

    fn audit(total: &i64) -> AuditReport {
        if *total == 121 {
            AuditReport::from_checks(vec![AuditCheck::passed(CheckType::MathTotals, "total_amount", "ok")])
        } else {
            AuditReport::from_checks(vec![AuditCheck::failed(CheckType::MathTotals, "total_amount", "off")])
        }
    }

    #[tokio::test]
    async fn zero_retries_reports_still_failing_without_calls() {
        let calls = AtomicUsize::new(0);
        let retry = FeedbackRetryLoop::new(RetryConfig::default().with_max_retries(0)).unwrap();
        let run = retry
            .run(120, audit(&120), audit, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(121) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(run.result, RetryResult::StillFailing { attempts: 0, data: 120, .. }));
        assert_eq!(run.metrics.total_attempts, 0);
    }

    #[test]
    fn rejects_excessive_retries() {
        assert!(FeedbackRetryLoop::new(RetryConfig::default().with_max_retries(11)).is_err());
    }

    #[test]
    fn into_parts_keeps_verdict() {
        let result = RetryResult::CorrectedOnRetry {
            data: 7,
            attempt: 2,
            corrected_fields: BTreeSet::from(["total_amount".to_string()]),
            original_failures: Vec::new(),
        };
        assert_eq!(*result.data(), 7);
        let (data, summary) = result.into_parts();
        assert_eq!(data, 7);
        assert!(matches!(summary, RetrySummary::CorrectedOnRetry { attempt: 2, .. }));
    }

    #[test]
    fn result_serializes_with_outcome_tag() {
        let result: RetryResult<serde_json::Value> = RetryResult::StillFailing {
            data: serde_json::json!({"total_amount": "100.00"}),
            attempts: 2,
            remaining_failures: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "still_failing");
        assert_eq!(json["attempts"], 2);

        let back: RetryResult<serde_json::Value> = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
