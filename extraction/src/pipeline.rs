//! End-to-end processing of one document: extract, audit, retry, route.

use std::path::PathBuf;

use async_trait::async_trait;
use ledgerlens_audit::config::{validate_threshold, AuditContext, DEFAULT_CONFIDENCE_THRESHOLD};
use ledgerlens_audit::documents::Auditable;
use ledgerlens_audit::error::ConfigError;
use ledgerlens_audit::outcome::{classify, ReviewDecision};
use ledgerlens_audit::report::AuditReport;
use serde::Serialize;

use crate::config::RetryConfig;
use crate::error::ExtractionError;
use crate::metrics::RetryMetrics;
use crate::orchestrator::{FeedbackRetryLoop, RetrySummary};

/// Input for one extractor call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Page images of the document, in order.
    pub images: Vec<PathBuf>,
    /// Audit feedback from the previous attempt; `None` on the first call.
    pub feedback: Option<String>,
}

/// Something that can turn document images into a structured `T`.
#[async_trait]
pub trait DocumentExtractor<T>: Send + Sync {
    /// Runs one extraction.
    async fn extract(&self, request: ExtractionRequest) -> Result<T, ExtractionError>;
}

/// Result of [`DocumentPipeline::process`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome<T> {
    /// The extraction the pipeline settled on.
    pub document: T,
    /// Audit report of `document`.
    pub report: AuditReport,
    /// How the retry loop ended.
    pub retry: RetrySummary,
    /// Retry loop metrics.
    pub metrics: RetryMetrics,
    /// Auto-confirm or manual review.
    pub decision: ReviewDecision,
}

/// Extraction pipeline over a single [`DocumentExtractor`].
pub struct DocumentPipeline<X> {
    extractor: X,
    context: AuditContext,
    retry: FeedbackRetryLoop,
    confidence_threshold: f64,
}

impl<X> DocumentPipeline<X> {
    /// Creates a pipeline with the default retry config and confidence threshold.
    #[must_use]
    pub fn new(extractor: X, context: AuditContext) -> Self {
        Self {
            extractor,
            context,
            retry: FeedbackRetryLoop::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Replaces the retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyRetries`] above the retry ceiling.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Result<Self, ConfigError> {
        self.retry = FeedbackRetryLoop::new(config)?;
        Ok(self)
    }

    /// Replaces the auto-confirm threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] outside `0.0..=1.0`.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Result<Self, ConfigError> {
        self.confidence_threshold = validate_threshold(threshold)?;
        Ok(self)
    }

    /// The wrapped extractor.
    pub const fn extractor(&self) -> &X {
        &self.extractor
    }

    /// The audit context in use.
    pub const fn context(&self) -> &AuditContext {
        &self.context
    }

    /// Extracts, audits, retries with feedback and classifies one document.
    ///
    /// # Errors
    ///
    /// Only a failure of the initial extraction is returned; failures during
    /// retries are recorded in the metrics instead.
    #[tracing::instrument(
        name = "process_document",
        skip(self, images),
        fields(kind = %T::KIND, pages = images.len())
    )]
    pub async fn process<T>(
        &self,
        images: &[PathBuf],
        classification_confidence: f64,
    ) -> Result<PipelineOutcome<T>, ExtractionError>
    where
        T: Auditable + Send,
        X: DocumentExtractor<T>,
    {
        let initial = self
            .extractor
            .extract(ExtractionRequest {
                images: images.to_vec(),
                feedback: None,
            })
            .await
            .inspect_err(|e| tracing::error!(event = "initial_extraction_failed", error = %e))?;

        let initial_report = initial.audit(&self.context);
        tracing::debug!(
            event = "initial_audit",
            status = ?initial_report.overall_status,
            failed = initial_report.failed_count,
            warnings = initial_report.warning_count,
        );

        let run = self
            .retry
            .run(
                initial,
                initial_report,
                |doc: &T| doc.audit(&self.context),
                |feedback| {
                    self.extractor.extract(ExtractionRequest {
                        images: images.to_vec(),
                        feedback: Some(feedback),
                    })
                },
            )
            .await;

        let (document, retry) = run.result.into_parts();
        let extraction_confidence = document.extraction_confidence().unwrap_or(0.0);
        let decision = classify(
            classification_confidence,
            extraction_confidence,
            &run.final_report,
            self.confidence_threshold,
        );
        tracing::info!(
            event = "document_processed",
            auto_confirm = decision.is_auto_confirm(),
            attempts = run.metrics.total_attempts,
            failed_calls = run.metrics.failed_calls,
        );

        Ok(PipelineOutcome {
            document,
            report: run.final_report,
            retry,
            metrics: run.metrics,
            decision,
        })
    }
}
