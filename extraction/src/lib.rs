//! Feedback-driven re-extraction for audited financial documents.
//!
//! [`FeedbackRetryLoop`](orchestrator::FeedbackRetryLoop) takes an extraction
//! that failed its audit, turns the failing checks into a targeted prompt and
//! asks the extractor again, a bounded number of times.
//! [`DocumentPipeline`](pipeline::DocumentPipeline) wires the loop between a
//! [`DocumentExtractor`](pipeline::DocumentExtractor) and the audit rules and
//! finishes with an auto-confirm / manual-review decision.

pub mod config;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod orchestrator;
pub mod parse;
pub mod pipeline;

/// Common types for driving the pipeline.
pub mod prelude {
    pub use crate::config::{RetryConfig, MAX_RETRIES_CEILING};
    pub use crate::error::{AttemptOutcome, AttemptRecord, ExtractionError};
    pub use crate::feedback::build_feedback_prompt;
    pub use crate::metrics::RetryMetrics;
    pub use crate::orchestrator::{FeedbackRetryLoop, RetryResult, RetryRun, RetrySummary};
    pub use crate::parse::{parse_structured, StructuredParser};
    pub use crate::pipeline::{DocumentExtractor, DocumentPipeline, ExtractionRequest, PipelineOutcome};
}
