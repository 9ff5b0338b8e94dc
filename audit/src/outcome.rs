//! Auto-confirm vs. manual-review routing.

use serde::{Deserialize, Serialize};

use crate::report::AuditReport;

/// Why a document needs a human.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReviewReason {
    /// Document-type classification was not confident enough.
    LowClassificationConfidence {
        /// Reported confidence (non-finite values are serialized as `null`).
        confidence: f64,
    },
    /// Field extraction was not confident enough.
    LowExtractionConfidence {
        /// Reported confidence.
        confidence: f64,
    },
    /// The audit report contains failed checks.
    AuditFailed {
        /// Number of failed checks.
        failed_count: usize,
    },
}

/// Routing decision for an extracted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Both confidences clear the threshold and the audit passed.
    AutoConfirmEligible,
    /// At least one reason requires a human.
    ManualReviewRequired {
        /// Every reason that applied, in a fixed order.
        reasons: Vec<ReviewReason>,
    },
}

impl ReviewDecision {
    /// `true` for [`ReviewDecision::AutoConfirmEligible`].
    #[must_use]
    pub const fn is_auto_confirm(&self) -> bool {
        matches!(self, Self::AutoConfirmEligible)
    }
}

fn clears(confidence: f64, threshold: f64) -> bool {
    confidence.is_finite() && confidence >= threshold
}

/// Decides whether a document may be confirmed without review.
///
/// ```
/// use ledgerlens_audit::outcome::{classify, ReviewDecision};
/// use ledgerlens_audit::report::AuditReport;
///
/// let passed = AuditReport::from_checks(Vec::new());
/// assert_eq!(classify(0.97, 0.91, &passed, 0.85), ReviewDecision::AutoConfirmEligible);
/// assert!(!classify(0.97, f64::NAN, &passed, 0.85).is_auto_confirm());
/// ```
#[must_use]
pub fn classify(
    classification_confidence: f64,
    extraction_confidence: f64,
    report: &AuditReport,
    threshold: f64,
) -> ReviewDecision {
    let mut reasons = Vec::new();
    if !clears(classification_confidence, threshold) {
        reasons.push(ReviewReason::LowClassificationConfidence {
            confidence: classification_confidence,
        });
    }
    if !clears(extraction_confidence, threshold) {
        reasons.push(ReviewReason::LowExtractionConfidence {
            confidence: extraction_confidence,
        });
    }
    if !report.is_passed() {
        reasons.push(ReviewReason::AuditFailed {
            failed_count: report.failed_count,
        });
    }

    if reasons.is_empty() {
        ReviewDecision::AutoConfirmEligible
    } else {
        ReviewDecision::ManualReviewRequired { reasons }
    }
}
