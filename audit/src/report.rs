//! Individual audit checks and the aggregated report.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of rules a check can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// `subtotal + vat == total`.
    MathTotals,
    /// Sum of line amounts matches the subtotal.
    MathLineItems,
    /// `quantity × unit_price == line total` for a single line.
    MathLineItemCalculation,
    /// IBAN mod-97.
    ChecksumIban,
    /// Belgian structured communication (OGM) mod-97.
    ChecksumOgm,
    /// Implied VAT rate is legal for the jurisdiction.
    VatRate,
    /// Presence of line items.
    LineItems,
}

impl CheckType {
    /// Stable snake-case identifier, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MathTotals => "math_totals",
            Self::MathLineItems => "math_line_items",
            Self::MathLineItemCalculation => "math_line_item_calculation",
            Self::ChecksumIban => "checksum_iban",
            Self::ChecksumOgm => "checksum_ogm",
            Self::VatRate => "vat_rate",
            Self::LineItems => "line_items",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The rule holds.
    Passed,
    /// Hard violation; blocks auto-confirm and is retry-eligible.
    Failed,
    /// Soft violation; only retried when configured.
    Warning,
    /// Input was missing, so the rule could not be evaluated.
    Incomplete,
}

/// Verdict over all checks of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// No check failed.
    Passed,
    /// At least one check failed.
    Failed,
}

/// One verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCheck {
    /// Rule that produced the check.
    pub check_type: CheckType,
    /// Document field the check refers to, e.g. `total_amount` or `line_items[3]`.
    pub field: String,
    /// Result of the rule.
    pub status: CheckStatus,
    /// Human-readable explanation.
    pub message: String,
    /// Targeted correction hint for the extractor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl AuditCheck {
    fn new(
        check_type: CheckType,
        field: impl Into<String>,
        status: CheckStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_type,
            field: field.into(),
            status,
            message: message.into(),
            hint: None,
        }
    }

    /// A passing check.
    #[must_use]
    pub fn passed(check_type: CheckType, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_type, field, CheckStatus::Passed, message)
    }

    /// A hard failure.
    #[must_use]
    pub fn failed(check_type: CheckType, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_type, field, CheckStatus::Failed, message)
    }

    /// A soft violation.
    #[must_use]
    pub fn warning(check_type: CheckType, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_type, field, CheckStatus::Warning, message)
    }

    /// A check that could not be evaluated.
    #[must_use]
    pub fn incomplete(
        check_type: CheckType,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(check_type, field, CheckStatus::Incomplete, message)
    }

    /// Attaches a correction hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// `true` for `Failed`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, CheckStatus::Failed)
    }

    /// `true` for `Warning`.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self.status, CheckStatus::Warning)
    }
}

/// Aggregate over all checks run against one extraction.
///
/// Built only through [`AuditReport::from_checks`], so `overall_status` and
/// the partitions always agree with `checks`. Deserialization rebuilds the
/// report from `checks` and ignores the stored aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredReport")]
pub struct AuditReport {
    /// Every check in evaluation order, `Incomplete` ones included.
    pub checks: Vec<AuditCheck>,
    /// `Passed` iff `critical_failures` is empty.
    pub overall_status: OverallStatus,
    /// Number of `Passed` checks.
    pub passed_count: usize,
    /// Number of `Failed` checks.
    pub failed_count: usize,
    /// Number of `Warning` checks.
    pub warning_count: usize,
    /// Number of `Incomplete` checks.
    pub incomplete_count: usize,
    /// The `Failed` checks.
    pub critical_failures: Vec<AuditCheck>,
    /// The `Warning` checks.
    pub warnings: Vec<AuditCheck>,
}

#[derive(Deserialize)]
struct StoredReport {
    checks: Vec<AuditCheck>,
}

impl From<StoredReport> for AuditReport {
    fn from(stored: StoredReport) -> Self {
        Self::from_checks(stored.checks)
    }
}

impl AuditReport {
    /// Partitions `checks` by status and derives the overall verdict.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledgerlens_audit::report::{AuditCheck, AuditReport, CheckType, OverallStatus};
    ///
    /// let report = AuditReport::from_checks(vec![
    ///     AuditCheck::passed(CheckType::MathTotals, "total_amount", "totals match"),
    ///     AuditCheck::incomplete(CheckType::ChecksumIban, "iban", "no IBAN on document"),
    /// ]);
    /// assert_eq!(report.overall_status, OverallStatus::Passed);
    /// assert_eq!(report.incomplete_count, 1);
    /// ```
    #[must_use]
    pub fn from_checks(checks: Vec<AuditCheck>) -> Self {
        let critical_failures: Vec<AuditCheck> =
            checks.iter().filter(|c| c.is_failure()).cloned().collect();
        let warnings: Vec<AuditCheck> = checks.iter().filter(|c| c.is_warning()).cloned().collect();
        let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();

        let overall_status = if critical_failures.is_empty() {
            OverallStatus::Passed
        } else {
            OverallStatus::Failed
        };

        Self {
            passed_count: count(CheckStatus::Passed),
            failed_count: critical_failures.len(),
            warning_count: warnings.len(),
            incomplete_count: count(CheckStatus::Incomplete),
            overall_status,
            critical_failures,
            warnings,
            checks,
        }
    }

    /// `true` when no check failed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.overall_status == OverallStatus::Passed
    }

    /// `true` when the report has at least one warning.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Failed checks, followed by warnings when `include_warnings` is set.
    pub fn retryable_checks(&self, include_warnings: bool) -> impl Iterator<Item = &AuditCheck> {
        let warnings: &[AuditCheck] = if include_warnings { &self.warnings } else { &[] };
        self.critical_failures.iter().chain(warnings.iter())
    }

    /// The set of fields with a failed (and optionally warning) check.
    #[must_use]
    pub fn failure_fields(&self, include_warnings: bool) -> BTreeSet<String> {
        self.retryable_checks(include_warnings)
            .map(|c| c.field.clone())
            .collect()
    }
}
