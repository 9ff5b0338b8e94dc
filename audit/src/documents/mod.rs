//! Extraction payloads per document type and how each one is audited.
//!
//! Every payload deserializes leniently (malformed scalars become `None`)
//! and derives `JsonSchema` so the same schema can be handed to the
//! extractor and used to gate its output.

mod bill;
mod credit_note;
mod invoice;
mod receipt;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use bill::{Bill, BillLineItem};
pub use credit_note::{CreditNote, CreditNoteLine};
pub use invoice::{Invoice, InvoiceLine};
pub use receipt::{Receipt, ReceiptItem};

use crate::category::ExpenseCategory;
use crate::checksum::{verify_iban, verify_ogm};
use crate::config::AuditContext;
use crate::line_items::{validate_line_items, ExclusionRules, LineItem, LineItemExpectation};
use crate::math::verify_totals;
use crate::money::Money;
use crate::report::AuditReport;
pub use crate::vat::VatBreakdownEntry;

/// Field name of the IBAN check.
pub const IBAN_FIELD: &str = "iban";
/// Field name of the structured reference check.
pub const REFERENCE_FIELD: &str = "payment_reference";

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sales invoice issued to a customer.
    Invoice,
    /// Purchase invoice received from a supplier.
    Bill,
    /// Till receipt.
    Receipt,
    /// Credit note correcting an earlier invoice.
    CreditNote,
}

impl DocumentKind {
    /// All kinds.
    pub const ALL: [Self; 4] = [Self::Invoice, Self::Bill, Self::Receipt, Self::CreditNote];

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Bill => "bill",
            Self::Receipt => "receipt",
            Self::CreditNote => "credit_note",
        }
    }

    /// Whether the document type normally itemizes its lines.
    #[must_use]
    pub const fn line_expectation(self) -> LineItemExpectation {
        match self {
            Self::Invoice | Self::CreditNote => LineItemExpectation::Expected,
            Self::Bill | Self::Receipt => LineItemExpectation::Optional,
        }
    }

    /// Whether the document type carries payment details worth checking.
    #[must_use]
    pub const fn has_payment_details(self) -> bool {
        matches!(self, Self::Invoice | Self::Bill)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown document kind: {s}"))
    }
}

/// A payload the audit rules can be run against.
pub trait Auditable {
    /// Document type of the payload.
    const KIND: DocumentKind;

    /// Runs every applicable check.
    fn audit(&self, ctx: &AuditContext) -> AuditReport;

    /// Confidence the extractor reported for its own output.
    fn extraction_confidence(&self) -> Option<f64>;
}

/// Normalized view of a document, shared by all audit implementations.
struct AuditInput<'a, L> {
    kind: DocumentKind,
    subtotal: Option<Money>,
    vat_amount: Option<Money>,
    total_amount: Option<Money>,
    document_date: Option<NaiveDate>,
    category: Option<ExpenseCategory>,
    vat_breakdown: &'a [VatBreakdownEntry],
    lines: &'a [L],
    iban: Option<&'a str>,
    payment_reference: Option<&'a str>,
}

impl<L: LineItem> AuditInput<'_, L> {
    /// Net amount to use for VAT and line checks: the printed one, or
    /// `total - vat` when the document only shows gross figures.
    fn effective_subtotal(&self) -> Option<Money> {
        self.subtotal.or_else(|| {
            let (total, vat) = (self.total_amount?, self.vat_amount?);
            total.checked_sub(vat).ok()
        })
    }

    fn run(&self, ctx: &AuditContext) -> AuditReport {
        let tolerances = ctx.tolerances();
        let net = self.effective_subtotal();

        let mut checks = vec![verify_totals(
            self.subtotal,
            self.vat_amount,
            self.total_amount,
            tolerances.totals_minor,
        )];

        if self.vat_breakdown.is_empty() {
            checks.push(ctx.vat().verify(
                net,
                self.vat_amount,
                self.document_date,
                self.category,
            ));
        } else {
            checks.extend(ctx.vat().verify_breakdown(
                self.vat_breakdown,
                self.document_date,
                self.category,
            ));
        }

        checks.extend(validate_line_items(
            self.lines,
            net,
            &ExclusionRules::for_kind(self.kind),
            tolerances,
            self.kind.line_expectation(),
        ));

        if self.kind.has_payment_details() {
            checks.push(verify_iban(IBAN_FIELD, self.iban));
            checks.push(verify_ogm(REFERENCE_FIELD, self.payment_reference));
        }

        let report = AuditReport::from_checks(checks);
        tracing::debug!(
            event = "document_audited",
            kind = %self.kind,
            overall = ?report.overall_status,
            failed = report.failed_count,
            warnings = report.warning_count,
            incomplete = report.incomplete_count,
        );
        report
    }
}
