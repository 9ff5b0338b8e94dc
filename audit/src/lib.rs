//! Deterministic audit rules for financial documents extracted by a model.
//!
//! The crate turns a structured extraction (invoice, bill, receipt or credit
//! note) into an [`AuditReport`](report::AuditReport): arithmetic between
//! subtotal, VAT and total, per-line calculations, jurisdiction-aware VAT
//! rates, IBAN and structured-reference checksums. Missing data never fails
//! a check; it is reported as `Incomplete` so callers can tell "wrong" from
//! "unknown".
//!
//! ```
//! use ledgerlens_audit::prelude::*;
//!
//! let invoice: Invoice = serde_json::from_str(r#"{
//!     "subtotal": "1.000,00", "vat_amount": "210,00", "total_amount": "1.210,00",
//!     "line_items": [{"description": "Consulting", "quantity": 8,
//!                     "unit_price": "125,00", "net_amount": "1.000,00"}]
//! }"#).unwrap();
//!
//! let report = invoice.audit(&AuditContext::belgium());
//! assert_eq!(report.overall_status, OverallStatus::Passed);
//! ```

pub mod category;
pub mod checksum;
pub mod config;
pub mod documents;
pub mod error;
pub mod lenient;
pub mod line_items;
pub mod math;
pub mod money;
pub mod outcome;
pub mod report;
pub mod vat;

/// Convenient re-exports.
pub mod prelude {
    pub use crate::category::ExpenseCategory;
    pub use crate::config::{AuditContext, AuditTolerances, DEFAULT_CONFIDENCE_THRESHOLD};
    pub use crate::documents::{
        Auditable, Bill, BillLineItem, CreditNote, CreditNoteLine, DocumentKind, Invoice,
        InvoiceLine, Receipt, ReceiptItem, VatBreakdownEntry,
    };
    pub use crate::error::{ConfigError, MoneyError};
    pub use crate::line_items::{ExclusionRules, LineItem, LineItemExpectation};
    pub use crate::money::{Currency, Money};
    pub use crate::outcome::{classify, ReviewDecision, ReviewReason};
    pub use crate::report::{AuditCheck, AuditReport, CheckStatus, CheckType, OverallStatus};
    pub use crate::vat::{VatRateValidator, VatRuleSet};
}
