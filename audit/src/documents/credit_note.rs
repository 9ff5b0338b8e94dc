use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AuditInput, Auditable, DocumentKind, VatBreakdownEntry};
use crate::category::ExpenseCategory;
use crate::config::AuditContext;
use crate::lenient::{self, LenientScalar};
use crate::line_items::LineItem;
use crate::money::Money;
use crate::report::AuditReport;

/// Credit note. Amounts may be printed negative or positive; both are
/// audited the same way as long as the signs agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreditNote {
    /// Credit note number.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub credit_note_number: Option<String>,
    /// Invoice being corrected.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub original_invoice_number: Option<String>,
    /// Issue date.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub issue_date: Option<NaiveDate>,
    /// Issuing company.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub supplier_name: Option<String>,
    /// Expense category.
    #[serde(default, deserialize_with = "lenient::category")]
    #[schemars(with = "LenientScalar")]
    pub category: Option<ExpenseCategory>,
    /// Credited amount before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub subtotal: Option<Money>,
    /// Credited VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub vat_amount: Option<Money>,
    /// Total credited.
    #[serde(default, deserialize_with = "lenient::money")]
    pub total_amount: Option<Money>,
    /// VAT table, one entry per rate.
    #[serde(default, deserialize_with = "lenient::list")]
    pub vat_breakdown: Vec<VatBreakdownEntry>,
    /// Credited lines.
    #[serde(default, deserialize_with = "lenient::list")]
    pub lines: Vec<CreditNoteLine>,
    /// Extractor self-reported confidence in `0.0..=1.0`.
    #[serde(default, deserialize_with = "lenient::confidence")]
    #[schemars(with = "LenientScalar")]
    pub confidence: Option<f64>,
}

/// One credited line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreditNoteLine {
    /// Line description.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub description: Option<String>,
    /// Quantity credited.
    #[serde(default, deserialize_with = "lenient::quantity")]
    #[schemars(with = "LenientScalar")]
    pub quantity: Option<f64>,
    /// Unit price before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub unit_price: Option<Money>,
    /// Credited amount before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub credited_amount: Option<Money>,
}

impl LineItem for CreditNoteLine {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn quantity(&self) -> Option<f64> {
        self.quantity
    }

    fn unit_price(&self) -> Option<Money> {
        self.unit_price
    }

    fn net_amount(&self) -> Option<Money> {
        self.credited_amount
    }
}

impl Auditable for CreditNote {
    const KIND: DocumentKind = DocumentKind::CreditNote;

    fn audit(&self, ctx: &AuditContext) -> AuditReport {
        AuditInput {
            kind: Self::KIND,
            subtotal: self.subtotal,
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            document_date: self.issue_date,
            category: self.category,
            vat_breakdown: &self.vat_breakdown,
            lines: &self.lines,
            iban: None,
            payment_reference: None,
        }
        .run(ctx)
    }

    fn extraction_confidence(&self) -> Option<f64> {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_credit_note_passes() {
        let note: CreditNote = serde_json::from_str(
            r#"{"credit_note_number": "CN-7", "subtotal": "-200,00", "vat_amount": "-42,00",
                "total_amount": "-242,00",
                "lines": [{"description": "Returned chairs", "quantity": -2,
                           "unit_price": "100,00", "credited_amount": "-200,00"}]}"#,
        )
        .unwrap();
        let report = note.audit(&AuditContext::belgium());
        assert!(report.is_passed(), "{report:#?}");
        assert_eq!(report.failed_count, 0);
    }

    #[test]
    fn mismatched_signs_fail_the_vat_check() {
        let note: CreditNote = serde_json::from_str(
            r#"{"subtotal": "-200,00", "vat_amount": "42,00", "total_amount": "-158,00"}"#,
        )
        .unwrap();
        let report = note.audit(&AuditContext::belgium());
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.critical_failures[0].field, "vat_amount");
    }
}
