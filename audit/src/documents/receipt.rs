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

/// Till receipt. Already paid, so no payment details are checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Receipt {
    /// Shop or restaurant.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub merchant_name: Option<String>,
    /// Date of purchase.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub receipt_date: Option<NaiveDate>,
    /// Expense category.
    #[serde(default, deserialize_with = "lenient::category")]
    #[schemars(with = "LenientScalar")]
    pub category: Option<ExpenseCategory>,
    /// Total before VAT, when printed.
    #[serde(default, deserialize_with = "lenient::money")]
    pub net_amount: Option<Money>,
    /// VAT total.
    #[serde(default, deserialize_with = "lenient::money")]
    pub vat_amount: Option<Money>,
    /// Amount paid.
    #[serde(default, deserialize_with = "lenient::money")]
    pub total_amount: Option<Money>,
    /// VAT table, one entry per rate.
    #[serde(default, deserialize_with = "lenient::list")]
    pub vat_breakdown: Vec<VatBreakdownEntry>,
    /// Purchased items.
    #[serde(default, deserialize_with = "lenient::list")]
    pub items: Vec<ReceiptItem>,
    /// Extractor self-reported confidence in `0.0..=1.0`.
    #[serde(default, deserialize_with = "lenient::confidence")]
    #[schemars(with = "LenientScalar")]
    pub confidence: Option<f64>,
}

/// One receipt line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReceiptItem {
    /// Item name.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub name: Option<String>,
    /// Number of units (or weight).
    #[serde(default, deserialize_with = "lenient::quantity")]
    #[schemars(with = "LenientScalar")]
    pub count: Option<f64>,
    /// Price per unit.
    #[serde(default, deserialize_with = "lenient::money")]
    pub price: Option<Money>,
    /// Line total.
    #[serde(default, deserialize_with = "lenient::money")]
    pub line_total: Option<Money>,
}

impl LineItem for ReceiptItem {
    fn description(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn quantity(&self) -> Option<f64> {
        self.count
    }

    fn unit_price(&self) -> Option<Money> {
        self.price
    }

    fn net_amount(&self) -> Option<Money> {
        self.line_total
    }
}

impl Auditable for Receipt {
    const KIND: DocumentKind = DocumentKind::Receipt;

    fn audit(&self, ctx: &AuditContext) -> AuditReport {
        AuditInput {
            kind: Self::KIND,
            subtotal: self.net_amount,
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            document_date: self.receipt_date,
            category: self.category,
            vat_breakdown: &self.vat_breakdown,
            lines: &self.items,
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
    use crate::report::CheckType;

    #[test]
    fn receipt_skips_payment_checks() {
        let receipt: Receipt = serde_json::from_str(
            r#"{"merchant_name": "Bakkerij Peeters", "total_amount": "10,60",
                "vat_amount": "0,60", "net_amount": "10,00"}"#,
        )
        .unwrap();
        let report = receipt.audit(&AuditContext::belgium());
        assert!(report.is_passed());
        assert!(report
            .checks
            .iter()
            .all(|c| !matches!(c.check_type, CheckType::ChecksumIban | CheckType::ChecksumOgm)));
    }

    #[test]
    fn mixed_rate_receipt_is_checked_per_band() {
        let receipt: Receipt = serde_json::from_str(
            r#"{"total_amount": "18,16", "vat_amount": "2,16", "net_amount": "16,00",
                "vat_breakdown": [
                    {"rate": 6, "base": "8,00", "amount": "0,48"},
                    {"rate": "21", "base": "8,00", "amount": "1,68"}
                ],
                "items": [
                    {"name": "Bread", "count": "2", "price": "4,00", "line_total": "8,00"},
                    {"name": "Candles", "count": 1, "price": "8,00", "line_total": "8,00"}
                ]}"#,
        )
        .unwrap();
        let report = receipt.audit(&AuditContext::belgium());
        let vat_checks: Vec<_> = report
            .checks
            .iter()
            .filter(|c| c.check_type == CheckType::VatRate)
            .collect();
        assert_eq!(vat_checks.len(), 2);
        assert!(report.is_passed(), "{report:#?}");
    }
}
