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

/// Purchase invoice received from a supplier.
///
/// Suppliers often print only gross figures, so `net_amount` is optional;
/// the audit then derives it as `total_amount - vat_amount`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Bill {
    /// Supplier's invoice number.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub bill_number: Option<String>,
    /// Date on the bill.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub bill_date: Option<NaiveDate>,
    /// Payment due date.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub due_date: Option<NaiveDate>,
    /// Supplier.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub vendor_name: Option<String>,
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
    /// Amount to pay.
    #[serde(default, deserialize_with = "lenient::money")]
    pub total_amount: Option<Money>,
    /// VAT table, one entry per rate.
    #[serde(default, deserialize_with = "lenient::list")]
    pub vat_breakdown: Vec<VatBreakdownEntry>,
    /// Bill lines.
    #[serde(default, deserialize_with = "lenient::list")]
    pub items: Vec<BillLineItem>,
    /// Supplier bank account.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub iban: Option<String>,
    /// Structured communication to quote when paying.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub structured_reference: Option<String>,
    /// Extractor self-reported confidence in `0.0..=1.0`.
    #[serde(default, deserialize_with = "lenient::confidence")]
    #[schemars(with = "LenientScalar")]
    pub confidence: Option<f64>,
}

/// One bill line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BillLineItem {
    /// Line label.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub label: Option<String>,
    /// Quantity.
    #[serde(default, deserialize_with = "lenient::quantity")]
    #[schemars(with = "LenientScalar")]
    pub qty: Option<f64>,
    /// Price per unit before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub price_per_unit: Option<Money>,
    /// Line amount before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub amount: Option<Money>,
}

impl LineItem for BillLineItem {
    fn description(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn quantity(&self) -> Option<f64> {
        self.qty
    }

    fn unit_price(&self) -> Option<Money> {
        self.price_per_unit
    }

    fn net_amount(&self) -> Option<Money> {
        self.amount
    }
}

impl Auditable for Bill {
    const KIND: DocumentKind = DocumentKind::Bill;

    fn audit(&self, ctx: &AuditContext) -> AuditReport {
        AuditInput {
            kind: Self::KIND,
            subtotal: self.net_amount,
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            document_date: self.bill_date,
            category: self.category,
            vat_breakdown: &self.vat_breakdown,
            lines: &self.items,
            iban: self.iban.as_deref(),
            payment_reference: self.structured_reference.as_deref(),
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
    use crate::report::{CheckStatus, CheckType};

    #[test]
    fn gross_only_bill_derives_net_for_vat_and_lines() {
        let bill: Bill = serde_json::from_str(
            r#"{
                "vendor_name": "ElectroShop",
                "bill_date": "03/01/2026",
                "category": "office",
                "vat_amount": 105.00,
                "total_amount": 605.00,
                "items": [
                    {"label": "Printer", "qty": 1, "price_per_unit": 500, "amount": 500},
                    {"label": "Recupel", "qty": 1, "price_per_unit": "1,00", "amount": "1,00"}
                ],
                "iban": "BE68539007547034"
            }"#,
        )
        .unwrap();
        let report = bill.audit(&AuditContext::belgium());
        let by_type = |t: CheckType| report.checks.iter().find(|c| c.check_type == t).unwrap();

        assert_eq!(by_type(CheckType::MathTotals).status, CheckStatus::Incomplete);
        assert_eq!(by_type(CheckType::VatRate).status, CheckStatus::Passed);
        assert_eq!(by_type(CheckType::MathLineItems).status, CheckStatus::Passed);
        assert_eq!(by_type(CheckType::ChecksumIban).status, CheckStatus::Passed);
        assert!(report.is_passed());
    }

    #[test]
    fn bills_without_lines_do_not_warn() {
        let bill: Bill = serde_json::from_str(
            r#"{"net_amount": "50,00", "vat_amount": "10,50", "total_amount": "60,50"}"#,
        )
        .unwrap();
        let report = bill.audit(&AuditContext::belgium());
        assert_eq!(report.warning_count, 0);
        assert_eq!(report.failed_count, 0);
    }
}
