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

/// Sales invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Invoice {
    /// Invoice number as printed.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub invoice_number: Option<String>,
    /// Issue date.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub issue_date: Option<NaiveDate>,
    /// Payment due date.
    #[serde(default, deserialize_with = "lenient::date")]
    #[schemars(with = "LenientScalar")]
    pub due_date: Option<NaiveDate>,
    /// Issuing company.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub supplier_name: Option<String>,
    /// Invoiced customer.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub customer_name: Option<String>,
    /// Expense category.
    #[serde(default, deserialize_with = "lenient::category")]
    #[schemars(with = "LenientScalar")]
    pub category: Option<ExpenseCategory>,
    /// Total before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub subtotal: Option<Money>,
    /// VAT total.
    #[serde(default, deserialize_with = "lenient::money")]
    pub vat_amount: Option<Money>,
    /// Amount due.
    #[serde(default, deserialize_with = "lenient::money")]
    pub total_amount: Option<Money>,
    /// VAT table, one entry per rate.
    #[serde(default, deserialize_with = "lenient::list")]
    pub vat_breakdown: Vec<VatBreakdownEntry>,
    /// Invoice lines.
    #[serde(default, deserialize_with = "lenient::list")]
    pub line_items: Vec<InvoiceLine>,
    /// Supplier bank account.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub iban: Option<String>,
    /// Structured communication (`+++…+++`) or free-text reference.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub payment_reference: Option<String>,
    /// Extractor self-reported confidence in `0.0..=1.0`.
    #[serde(default, deserialize_with = "lenient::confidence")]
    #[schemars(with = "LenientScalar")]
    pub confidence: Option<f64>,
}

/// One invoice line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceLine {
    /// Line description.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "LenientScalar")]
    pub description: Option<String>,
    /// Quantity.
    #[serde(default, deserialize_with = "lenient::quantity")]
    #[schemars(with = "LenientScalar")]
    pub quantity: Option<f64>,
    /// Unit price before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub unit_price: Option<Money>,
    /// Line total before VAT.
    #[serde(default, deserialize_with = "lenient::money")]
    pub net_amount: Option<Money>,
    /// VAT rate of the line in percent.
    #[serde(default, deserialize_with = "lenient::quantity")]
    #[schemars(with = "LenientScalar")]
    pub vat_rate: Option<f64>,
}

impl LineItem for InvoiceLine {
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
        self.net_amount
    }
}

impl Auditable for Invoice {
    const KIND: DocumentKind = DocumentKind::Invoice;

    fn audit(&self, ctx: &AuditContext) -> AuditReport {
        AuditInput {
            kind: Self::KIND,
            subtotal: self.subtotal,
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            document_date: self.issue_date,
            category: self.category,
            vat_breakdown: &self.vat_breakdown,
            lines: &self.line_items,
            iban: self.iban.as_deref(),
            payment_reference: self.payment_reference.as_deref(),
        }
        .run(ctx)
    }

    fn extraction_confidence(&self) -> Option<f64> {
        self.confidence
    }
}
