//! One line-item algorithm for every document shape.

use serde::{Deserialize, Serialize};

use crate::config::AuditTolerances;
use crate::documents::DocumentKind;
use crate::math::{verify_line_item_calculation, verify_line_items, LINE_SUM_FIELD};
use crate::money::Money;
use crate::report::{AuditCheck, CheckType};

/// Field name of the "line items present" check.
pub const LINE_ITEMS_FIELD: &str = "line_items";

/// Accessors shared by the line types of all documents.
pub trait LineItem {
    /// Printed description.
    fn description(&self) -> Option<&str>;
    /// Quantity, possibly fractional.
    fn quantity(&self) -> Option<f64>;
    /// Price per unit.
    fn unit_price(&self) -> Option<Money>;
    /// Line total before VAT.
    fn net_amount(&self) -> Option<Money>;
}

/// Description patterns of lines that are already included elsewhere
/// (recycling fees, "incl." notes) and must not count toward the subtotal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    patterns: Vec<String>,
}

const COMMON_PATTERNS: &[&str] = &["incl.", "inclusief", "inbegrepen", "included", "inclus"];

const FEE_PATTERNS: &[&str] = &[
    "recupel",
    "bebat",
    "recycling fee",
    "eco-fee",
    "ecotaks",
    "auvibel",
    "reprobel",
];

impl ExclusionRules {
    /// Builds rules from case-insensitive substring patterns.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Patterns applicable to a document type.
    ///
    /// Bills and receipts of consumer goods carry statutory recycling fees
    /// that are already part of the item price; invoices and credit notes
    /// only get the generic "included" markers.
    #[must_use]
    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Bill | DocumentKind::Receipt => {
                Self::new(COMMON_PATTERNS.iter().chain(FEE_PATTERNS))
            }
            DocumentKind::Invoice | DocumentKind::CreditNote => Self::new(COMMON_PATTERNS),
        }
    }

    /// The normalized patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `true` when `description` contains any pattern.
    #[must_use]
    pub fn is_excluded(&self, description: Option<&str>) -> bool {
        let Some(description) = description else {
            return false;
        };
        let lowered = description.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// Whether a document type is expected to list its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemExpectation {
    /// Missing lines produce a warning.
    Expected,
    /// Missing lines are fine.
    Optional,
}

/// Runs the per-line calculation checks and the subtotal sum check.
///
/// Excluded lines are still checked individually but left out of the sum.
#[must_use]
pub fn validate_line_items<L: LineItem>(
    items: &[L],
    subtotal: Option<Money>,
    exclusions: &ExclusionRules,
    tolerances: &AuditTolerances,
    expectation: LineItemExpectation,
) -> Vec<AuditCheck> {
    if items.is_empty() {
        return match expectation {
            LineItemExpectation::Expected => vec![AuditCheck::warning(
                CheckType::LineItems,
                LINE_ITEMS_FIELD,
                "no line items were extracted",
            )],
            LineItemExpectation::Optional => Vec::new(),
        };
    }

    let mut checks: Vec<AuditCheck> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            verify_line_item_calculation(
                item.quantity(),
                item.unit_price(),
                item.net_amount(),
                index + 1,
                tolerances.line_calculation_minor,
            )
        })
        .collect();

    let mut counted = Vec::with_capacity(items.len());
    let mut unpriced = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if exclusions.is_excluded(item.description()) {
            tracing::debug!(
                event = "line_item_excluded",
                line = index + 1,
                description = item.description().unwrap_or_default(),
            );
            continue;
        }
        match item.net_amount() {
            Some(amount) => counted.push(amount),
            None => unpriced.push(index + 1),
        }
    }

    let sum_check = if unpriced.is_empty() {
        verify_line_items(&counted, subtotal, tolerances.line_items_minor)
    } else {
        let lines: Vec<String> = unpriced.iter().map(ToString::to_string).collect();
        AuditCheck::incomplete(
            CheckType::MathLineItems,
            LINE_SUM_FIELD,
            format!("cannot add up line items, no amount on line(s) {}", lines.join(", ")),
        )
    };
    checks.push(sum_check);
    checks
}
