//! Arithmetic consistency between totals, VAT and line items.

use crate::money::Money;
use crate::report::{AuditCheck, CheckType};

/// Field name used by [`verify_totals`].
pub const TOTALS_FIELD: &str = "total_amount";
/// Field name used by [`verify_line_items`].
pub const LINE_SUM_FIELD: &str = "line_items_sum";

/// Field name of the `n`-th (1-based) line item.
#[must_use]
pub fn line_field(line_number: usize) -> String {
    format!("line_items[{line_number}]")
}

/// Checks `subtotal + vat == total` within `tolerance_minor`.
///
/// ```
/// use ledgerlens_audit::math::verify_totals;
/// use ledgerlens_audit::money::Money;
/// use ledgerlens_audit::report::CheckStatus;
///
/// let check = verify_totals(
///     Some(Money::from_minor(10_000)),
///     Some(Money::from_minor(2_100)),
///     Some(Money::from_minor(12_100)),
///     2,
/// );
/// assert_eq!(check.status, CheckStatus::Passed);
/// ```
#[must_use]
pub fn verify_totals(
    subtotal: Option<Money>,
    vat: Option<Money>,
    total: Option<Money>,
    tolerance_minor: i64,
) -> AuditCheck {
    let (Some(subtotal), Some(vat), Some(total)) = (subtotal, vat, total) else {
        let missing: Vec<&str> = [
            ("subtotal", subtotal.is_none()),
            ("vat_amount", vat.is_none()),
            ("total_amount", total.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        return AuditCheck::incomplete(
            CheckType::MathTotals,
            TOTALS_FIELD,
            format!("cannot verify totals, missing {}", missing.join(", ")),
        );
    };

    let expected = match subtotal.checked_add(vat) {
        Ok(sum) => sum,
        Err(e) => {
            return AuditCheck::failed(
                CheckType::MathTotals,
                TOTALS_FIELD,
                format!("subtotal + VAT cannot be computed: {e}"),
            )
        }
    };
    if let Err(e) = expected.checked_sub(total) {
        return AuditCheck::failed(
            CheckType::MathTotals,
            TOTALS_FIELD,
            format!("total cannot be compared: {e}"),
        );
    }

    if expected.equals_within_tolerance(&total, tolerance_minor) {
        AuditCheck::passed(
            CheckType::MathTotals,
            TOTALS_FIELD,
            format!("{subtotal} + {vat} = {total}"),
        )
    } else {
        AuditCheck::failed(
            CheckType::MathTotals,
            TOTALS_FIELD,
            format!(
                "subtotal {subtotal} + VAT {vat} = {expected}, but total is {total} (off by {})",
                Money::from_minor(signed_diff(total, expected))
            ),
        )
    }
}

/// Checks that the line amounts add up to the subtotal.
#[must_use]
pub fn verify_line_items(
    line_totals: &[Money],
    subtotal: Option<Money>,
    tolerance_minor: i64,
) -> AuditCheck {
    if line_totals.is_empty() {
        return AuditCheck::incomplete(
            CheckType::MathLineItems,
            LINE_SUM_FIELD,
            "no line amounts to add up",
        );
    }
    let Some(subtotal) = subtotal else {
        return AuditCheck::incomplete(
            CheckType::MathLineItems,
            LINE_SUM_FIELD,
            "cannot verify line items, missing subtotal",
        );
    };

    let sum = match Money::checked_sum(line_totals.iter().copied())
        .and_then(|sum| sum.checked_sub(subtotal).map(|_| sum))
    {
        Ok(sum) => sum,
        Err(e) => {
            return AuditCheck::failed(
                CheckType::MathLineItems,
                LINE_SUM_FIELD,
                format!("line amounts cannot be added up: {e}"),
            )
        }
    };

    let count = line_totals.len();
    if sum.equals_within_tolerance(&subtotal, tolerance_minor) {
        AuditCheck::passed(
            CheckType::MathLineItems,
            LINE_SUM_FIELD,
            format!("{count} line amounts add up to {sum}"),
        )
    } else {
        AuditCheck::failed(
            CheckType::MathLineItems,
            LINE_SUM_FIELD,
            format!(
                "{count} line amounts add up to {sum}, but subtotal is {subtotal} (off by {})",
                Money::from_minor(signed_diff(sum, subtotal))
            ),
        )
    }
}

/// Checks `quantity × unit_price == line_total` for line `line_number` (1-based).
#[must_use]
pub fn verify_line_item_calculation(
    quantity: Option<f64>,
    unit_price: Option<Money>,
    line_total: Option<Money>,
    line_number: usize,
    tolerance_minor: i64,
) -> AuditCheck {
    let field = line_field(line_number);
    let (Some(quantity), Some(unit_price), Some(line_total)) = (quantity, unit_price, line_total)
    else {
        let missing: Vec<&str> = [
            ("quantity", quantity.is_none()),
            ("unit price", unit_price.is_none()),
            ("line total", line_total.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        return AuditCheck::incomplete(
            CheckType::MathLineItemCalculation,
            field,
            format!("line {line_number}: cannot verify, missing {}", missing.join(", ")),
        );
    };

    let Some(expected) = unit_price.scaled(quantity) else {
        return AuditCheck::failed(
            CheckType::MathLineItemCalculation,
            field,
            format!("line {line_number}: quantity {quantity} is not a usable number"),
        );
    };

    if expected.equals_within_tolerance(&line_total, tolerance_minor) {
        AuditCheck::passed(
            CheckType::MathLineItemCalculation,
            field,
            format!("line {line_number}: {quantity} × {unit_price} = {line_total}"),
        )
    } else {
        AuditCheck::failed(
            CheckType::MathLineItemCalculation,
            field,
            format!(
                "line {line_number}: {quantity} × {unit_price} = {expected}, but line total is {line_total}"
            ),
        )
    }
}

fn signed_diff(a: Money, b: Money) -> i64 {
    a.minor_units().saturating_sub(b.minor_units())
}
