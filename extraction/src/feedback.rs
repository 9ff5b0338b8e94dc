//! Feedback prompts that point the extractor at the fields it got wrong.

use std::fmt::Write as _;

use ledgerlens_audit::report::{AuditCheck, AuditReport, CheckType};

/// Fixed re-reading guidance for each kind of check.
#[must_use]
pub const fn hint_for(check_type: CheckType) -> &'static str {
    match check_type {
        CheckType::MathTotals => {
            "Re-read subtotal, VAT amount and total in the totals block; subtotal plus VAT must equal the total."
        }
        CheckType::MathLineItems => {
            "Re-read every line amount; the included lines must add up to the subtotal."
        }
        CheckType::MathLineItemCalculation => {
            "Re-read quantity, unit price and line total of that line; quantity times unit price must equal the line total."
        }
        CheckType::ChecksumIban => {
            "Re-read the IBAN character by character; a single misread digit breaks the checksum."
        }
        CheckType::ChecksumOgm => {
            "Re-read the structured reference (+++XXX/XXXX/XXX+++) digit by digit."
        }
        CheckType::VatRate => {
            "Re-read the VAT rate and VAT amount near the total line, including any VAT breakdown table."
        }
        CheckType::LineItems => "List every line item printed on the document.",
    }
}

fn push_entry(out: &mut String, index: usize, check: &AuditCheck) {
    let _ = writeln!(
        out,
        "{index}. [{}] {}: {}",
        check.check_type, check.field, check.message
    );
    if let Some(hint) = &check.hint {
        let _ = writeln!(out, "   Hint: {hint}");
    }
}

/// Build the feedback prompt for one re-extraction attempt.
///
/// Lists every failed check, then every warning, each with its field and
/// message, followed by one line of guidance per distinct check type.
///
/// # Examples
///
/// ```
/// use ledgerlens_audit::report::{AuditCheck, AuditReport, CheckType};
/// use ledgerlens_extraction::feedback::build_feedback_prompt;
///
/// let report = AuditReport::from_checks(vec![AuditCheck::failed(
///     CheckType::MathTotals,
///     "total_amount",
///     "subtotal + VAT = 1210.00 but total is 1201.00 (off by 9.00)",
/// )]);
///
/// let prompt = build_feedback_prompt(&report, 1, 2);
/// assert!(prompt.starts_with("Attempt 1/2"));
/// assert!(prompt.contains("1. [math_totals] total_amount"));
/// ```
#[must_use]
pub fn build_feedback_prompt(report: &AuditReport, attempt: usize, max_retries: usize) -> String {
    let mut prompt = format!(
        "Attempt {attempt}/{max_retries}: the previous extraction failed {} audit check(s) and raised {} warning(s).\n\n",
        report.critical_failures.len(),
        report.warnings.len()
    );

    prompt.push_str("Issues:\n");
    for (i, check) in report.retryable_checks(true).enumerate() {
        push_entry(&mut prompt, i + 1, check);
    }

    let mut seen: Vec<CheckType> = Vec::new();
    for check in report.retryable_checks(true) {
        if !seen.contains(&check.check_type) {
            seen.push(check.check_type);
        }
    }
    if !seen.is_empty() {
        prompt.push_str("\nGuidance:\n");
        for check_type in seen {
            let _ = writeln!(prompt, "- {check_type}: {}", hint_for(check_type));
        }
    }

    prompt.push_str(
        "\nRe-examine only the regions of the document referenced above. \
         Keep every other field as previously extracted and return the complete JSON object again.",
    );
    prompt
}
