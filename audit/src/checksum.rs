//! IBAN and Belgian structured-communication (OGM) checksums.
//!
//! Both use the mod-97 scheme. The digit strings are folded one character at
//! a time so arbitrarily long inputs never need big-integer arithmetic.

use crate::report::{AuditCheck, CheckType};

const IBAN_MIN_LEN: usize = 15;
const IBAN_MAX_LEN: usize = 34;

/// Normalizes an IBAN: drops whitespace and uppercases.
#[must_use]
pub fn normalize_iban(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Mod-97 of a digit/letter string, letters counting as `10..=35`.
fn mod97(chars: impl Iterator<Item = char>) -> Option<u32> {
    let mut remainder = 0u32;
    for c in chars {
        let value = c.to_digit(36)?;
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    Some(remainder)
}

/// `true` when `raw` is a structurally valid IBAN with a correct checksum.
///
/// ```
/// use ledgerlens_audit::checksum::is_valid_iban;
///
/// assert!(is_valid_iban("BE68 5390 0754 7034"));
/// assert!(!is_valid_iban("BE86 5390 0754 7034"));
/// ```
#[must_use]
pub fn is_valid_iban(raw: &str) -> bool {
    iban_problem(&normalize_iban(raw)).is_none()
}

fn iban_problem(iban: &str) -> Option<String> {
    let len = iban.chars().count();
    if !(IBAN_MIN_LEN..=IBAN_MAX_LEN).contains(&len) {
        return Some(format!(
            "IBAN has {len} characters, expected {IBAN_MIN_LEN} to {IBAN_MAX_LEN}"
        ));
    }
    if !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some("IBAN contains characters other than letters and digits".to_string());
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_alphabetic) || !bytes[2..4].iter().all(u8::is_ascii_digit)
    {
        return Some("IBAN must start with a country code and two check digits".to_string());
    }

    let rotated = iban[4..].chars().chain(iban[..4].chars());
    match mod97(rotated) {
        Some(1) => None,
        Some(remainder) => Some(format!("IBAN checksum mismatch (mod 97 = {remainder}, expected 1)")),
        None => Some("IBAN contains characters other than letters and digits".to_string()),
    }
}

/// Audits an optional IBAN field.
#[must_use]
pub fn verify_iban(field: &str, value: Option<&str>) -> AuditCheck {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return AuditCheck::incomplete(CheckType::ChecksumIban, field, "no IBAN on document");
    };
    let iban = normalize_iban(raw);
    match iban_problem(&iban) {
        None => AuditCheck::passed(CheckType::ChecksumIban, field, format!("IBAN {iban} is valid")),
        Some(problem) => AuditCheck::failed(CheckType::ChecksumIban, field, problem),
    }
}

/// Check digits for an 8-digit OGM base (`base mod 97`, with 0 mapped to 97).
#[must_use]
pub const fn ogm_check_digits(base: u32) -> u32 {
    match base % 97 {
        0 => 97,
        r => r,
    }
}

/// Formats an 8-digit base and its check digits as `+++XXX/XXXX/XXX+++`.
///
/// Returns `None` when `base` has more than eight digits.
///
/// ```
/// use ledgerlens_audit::checksum::format_ogm;
///
/// assert_eq!(format_ogm(12_345_678).as_deref(), Some("+++123/4567/803+++"));
/// ```
#[must_use]
pub fn format_ogm(base: u32) -> Option<String> {
    if base > 99_999_999 {
        return None;
    }
    let digits = format!("{base:08}{:02}", ogm_check_digits(base));
    Some(format!("+++{}/{}/{}+++", &digits[..3], &digits[3..7], &digits[7..]))
}

/// `true` when `raw` carries exactly ten digits with valid OGM check digits.
#[must_use]
pub fn is_valid_ogm(raw: &str) -> bool {
    matches!(ogm_parts(raw), Some((base, check)) if ogm_check_digits(base) == check)
}

fn ogm_parts(raw: &str) -> Option<(u32, u32)> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 10 {
        return None;
    }
    let base = digits[..8].parse().ok()?;
    let check = digits[8..].parse().ok()?;
    Some((base, check))
}

fn looks_structured(raw: &str) -> bool {
    raw.contains("+++") || raw.contains("***")
}

/// Audits an optional structured payment reference.
///
/// Free-text references without `+++`/`***` markers that do not carry ten
/// digits are not structured communications, so they are reported as
/// `Incomplete` rather than `Failed`.
#[must_use]
pub fn verify_ogm(field: &str, value: Option<&str>) -> AuditCheck {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return AuditCheck::incomplete(CheckType::ChecksumOgm, field, "no structured reference");
    };

    match ogm_parts(raw) {
        Some((base, check)) => {
            let expected = ogm_check_digits(base);
            if expected == check {
                AuditCheck::passed(CheckType::ChecksumOgm, field, format!("reference {raw} is valid"))
            } else {
                AuditCheck::failed(
                    CheckType::ChecksumOgm,
                    field,
                    format!("reference {raw} has check digits {check:02}, expected {expected:02}"),
                )
            }
        }
        None if looks_structured(raw) => AuditCheck::failed(
            CheckType::ChecksumOgm,
            field,
            format!("structured reference {raw} does not contain exactly 10 digits"),
        ),
        None => AuditCheck::incomplete(
            CheckType::ChecksumOgm,
            field,
            format!("reference {raw:?} is free text, not a structured communication"),
        ),
    }
}
