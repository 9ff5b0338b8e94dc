//! Fixed-point monetary amounts and tolerant parsing of model output.
//!
//! Amounts are stored as `i64` minor units (cents). Arithmetic never goes
//! through floating point, and parsing rejects anything it cannot represent
//! exactly instead of truncating it.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::MoneyError;
use crate::lenient::RawScalar;

const MINOR_PER_MAJOR: i64 = 100;

/// Currency codes recognised as prefixes or suffixes in free text.
///
/// All of them use two decimal places.
const KNOWN_CODES: &[&str] = &[
    "EUR", "USD", "GBP", "CHF", "SEK", "NOK", "DKK", "PLN", "CZK", "CAD", "AUD",
];

/// ISO-4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Euro.
    pub const EUR: Self = Self(*b"EUR");
    /// US dollar.
    pub const USD: Self = Self(*b"USD");
    /// Pound sterling.
    pub const GBP: Self = Self(*b"GBP");

    /// Parses a three-letter currency code, case-insensitively.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        if !KNOWN_CODES.contains(&upper.as_str()) {
            return None;
        }
        let bytes = upper.as_bytes();
        Some(Self([bytes[0], bytes[1], bytes[2]]))
    }

    const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '€' => Some(Self::EUR),
            '$' => Some(Self::USD),
            '£' => Some(Self::GBP),
            _ => None,
        }
    }

    /// The three-letter code.
    #[must_use]
    pub fn code(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount in minor units with an optional currency context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    minor_units: i64,
    currency: Option<Currency>,
}

impl Money {
    /// Zero, without currency.
    pub const ZERO: Self = Self::from_minor(0);

    /// Creates an amount from minor units (e.g. cents).
    #[must_use]
    pub const fn from_minor(minor_units: i64) -> Self {
        Self {
            minor_units,
            currency: None,
        }
    }

    /// Returns the same amount tagged with `currency`.
    #[must_use]
    pub const fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Currency context, if known.
    #[must_use]
    pub const fn currency(&self) -> Option<Currency> {
        self.currency
    }

    /// `true` when the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// `true` when the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Absolute value, saturating at `i64::MAX`.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self {
            minor_units: self.minor_units.saturating_abs(),
            currency: self.currency,
        }
    }

    /// Parses an amount from free text.
    ///
    /// Accepts `1234.56`, `1.234,56`, `1 234,56`, `€ 12,50`, `12.50 EUR` and
    /// a leading sign. Returns `None` for anything with more than one decimal
    /// separator, malformed digit grouping, more than two fractional digits
    /// or non-numeric residue.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut rest = text.trim();
        if rest.is_empty() {
            return None;
        }

        let (after_sign, mut negative) = strip_sign(rest);
        let signed = after_sign.len() != rest.len();
        rest = after_sign;

        let mut currency = None;
        if let Some((code, after)) = strip_currency_prefix(rest) {
            currency = Some(code);
            rest = after.trim_start();
        }
        if let Some((code, before)) = strip_currency_suffix(rest) {
            if currency.is_some_and(|c| c != code) {
                return None;
            }
            currency = Some(code);
            rest = before.trim_end();
        }

        // A sign may also follow the currency marker ("€ -3,00"), but only once.
        let (after_sign, inner_negative) = strip_sign(rest);
        if after_sign.len() != rest.len() {
            if signed {
                return None;
            }
            negative = inner_negative;
            rest = after_sign;
        }

        let magnitude = parse_grouped_decimal(rest)?;
        let minor_units = if negative { -magnitude } else { magnitude };
        Some(Self {
            minor_units,
            currency,
        })
    }

    /// Adds two amounts, failing on overflow or conflicting currencies.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        let currency = merge_currency(self.currency, other.currency)?;
        let minor_units = self
            .minor_units
            .checked_add(other.minor_units)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self {
            minor_units,
            currency,
        })
    }

    /// Subtracts `other`, failing on overflow or conflicting currencies.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        let currency = merge_currency(self.currency, other.currency)?;
        let minor_units = self
            .minor_units
            .checked_sub(other.minor_units)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self {
            minor_units,
            currency,
        })
    }

    /// Sums a sequence of amounts with checked arithmetic.
    pub fn checked_sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    /// Multiplies by a (possibly fractional) factor, rounding half away from
    /// zero to the nearest minor unit.
    ///
    /// Returns `None` when the factor is not finite or the result does not fit.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Option<Self> {
        if !factor.is_finite() {
            return None;
        }
        let scaled = (self.minor_units as f64 * factor).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self {
            minor_units: scaled as i64,
            currency: self.currency,
        })
    }

    /// Absolute distance to `other` in minor units.
    #[must_use]
    pub const fn distance(&self, other: &Self) -> u64 {
        (self.minor_units as i128 - other.minor_units as i128).unsigned_abs() as u64
    }

    /// `true` when both amounts differ by at most `tolerance_minor` minor units.
    ///
    /// Currencies are not compared here; callers combine amounts with
    /// [`Money::checked_add`] first, which does.
    #[must_use]
    pub const fn equals_within_tolerance(&self, other: &Self, tolerance_minor: i64) -> bool {
        if tolerance_minor < 0 {
            return false;
        }
        self.distance(other) <= tolerance_minor as u64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(currency) = self.currency {
            write!(f, "{currency} ")?;
        }
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unparseable amount: {s:?}"))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawScalar::deserialize(deserializer)? {
            RawScalar::Other(_) => Err(de::Error::custom("expected an amount string or number")),
            raw => raw
                .into_money()
                .ok_or_else(|| de::Error::custom("unparseable amount")),
        }
    }
}

impl schemars::JsonSchema for Money {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "Money".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "description": "Monetary amount as printed on the document, e.g. \"1.234,56\" or 1234.56",
            "type": ["string", "number"]
        })
    }
}

impl RawScalar {
    pub(crate) fn into_money(self) -> Option<Money> {
        match self {
            Self::Int(major) => major.checked_mul(MINOR_PER_MAJOR).map(Money::from_minor),
            Self::Float(value) => parse_plain_number(value),
            Self::Text(text) => Money::parse(&text),
            Self::Other(_) => None,
        }
    }
}

/// Converts a JSON number through its shortest decimal representation so
/// `12.3` becomes exactly 1230 minor units.
fn parse_plain_number(value: f64) -> Option<Money> {
    if !value.is_finite() {
        return None;
    }
    let text = value.to_string();
    let (negative, digits) = text
        .strip_prefix('-')
        .map_or((false, text.as_str()), |d| (true, d));
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let magnitude = compose_minor(int_part, frac_part)?;
    Some(Money::from_minor(if negative { -magnitude } else { magnitude }))
}

fn merge_currency(
    left: Option<Currency>,
    right: Option<Currency>,
) -> Result<Option<Currency>, MoneyError> {
    match (left, right) {
        (Some(l), Some(r)) if l != r => Err(MoneyError::CurrencyMismatch { left: l, right: r }),
        (Some(c), _) | (None, Some(c)) => Ok(Some(c)),
        (None, None) => Ok(None),
    }
}

fn strip_sign(text: &str) -> (&str, bool) {
    if let Some(rest) = text.strip_prefix('-') {
        (rest.trim_start(), true)
    } else if let Some(rest) = text.strip_prefix('+') {
        (rest.trim_start(), false)
    } else {
        (text, false)
    }
}

fn strip_currency_prefix(text: &str) -> Option<(Currency, &str)> {
    let first = text.chars().next()?;
    if let Some(currency) = Currency::from_symbol(first) {
        return Some((currency, &text[first.len_utf8()..]));
    }
    let code = text.get(..3)?;
    let currency = Currency::from_code(code)?;
    let rest = &text[3..];
    if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((currency, rest))
}

fn strip_currency_suffix(text: &str) -> Option<(Currency, &str)> {
    let last = text.chars().next_back()?;
    if let Some(currency) = Currency::from_symbol(last) {
        return Some((currency, &text[..text.len() - last.len_utf8()]));
    }
    let split = text.len().checked_sub(3)?;
    let code = text.get(split..)?;
    let currency = Currency::from_code(code)?;
    let rest = &text[..split];
    if rest.ends_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((currency, rest))
}

const fn is_group_char(c: char) -> bool {
    matches!(c, ' ' | '\'' | '\u{a0}' | '\u{202f}')
}

/// Parses an unsigned amount with optional digit grouping into minor units.
fn parse_grouped_decimal(body: &str) -> Option<i64> {
    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',' || is_group_char(c))
    {
        return None;
    }

    let decimal = decimal_separator(body)?;
    let (int_part, frac_part) = match decimal {
        Some(sep) => body.rsplit_once(sep)?,
        None => (body, ""),
    };
    if decimal.is_some() && frac_part.is_empty() {
        return None;
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let int_digits = ungroup(int_part)?;
    compose_minor(&int_digits, frac_part)
}

/// Decides which character (if any) is the decimal separator.
///
/// Outer `None` means the text is ambiguous beyond repair.
fn decimal_separator(body: &str) -> Option<Option<char>> {
    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    if commas == 0 && dots == 0 {
        return Some(None);
    }

    if commas > 0 && dots > 0 {
        let last = body.chars().rev().find(|&ch| ch == ',' || ch == '.')?;
        let occurrences = if last == ',' { commas } else { dots };
        if occurrences > 1 {
            return None;
        }
        return Some(Some(last));
    }

    let sep = if commas > 0 { ',' } else { '.' };
    if commas + dots > 1 {
        return Some(None);
    }
    let (int_part, frac_part) = body.split_once(sep)?;
    let int_has_value = int_part.chars().any(|c| c.is_ascii_digit() && c != '0');
    if frac_part.len() == 3 && frac_part.chars().all(|c| c.is_ascii_digit()) && int_has_value {
        Some(None)
    } else {
        Some(Some(sep))
    }
}

/// Removes grouping separators, checking that every group after the first
/// has exactly three digits.
fn ungroup(int_part: &str) -> Option<String> {
    if int_part.is_empty() {
        return Some("0".to_string());
    }
    let groups: Vec<&str> = int_part
        .split(|c: char| !c.is_ascii_digit())
        .collect();
    if groups.len() > 1 {
        let (first, others) = groups.split_first()?;
        if first.is_empty() || first.len() > 3 || others.iter().any(|g| g.len() != 3) {
            return None;
        }
    }
    Some(groups.concat())
}

fn compose_minor(int_digits: &str, frac_digits: &str) -> Option<i64> {
    if frac_digits.len() > 2 || !int_digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let major: i64 = if int_digits.is_empty() {
        0
    } else {
        int_digits.parse().ok()?
    };
    let frac: i64 = match frac_digits.len() {
        0 => 0,
        1 => frac_digits.parse::<i64>().ok()? * 10,
        _ => frac_digits.parse().ok()?,
    };
    major.checked_mul(MINOR_PER_MAJOR)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn minor(text: &str) -> Option<i64> {
        Money::parse(text).map(|m| m.minor_units())
    }

    #[test]
    fn parses_common_formats() {
        assert_eq!(minor("1234.56"), Some(123_456));
        assert_eq!(minor("1.234,56"), Some(123_456));
        assert_eq!(minor("1,234.56"), Some(123_456));
        assert_eq!(minor("1 234,56"), Some(123_456));
        assert_eq!(minor("  12,5 "), Some(1250));
        assert_eq!(minor("0,99"), Some(99));
        assert_eq!(minor("42"), Some(4200));
    }

    #[test]
    fn parses_currency_markers() {
        let eur = Money::parse("€ 12,50").unwrap();
        assert_eq!(eur.minor_units(), 1250);
        assert_eq!(eur.currency(), Some(Currency::EUR));

        let suffixed = Money::parse("12.50 EUR").unwrap();
        assert_eq!(suffixed.currency(), Some(Currency::EUR));

        let usd = Money::parse("$1,000.00").unwrap();
        assert_eq!(usd.minor_units(), 100_000);
        assert_eq!(usd.currency(), Some(Currency::USD));

        assert_eq!(minor("12,50€"), Some(1250));
    }

    #[test]
    fn parses_negative_amounts() {
        assert_eq!(minor("-3,00"), Some(-300));
        assert_eq!(minor("€ -3,00"), Some(-300));
        assert_eq!(minor("-€3.00"), Some(-300));
        assert_eq!(minor("--3"), None);
    }

    #[test]
    fn single_separator_with_three_digits_is_grouping() {
        assert_eq!(minor("1.234"), Some(123_400));
        assert_eq!(minor("12,345"), Some(1_234_500));
        assert_eq!(minor("1.234.567"), Some(123_456_700));
    }

    #[test]
    fn rejects_what_it_cannot_represent() {
        assert_eq!(minor(""), None);
        assert_eq!(minor("   "), None);
        assert_eq!(minor("abc"), None);
        assert_eq!(minor("12.5x"), None);
        assert_eq!(minor("1,234.56,78"), None);
        assert_eq!(minor("1.2.3"), None);
        assert_eq!(minor("0,125"), None);
        assert_eq!(minor("12."), None);
        assert_eq!(minor("EUR 12 USD"), None);
        assert_eq!(minor("€ 12 $"), None);
    }

    #[test]
    fn display_is_plain_decimal() {
        assert_eq!(Money::from_minor(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(
            Money::from_minor(1250).with_currency(Currency::EUR).to_string(),
            "EUR 12.50"
        );
    }

    #[test]
    fn checked_arithmetic_guards_currency_and_overflow() {
        let eur = Money::from_minor(100).with_currency(Currency::EUR);
        let usd = Money::from_minor(100).with_currency(Currency::USD);
        let bare = Money::from_minor(50);

        assert_eq!(
            eur.checked_add(bare).unwrap(),
            Money::from_minor(150).with_currency(Currency::EUR)
        );
        assert!(matches!(
            eur.checked_add(usd),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
        assert_eq!(
            Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn tolerance_is_absolute_minor_units() {
        let a = Money::from_minor(10_000);
        assert!(a.equals_within_tolerance(&Money::from_minor(10_002), 2));
        assert!(!a.equals_within_tolerance(&Money::from_minor(10_003), 2));
        assert!(!a.equals_within_tolerance(&a, -1));
    }

    #[test]
    fn scaled_rounds_to_nearest_minor_unit() {
        let unit = Money::from_minor(333);
        assert_eq!(unit.scaled(3.0), Some(Money::from_minor(999)));
        assert_eq!(unit.scaled(1.5), Some(Money::from_minor(500)));
        assert_eq!(unit.scaled(f64::NAN), None);
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let from_number: Money = serde_json::from_str("12.3").unwrap();
        assert_eq!(from_number.minor_units(), 1230);
        let from_int: Money = serde_json::from_str("7").unwrap();
        assert_eq!(from_int.minor_units(), 700);
        let from_text: Money = serde_json::from_str("\"1.234,56\"").unwrap();
        assert_eq!(from_text.minor_units(), 123_456);
        assert!(serde_json::from_str::<Money>("\"n/a\"").is_err());
        assert!(serde_json::from_str::<Money>("12.345").is_err());

        let tagged = Money::from_minor(1250).with_currency(Currency::EUR);
        let json = serde_json::to_string(&tagged).unwrap();
        assert_eq!(json, "\"EUR 12.50\"");
        assert_eq!(serde_json::from_str::<Money>(&json).unwrap(), tagged);
    }

    proptest! {
        #[test]
        fn separator_style_does_not_change_value(major in 0i64..10_000_000, cents in 0i64..100) {
            let plain = format!("{major}.{cents:02}");
            let continental = format!("{},{cents:02}", group(major, '.'));
            let anglo = format!("{}.{cents:02}", group(major, ','));
            let expected = major * 100 + cents;

            prop_assert_eq!(minor(&plain), Some(expected));
            prop_assert_eq!(minor(&continental), Some(expected));
            prop_assert_eq!(minor(&anglo), Some(expected));
            prop_assert_eq!(
                Money::parse(&continental).map(|m| m.to_string()),
                Some(format!("{major}.{cents:02}"))
            );
        }
    }

    fn group(value: i64, sep: char) -> String {
        let digits = value.to_string();
        let mut out = String::new();
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(sep);
            }
            out.push(ch);
        }
        out
    }
}
