//! Field deserializers that turn malformed model output into `None`.
//!
//! A model that writes `"n/a"` into an amount or `"yesterday"` into a date
//! must not sink the whole document: the field becomes absent and the
//! validators report it as `Incomplete`. Use them as
//! `#[serde(default, deserialize_with = "lenient::money")]`.

use chrono::NaiveDate;
use serde::de::{Deserializer, IgnoredAny};
use serde::Deserialize;

use crate::category::ExpenseCategory;
use crate::money::Money;

/// Any JSON value, with the scalar shapes a model emits pulled out.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RawScalar {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Parses a document date in the formats models commonly emit.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parses a quantity, accepting a comma as decimal separator.
#[must_use]
pub fn parse_quantity(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|q| q.is_finite())
}

fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<RawScalar>, D::Error> {
    Option::<RawScalar>::deserialize(deserializer)
}

/// Amount field.
pub fn money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Money>, D::Error> {
    Ok(raw(deserializer)?.and_then(RawScalar::into_money))
}

/// Date field.
pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(RawScalar::Text(text)) => parse_date(&text),
        _ => None,
    })
}

/// Quantity field; numbers or numeric strings such as `"1,5"`.
pub fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(RawScalar::Int(n)) => Some(n as f64),
        Some(RawScalar::Float(q)) => Some(q).filter(|q| q.is_finite()),
        Some(RawScalar::Text(text)) => parse_quantity(&text),
        _ => None,
    })
}

/// Confidence score in `0.0..=1.0`.
///
/// Values in `1..=100` are read as percentages; anything else outside the
/// unit interval is dropped.
pub fn confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = match raw(deserializer)? {
        Some(RawScalar::Int(n)) => Some(n as f64),
        Some(RawScalar::Float(f)) => Some(f),
        Some(RawScalar::Text(text)) => text.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    Ok(value.and_then(|v: f64| {
        if (0.0..=1.0).contains(&v) {
            Some(v)
        } else if v > 1.0 && v <= 100.0 {
            Some(v / 100.0)
        } else {
            None
        }
    }))
}

/// Free-text field; numbers are rendered, blanks become `None`.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(RawScalar::Text(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(RawScalar::Int(n)) => Some(n.to_string()),
        Some(RawScalar::Float(f)) => Some(f.to_string()),
        _ => None,
    })
}

/// Category field; non-strings become `None`, unknown tags `Other`.
pub fn category<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ExpenseCategory>, D::Error> {
    Ok(match raw(deserializer)? {
        Some(RawScalar::Text(text)) if !text.trim().is_empty() => {
            Some(ExpenseCategory::from_tag(&text))
        }
        _ => None,
    })
}

/// List field; `null` becomes an empty list.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Schema stand-in for leniently deserialized scalar fields.
///
/// Accepts any scalar so the schema gate never rejects what the field
/// deserializer would have tolerated.
#[derive(Debug)]
pub struct LenientScalar;

impl schemars::JsonSchema for LenientScalar {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "LenientScalar".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": ["string", "number", "integer", "null"]
        })
    }
}
