//! Turning raw model output into a typed document.
//!
//! Models wrap JSON in Markdown fences or chatty prose. The parser strips
//! that, validates the object against the schema derived from the target
//! type, and only then deserializes, so schema violations are reported with
//! their instance paths instead of a single serde message.

use std::marker::PhantomData;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ExtractionError;

/// JSON schema of `T` as a plain value.
#[must_use]
pub fn schema_for<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

/// Locates the JSON object inside model output.
///
/// Prefers the first fenced code block; otherwise takes everything from the
/// first `{` to the last `}`.
///
/// # Examples
///
/// ```
/// use ledgerlens_extraction::parse::extract_json_block;
///
/// let raw = "Here you go:\n```json\n{\"total_amount\": \"12,10\"}\n```\nAnything else?";
/// assert_eq!(extract_json_block(raw), Some("{\"total_amount\": \"12,10\"}"));
/// assert_eq!(extract_json_block("Sure! {\"a\": 1} Done."), Some("{\"a\": 1}"));
/// assert_eq!(extract_json_block("no json here"), None);
/// ```
#[must_use]
pub fn extract_json_block(raw: &str) -> Option<&str> {
    if let Some(open) = raw.find("```") {
        let after_fence = &raw[open + 3..];
        // skip the language tag line
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let body = &after_fence[body_start..];
        if let Some(close) = body.find("```") {
            let inner = body[..close].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Collect all validation errors from a compiled validator.
///
/// Every failure is reported, not just the first.
pub fn collect_validation_errors(validator: &jsonschema::Validator, instance: &Value) -> Vec<String> {
    validator
        .iter_errors(instance)
        .map(|error| format!("At path '{}': {}", error.instance_path, error))
        .collect()
}

/// Schema-checked parser for one document type.
///
/// Compiles the schema once so it can be reused across retries.
pub struct StructuredParser<T> {
    schema: Value,
    validator: jsonschema::Validator,
    _target: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for StructuredParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredParser")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned + JsonSchema> StructuredParser<T> {
    /// Derives and compiles the schema of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Schema`] if the derived schema does not compile.
    pub fn new() -> Result<Self, ExtractionError> {
        let schema = schema_for::<T>();
        let validator =
            jsonschema::Validator::new(&schema).map_err(|e| ExtractionError::Schema(e.to_string()))?;
        Ok(Self {
            schema,
            validator,
            _target: PhantomData,
        })
    }

    /// The schema handed to the model.
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// Parses raw model output into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Parse`] when no JSON object can be found or it
    /// does not deserialize, and [`ExtractionError::SchemaValidation`] when it
    /// violates the schema.
    pub fn parse(&self, raw: &str) -> Result<T, ExtractionError> {
        let parse_error = |message: String| ExtractionError::Parse {
            message,
            raw_text: raw.to_string(),
        };

        let block = extract_json_block(raw).ok_or_else(|| parse_error("no JSON object in output".to_string()))?;
        let value: Value = serde_json::from_str(block).map_err(|e| parse_error(e.to_string()))?;

        let errors = collect_validation_errors(&self.validator, &value);
        if !errors.is_empty() {
            tracing::debug!(event = "schema_validation_failed", errors = errors.len());
            return Err(ExtractionError::SchemaValidation { errors });
        }

        serde_json::from_value(value).map_err(|e| parse_error(format!("deserialization failed: {e}")))
    }
}

/// One-shot form of [`StructuredParser::parse`].
///
/// # Errors
///
/// See [`StructuredParser::parse`].
///
/// # Examples
///
/// ```
/// use ledgerlens_audit::prelude::*;
/// use ledgerlens_extraction::parse::parse_structured;
///
/// let raw = "```json\n{\"subtotal\": \"100,00\", \"vat_amount\": \"21,00\", \"total_amount\": \"121,00\"}\n```";
/// let invoice: Invoice = parse_structured(raw).unwrap();
/// assert_eq!(invoice.total_amount, Some(Money::from_minor(12_100)));
/// ```
pub fn parse_structured<T: DeserializeOwned + JsonSchema>(raw: &str) -> Result<T, ExtractionError> {
    StructuredParser::<T>::new()?.parse(raw)
}
