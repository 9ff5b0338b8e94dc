//! Audit configuration: tolerances, VAT rules and the confidence threshold.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vat::{VatRateValidator, VatRuleSet};

/// Default confidence threshold for auto-confirmation.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Absolute tolerances, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditTolerances {
    /// `subtotal + vat` vs `total`.
    pub totals_minor: i64,
    /// Sum of line amounts vs `subtotal`.
    pub line_items_minor: i64,
    /// `quantity × unit_price` vs line total.
    pub line_calculation_minor: i64,
}

impl Default for AuditTolerances {
    fn default() -> Self {
        Self {
            totals_minor: 2,
            line_items_minor: 2,
            line_calculation_minor: 1,
        }
    }
}

impl AuditTolerances {
    /// Sets the totals tolerance.
    #[must_use]
    pub const fn with_totals(mut self, minor: i64) -> Self {
        self.totals_minor = minor;
        self
    }

    /// Sets the line-sum tolerance.
    #[must_use]
    pub const fn with_line_items(mut self, minor: i64) -> Self {
        self.line_items_minor = minor;
        self
    }

    /// Sets the per-line calculation tolerance.
    #[must_use]
    pub const fn with_line_calculation(mut self, minor: i64) -> Self {
        self.line_calculation_minor = minor;
        self
    }

    /// Rejects negative tolerances.
    pub fn validate(&self) -> Result<(), ConfigError> {
        [
            ("totals_minor", self.totals_minor),
            ("line_items_minor", self.line_items_minor),
            ("line_calculation_minor", self.line_calculation_minor),
        ]
        .into_iter()
        .find(|(_, value)| *value < 0)
        .map_or(Ok(()), |(name, value)| {
            Err(ConfigError::NegativeTolerance { name, value })
        })
    }
}

/// Rejects confidence thresholds outside `0.0..=1.0`.
pub fn validate_threshold(threshold: f64) -> Result<f64, ConfigError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

/// Everything a document needs to audit itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditContext {
    tolerances: AuditTolerances,
    vat: VatRateValidator,
}

impl AuditContext {
    /// Builds a context after validating both parts.
    pub fn new(tolerances: AuditTolerances, vat_rules: VatRuleSet) -> Result<Self, ConfigError> {
        tolerances.validate()?;
        Ok(Self {
            tolerances,
            vat: VatRateValidator::new(vat_rules)?,
        })
    }

    /// Default tolerances with Belgian VAT rules.
    #[must_use]
    pub fn belgium() -> Self {
        Self::default()
    }

    /// Active tolerances.
    #[must_use]
    pub const fn tolerances(&self) -> &AuditTolerances {
        &self.tolerances
    }

    /// Active VAT validator.
    #[must_use]
    pub const fn vat(&self) -> &VatRateValidator {
        &self.vat
    }
}
