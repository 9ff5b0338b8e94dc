//! Error types for money arithmetic and configuration validation.

use thiserror::Error;

use crate::money::Currency;

/// Errors raised by checked [`Money`](crate::money::Money) arithmetic.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    /// The result does not fit in `i64` minor units.
    #[error("amount overflow")]
    Overflow,

    /// Both operands carry an explicit, different currency.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand.
        left: Currency,
        /// Currency of the right-hand operand.
        right: Currency,
    },
}

/// Configuration rejected at construction time.
///
/// These are programming-contract violations, never data problems: a
/// validator that receives odd document data reports it through an
/// [`AuditCheck`](crate::report::AuditCheck) instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A minor-unit tolerance was negative.
    #[error("tolerance `{name}` must be >= 0 (got {value})")]
    NegativeTolerance {
        /// Name of the offending tolerance.
        name: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// The VAT rate tolerance was negative or not finite.
    #[error("VAT rate tolerance must be a finite, non-negative percentage (got {0})")]
    InvalidRateTolerance(f64),

    /// A VAT rule set declared no base rates.
    #[error("VAT rule set `{0}` has no base rates")]
    EmptyRateTable(String),

    /// A VAT rate was outside `0..=100` or not finite.
    #[error("invalid VAT rate {0}%")]
    InvalidRate(f64),

    /// A confidence threshold was outside `0.0..=1.0`.
    #[error("confidence threshold must be within 0.0..=1.0 (got {0})")]
    InvalidThreshold(f64),

    /// A negative retry budget was requested.
    #[error("max_retries must be >= 0 (got {0})")]
    NegativeRetries(i64),

    /// The retry budget exceeds the hard ceiling.
    #[error("max_retries {requested} exceeds the ceiling of {ceiling}")]
    TooManyRetries {
        /// Requested retry count.
        requested: i64,
        /// Hard ceiling.
        ceiling: usize,
    },
}
