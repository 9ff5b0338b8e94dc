//! Configuration for the feedback-driven retry loop.

use std::time::Duration;

use ledgerlens_audit::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Hard ceiling on `max_retries`; every retry is a paid model call.
pub const MAX_RETRIES_CEILING: usize = 10;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of re-extractions after the initial one (default: 2).
    pub max_retries: usize,
    /// Whether warnings alone trigger a retry (default: false).
    pub retry_on_warnings: bool,
    /// Upper bound for a single re-extraction call (default: none).
    #[serde(with = "optional_secs")]
    pub call_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_on_warnings: false,
            call_timeout: None,
        }
    }
}

impl RetryConfig {
    /// Builds a config from an untrusted retry count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NegativeRetries`] for negative counts and
    /// [`ConfigError::TooManyRetries`] above [`MAX_RETRIES_CEILING`].
    pub fn try_new(max_retries: i64, retry_on_warnings: bool) -> Result<Self, ConfigError> {
        let max_retries = usize::try_from(max_retries)
            .map_err(|_| ConfigError::NegativeRetries(max_retries))?;
        let config = Self {
            max_retries,
            retry_on_warnings,
            call_timeout: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects retry counts above [`MAX_RETRIES_CEILING`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_CEILING {
            return Err(ConfigError::TooManyRetries {
                requested: i64::try_from(self.max_retries).unwrap_or(i64::MAX),
                ceiling: MAX_RETRIES_CEILING,
            });
        }
        Ok(())
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    /// Set whether warnings alone trigger a retry.
    #[must_use]
    pub const fn with_retry_on_warnings(mut self, retry: bool) -> Self {
        self.retry_on_warnings = retry;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

/// `Option<Duration>` as fractional seconds.
mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| {
            Duration::try_from_secs_f64(s).map_err(|e| serde::de::Error::custom(format!("invalid timeout {s}: {e}")))
        })
        .transpose()
    }
}
