//! On-disk configuration for the `ledgerlens` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ledgerlens_audit::config::{validate_threshold, AuditContext, AuditTolerances, DEFAULT_CONFIDENCE_THRESHOLD};
use ledgerlens_audit::vat::VatRuleSet;
use ledgerlens_extraction::config::RetryConfig;
use ledgerlens_vision::RunConfig;
use serde::{Deserialize, Serialize};

use crate::errors::CliError;

/// Settings for the vision CLI subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Explicit executable path; otherwise discovered.
    pub binary: Option<PathBuf>,
    /// Model override.
    pub model: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Simultaneous vision calls.
    pub max_concurrent: usize,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            binary: None,
            model: None,
            timeout_secs: 300,
            max_concurrent: 2,
        }
    }
}

impl VisionSettings {
    /// Subprocess configuration derived from these settings.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..RunConfig::default()
        }
    }
}

/// Everything `ledgerlens` reads from its config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Retry loop settings.
    pub retry: RetryConfig,
    /// Arithmetic tolerances in minor units.
    pub tolerances: AuditTolerances,
    /// VAT jurisdiction rules.
    pub vat_rules: VatRuleSet,
    /// Auto-confirm threshold for both confidences.
    pub confidence_threshold: f64,
    /// Vision subprocess settings.
    pub vision: VisionSettings,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            tolerances: AuditTolerances::default(),
            vat_rules: VatRuleSet::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            vision: VisionSettings::default(),
        }
    }
}

impl LedgerConfig {
    /// `<config_dir>/ledgerlens/config.json`, if the platform has a config dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ledgerlens").join("config.json"))
    }

    /// Loads and validates the configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    tracing::debug!(event = "config_defaults", "no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| CliError::ConfigFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| CliError::ConfigFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(event = "config_loaded", path = %path.display());
        Ok(config)
    }

    /// Rejects out-of-range values.
    pub fn validate(&self) -> Result<(), CliError> {
        self.retry.validate()?;
        validate_threshold(self.confidence_threshold)?;
        self.audit_context()?;
        if self.vision.max_concurrent == 0 {
            return Err(CliError::ConfigFile {
                path: PathBuf::from("vision.max_concurrent"),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Audit context built from tolerances and VAT rules.
    pub fn audit_context(&self) -> Result<AuditContext, CliError> {
        Ok(AuditContext::new(self.tolerances, self.vat_rules.clone())?)
    }
}
