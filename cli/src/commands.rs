//! Subcommand implementations. Each returns JSON for stdout plus whether the
//! document passed.

use std::path::{Path, PathBuf};

use ledgerlens_audit::config::AuditContext;
use ledgerlens_audit::documents::{Auditable, Bill, CreditNote, DocumentKind, Invoice, Receipt};
use ledgerlens_extraction::parse::schema_for;
use ledgerlens_extraction::pipeline::DocumentPipeline;
use ledgerlens_vision::VisionCli;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::LedgerConfig;
use crate::errors::CliError;
use crate::extractor::VisionExtractor;

/// Output of a command: the JSON to print and the verdict.
#[derive(Debug)]
pub struct CommandOutput {
    /// Printed to stdout.
    pub json: Value,
    /// `false` turns into a non-zero exit status.
    pub passed: bool,
}

fn audit_as<T>(content: &str, path: &Path, ctx: &AuditContext) -> Result<CommandOutput, CliError>
where
    T: Auditable + DeserializeOwned,
{
    let document: T = serde_json::from_str(content).map_err(|source| CliError::Document {
        path: path.to_path_buf(),
        source,
    })?;
    let report = document.audit(ctx);
    tracing::info!(
        event = "audit_completed",
        kind = %T::KIND,
        passed = report.is_passed(),
        failed = report.failed_count,
        warnings = report.warning_count,
    );
    Ok(CommandOutput {
        passed: report.is_passed(),
        json: json!({ "kind": T::KIND, "report": report }),
    })
}

/// Audits an already extracted document stored as JSON.
pub fn audit_document(kind: DocumentKind, path: &Path, config: &LedgerConfig) -> Result<CommandOutput, CliError> {
    let content = std::fs::read_to_string(path)?;
    let ctx = config.audit_context()?;
    match kind {
        DocumentKind::Invoice => audit_as::<Invoice>(&content, path, &ctx),
        DocumentKind::Bill => audit_as::<Bill>(&content, path, &ctx),
        DocumentKind::Receipt => audit_as::<Receipt>(&content, path, &ctx),
        DocumentKind::CreditNote => audit_as::<CreditNote>(&content, path, &ctx),
    }
}

async fn extract_as<T>(
    cli: VisionCli,
    config: &LedgerConfig,
    images: &[PathBuf],
    classification_confidence: f64,
) -> Result<CommandOutput, CliError>
where
    T: Auditable + DeserializeOwned + JsonSchema + Serialize + Send + Sync,
{
    let extractor = VisionExtractor::<T>::new(cli, config.vision.run_config())?;
    let pipeline = DocumentPipeline::new(extractor, config.audit_context()?)
        .with_retry_config(config.retry)?
        .with_confidence_threshold(config.confidence_threshold)?;

    let outcome = pipeline.process::<T>(images, classification_confidence).await?;
    Ok(CommandOutput {
        passed: outcome.report.is_passed(),
        json: json!({ "kind": T::KIND, "outcome": outcome }),
    })
}

/// Runs the full pipeline against the vision CLI.
pub async fn extract_document(
    kind: DocumentKind,
    images: &[PathBuf],
    classification_confidence: f64,
    config: &LedgerConfig,
) -> Result<CommandOutput, CliError> {
    let cli = VisionCli::discover(config.vision.binary.clone(), config.vision.max_concurrent)?;
    tracing::info!(event = "vision_discovered", path = %cli.path.display());
    match kind {
        DocumentKind::Invoice => extract_as::<Invoice>(cli, config, images, classification_confidence).await,
        DocumentKind::Bill => extract_as::<Bill>(cli, config, images, classification_confidence).await,
        DocumentKind::Receipt => extract_as::<Receipt>(cli, config, images, classification_confidence).await,
        DocumentKind::CreditNote => {
            extract_as::<CreditNote>(cli, config, images, classification_confidence).await
        }
    }
}

/// JSON schema sent to the vision model for `kind`.
#[must_use]
pub fn document_schema(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::Invoice => schema_for::<Invoice>(),
        DocumentKind::Bill => schema_for::<Bill>(),
        DocumentKind::Receipt => schema_for::<Receipt>(),
        DocumentKind::CreditNote => schema_for::<CreditNote>(),
    }
}
