//! [`DocumentExtractor`] backed by the vision CLI.

use async_trait::async_trait;
use ledgerlens_audit::documents::{Auditable, DocumentKind};
use ledgerlens_extraction::error::ExtractionError;
use ledgerlens_extraction::parse::StructuredParser;
use ledgerlens_extraction::pipeline::{DocumentExtractor, ExtractionRequest};
use ledgerlens_vision::{RunConfig, RunRequest, VisionCli, VisionError};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Extraction instructions for one document kind.
#[must_use]
pub fn base_prompt(kind: DocumentKind) -> String {
    let lines = match kind {
        DocumentKind::Invoice => {
            "List every invoice line under line_items with quantity, unit price and net amount. \
             Copy the IBAN and the structured reference (+++XXX/XXXX/XXX+++) exactly."
        }
        DocumentKind::Bill => {
            "List every billed item under items. \
             Copy the IBAN and the structured reference (+++XXX/XXXX/XXX+++) exactly."
        }
        DocumentKind::Receipt => {
            "List the purchased items under items. If the receipt prints a VAT table, \
             add one vat_breakdown entry per rate."
        }
        DocumentKind::CreditNote => {
            "List every credited line under lines. Keep amounts negative if they are printed negative, \
             and record the number of the invoice being credited."
        }
    };
    let label = kind.as_str().replace('_', " ");
    format!(
        "Read the attached scanned {label} and return a single JSON object that follows the provided schema.\n\
         Copy amounts exactly as printed, including thousands and decimal separators.\n\
         Use null for anything that is not printed; never compute missing values.\n\
         {lines}\n\
         Set confidence to how sure you are of the whole extraction, between 0 and 1."
    )
}

/// Runs the vision CLI and parses its answer into `T`.
pub struct VisionExtractor<T> {
    cli: VisionCli,
    config: RunConfig,
    prompt: String,
    parser: StructuredParser<T>,
}

impl<T: Auditable + DeserializeOwned + JsonSchema> VisionExtractor<T> {
    /// Creates an extractor; the schema of `T` is attached to every call.
    ///
    /// # Errors
    /// Returns `ExtractionError::Schema` if the schema of `T` does not compile.
    pub fn new(cli: VisionCli, mut config: RunConfig) -> Result<Self, ExtractionError> {
        let parser = StructuredParser::<T>::new()?;
        config.json_schema = Some(parser.schema().clone());
        Ok(Self {
            cli,
            config,
            prompt: base_prompt(T::KIND),
            parser,
        })
    }
}

fn to_extraction_error(error: VisionError) -> ExtractionError {
    match error {
        VisionError::Timeout { elapsed, .. } => ExtractionError::Timeout(elapsed),
        other => ExtractionError::Extractor(other.to_string()),
    }
}

#[async_trait]
impl<T> DocumentExtractor<T> for VisionExtractor<T>
where
    T: Auditable + DeserializeOwned + JsonSchema + Send + Sync,
{
    async fn extract(&self, request: ExtractionRequest) -> Result<T, ExtractionError> {
        let run = RunRequest {
            prompt: self.prompt.clone(),
            feedback: request.feedback,
            images: request.images,
        };
        let result = self.cli.run(&run, &self.config).await.map_err(to_extraction_error)?;
        tracing::debug!(event = "vision_answered", duration_ms = result.duration_ms, bytes = result.stdout.len());
        self.parser.parse(&result.payload())
    }
}
