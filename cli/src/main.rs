//! The `ledgerlens` binary: audit extracted documents or run the extraction pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ledgerlens_audit::documents::DocumentKind;
use ledgerlens_cli::commands::{audit_document, document_schema, extract_document, CommandOutput};
use ledgerlens_cli::config::LedgerConfig;
use ledgerlens_cli::errors::CliError;
use ledgerlens_cli::init_config::{run_init_config, InitConfig};
use ledgerlens_cli::logging::init_tracing;
use tracing::Instrument;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/ledgerlens/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a document that was already extracted to JSON
    Audit {
        /// invoice, bill, receipt or credit-note
        #[arg(long)]
        kind: DocumentKind,
        /// Extracted document
        file: PathBuf,
    },
    /// Extract a document from page images, audit it and retry with feedback
    Extract {
        /// invoice, bill, receipt or credit-note
        #[arg(long)]
        kind: DocumentKind,
        /// Confidence of the upstream document-type classification
        #[arg(long, default_value_t = 1.0)]
        classification_confidence: f64,
        /// Page images, in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the JSON schema sent to the vision model
    Schema {
        /// invoice, bill, receipt or credit-note
        #[arg(long)]
        kind: DocumentKind,
    },
    /// Write the default configuration file
    InitConfig {
        /// Show what would be written without modifying files
        #[arg(long)]
        dry_run: bool,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn print(output: &CommandOutput) -> Result<ExitCode, CliError> {
    println!("{}", serde_json::to_string_pretty(&output.json)?);
    Ok(if output.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let span = tracing::info_span!("run", run_id = %uuid::Uuid::new_v4());
    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::InitConfig { dry_run, force } => {
            run_init_config(&InitConfig {
                dry_run,
                force,
                path: cli.config,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schema { kind } => {
            println!("{}", serde_json::to_string_pretty(&document_schema(kind))?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Audit { kind, file } => {
            let config = LedgerConfig::load(cli.config.as_deref())?;
            print(&audit_document(kind, &file, &config)?)
        }
        Commands::Extract {
            kind,
            classification_confidence,
            images,
        } => {
            let config = LedgerConfig::load(cli.config.as_deref())?;
            print(&extract_document(kind, &images, classification_confidence, &config).await?)
        }
    }
}
