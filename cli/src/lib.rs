#![deny(missing_docs)]
//! Library side of the `ledgerlens` binary.
//!
//! Loads configuration, wires the vision adapter into the extraction
//! pipeline and renders results as JSON.

/// Subcommand implementations.
pub mod commands;
/// Configuration file handling.
pub mod config;
/// Error types for the binary.
pub mod errors;
/// Vision-backed document extractor.
pub mod extractor;
/// `init-config` subcommand.
pub mod init_config;
/// Tracing subscriber setup.
pub mod logging;
