//! Rust adapter for driving the vision extraction CLI as a subprocess.
//!
//! This crate provides discovery and execution of the `ledgerlens-vision`
//! command-line tool, with bounded concurrency and timeout handling.

/// Command-line argument construction for vision CLI invocations.
pub mod cmd;
/// Discovery and resolution of the vision CLI executable path.
pub mod discovery;
/// Error types returned by adapter operations.
pub mod error;
/// Subprocess execution with output capture and timeouts.
pub mod process;
/// Shared data types for configuration, requests, and results.
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

pub use discovery::{discover_vision, VISION_BIN_ENV_VAR, VISION_BIN_NAME};
pub use error::VisionError;
pub use process::run_vision;
pub use types::*;

/// High-level client for the vision CLI.
///
/// Clones share one concurrency limit.
#[derive(Debug, Clone)]
pub struct VisionCli {
    /// Filesystem path to the executable.
    pub path: PathBuf,
    limiter: Arc<Semaphore>,
}

impl VisionCli {
    /// Creates a client allowing at most `max_concurrent` simultaneous calls.
    ///
    /// # Errors
    ///
    /// Returns `VisionError::InvalidConfig` when `max_concurrent` is zero.
    pub fn new(path: PathBuf, max_concurrent: usize) -> Result<Self, VisionError> {
        if max_concurrent == 0 {
            return Err(VisionError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            path,
            limiter: Arc::new(Semaphore::new(max_concurrent)),
        })
    }

    /// Discovers the executable (see [`discover_vision`]) and creates a client.
    ///
    /// # Errors
    ///
    /// Returns `VisionError::ExecutableNotFound` or `VisionError::InvalidConfig`.
    pub fn discover(explicit_path: Option<PathBuf>, max_concurrent: usize) -> Result<Self, VisionError> {
        Self::new(discover_vision(explicit_path)?, max_concurrent)
    }

    /// Calls currently allowed to start without waiting.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Runs one extraction, waiting for a free slot first.
    ///
    /// # Errors
    ///
    /// Returns `VisionError` if the subprocess fails to spawn, times out,
    /// or exits with a non-zero status.
    pub async fn run(&self, request: &RunRequest, config: &RunConfig) -> Result<RunResult, VisionError> {
        let _permit = self.limiter.acquire().await?;
        run_vision(&self.path, request, config).await
    }
}
