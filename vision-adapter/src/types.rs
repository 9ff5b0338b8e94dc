//! Shared data types for vision CLI configuration and results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a single vision CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model name override.
    pub model: Option<String>,
    /// JSON schema the output must follow, passed as `--json-schema`.
    pub json_schema: Option<serde_json::Value>,
    /// Maximum wall-clock duration before the process is terminated.
    pub timeout: Duration,
    /// Working directory for the subprocess.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables passed to the subprocess.
    pub env: Vec<(String, String)>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: None,
            json_schema: None,
            timeout: Duration::from_secs(300),
            cwd: None,
            env: Vec::new(),
        }
    }
}

/// What to ask the vision model on one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Extraction instructions.
    pub prompt: String,
    /// Audit feedback from a previous attempt.
    pub feedback: Option<String>,
    /// Page images, in order.
    pub images: Vec<PathBuf>,
}

/// Result of a completed vision CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code (`-1` if unavailable).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// `stdout` parsed as JSON, when it is a single JSON document.
    pub json: Option<serde_json::Value>,
}

impl RunResult {
    /// The model answer, unwrapped from the CLI's JSON envelope.
    ///
    /// The CLI answers either with the document object itself or with an
    /// envelope carrying `structured_output` (an object) or `result` (text).
    /// Anything else falls back to raw stdout.
    #[must_use]
    pub fn payload(&self) -> String {
        let Some(json) = &self.json else {
            return self.stdout.clone();
        };
        if let Some(structured) = json.get("structured_output").filter(|v| v.is_object()) {
            return structured.to_string();
        }
        if let Some(text) = json.get("result").and_then(serde_json::Value::as_str) {
            return text.to_string();
        }
        json.to_string()
    }
}
