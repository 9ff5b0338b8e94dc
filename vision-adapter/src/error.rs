use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn process at stage '{stage}': {source}")]
    SpawnFailed {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process timed out after {elapsed:?} (PID: {pid})")]
    Timeout { elapsed: Duration, pid: u32 },

    #[error(
        "Process exited with non-zero status: {exit_code}\nSTDOUT: {stdout}\nSTDERR: {stderr}"
    )]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Stream task failed at stage '{stage}': {source}")]
    StreamFailed {
        stage: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[cfg(unix)]
    #[error("Failed to send signal {signal} to PID {pid}: {source}")]
    SignalFailed {
        signal: String,
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Child process stdout was not captured")]
    NoStdout,

    #[error("Child process stderr was not captured")]
    NoStderr,

    #[error("Could not get PID from child process")]
    NoPid,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Concurrency limiter closed")]
    LimiterClosed(#[from] tokio::sync::AcquireError),
}
