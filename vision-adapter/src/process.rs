use crate::error::VisionError;
use crate::types::{RunConfig, RunRequest, RunResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at};

const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024; // 10 MB
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs the vision CLI once and captures its output.
///
/// # Errors
///
/// Returns `VisionError::Timeout` when the process, or anything still holding
/// its output pipes, outlives `config.timeout` (the process group is
/// terminated first), `VisionError::NonZeroExit` on a failing exit status,
/// and spawn or I/O errors otherwise.
pub async fn run_vision(
    path: &std::path::Path,
    request: &RunRequest,
    config: &RunConfig,
) -> Result<RunResult, VisionError> {
    let args = crate::cmd::build_args(request, config);
    let start_time = Instant::now();

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    for (k, v) in &config.env {
        cmd.env(k, v);
    }

    let mut child = cmd.spawn().map_err(|e| VisionError::SpawnFailed {
        stage: "spawn subprocess".to_string(),
        source: e,
    })?;

    let stdout = child.stdout.take().ok_or(VisionError::NoStdout)?;
    let stderr = child.stderr.take().ok_or(VisionError::NoStderr)?;
    let pid = child.id().ok_or(VisionError::NoPid)?;
    tracing::debug!(event = "vision_spawned", pid, images = request.images.len());

    let mut stdout_task = tokio::spawn(read_capped(stdout));
    let mut stderr_task = tokio::spawn(read_capped(stderr));

    // One deadline covers the exit and draining both pipes.
    let deadline = tokio::time::Instant::now() + config.timeout;

    let waited = timeout_at(deadline, child.wait()).await;
    let status = match waited {
        Ok(status) => status.map_err(|e| VisionError::SpawnFailed {
            stage: "wait".to_string(),
            source: e,
        })?,
        Err(_) => {
            return Err(expire(&mut child, pid, [&stdout_task, &stderr_task], config.timeout).await);
        }
    };

    let drained = timeout_at(deadline, async {
        let stdout = (&mut stdout_task).await;
        let stderr = (&mut stderr_task).await;
        (stdout, stderr)
    })
    .await;
    let Ok((stdout_joined, stderr_joined)) = drained else {
        tracing::debug!(event = "vision_pipes_held_open", pid);
        return Err(expire(&mut child, pid, [&stdout_task, &stderr_task], config.timeout).await);
    };

    let (stdout, stdout_truncated) = stdout_joined.map_err(|e| VisionError::StreamFailed {
        stage: "stdout".to_string(),
        source: e,
    })?;
    let (stderr, _) = stderr_joined.map_err(|e| VisionError::StreamFailed {
        stage: "stderr".to_string(),
        source: e,
    })?;
    if stdout_truncated {
        tracing::warn!(event = "vision_output_truncated", pid, limit_bytes = MAX_OUTPUT_BYTES);
    }

    let exit_code = status.code().unwrap_or(-1);
    let duration_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(event = "vision_exited", pid, exit_code, duration_ms);

    if !status.success() {
        return Err(VisionError::NonZeroExit {
            exit_code,
            stdout,
            stderr,
        });
    }

    let json = serde_json::from_str(stdout.trim()).ok();
    Ok(RunResult {
        stdout,
        stderr,
        exit_code,
        duration_ms,
        json,
    })
}

/// Stops the readers, terminates the process group and reports the timeout.
async fn expire(
    child: &mut Child,
    pid: u32,
    readers: [&JoinHandle<(String, bool)>; 2],
    limit: Duration,
) -> VisionError {
    tracing::warn!(event = "vision_timeout", pid, timeout_ms = limit.as_millis() as u64);
    for reader in readers {
        reader.abort();
    }
    match graceful_shutdown(child, pid).await {
        Ok(()) => VisionError::Timeout { elapsed: limit, pid },
        Err(e) => e,
    }
}

/// Reads lines until EOF, keeping at most `MAX_OUTPUT_BYTES`.
async fn read_capped<R: AsyncRead + Unpin>(reader: R) -> (String, bool) {
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();
    let mut truncated = false;
    while let Ok(Some(line)) = lines.next_line().await {
        if captured.len() + line.len() < MAX_OUTPUT_BYTES {
            captured.push_str(&line);
            captured.push('\n');
        } else {
            truncated = true;
        }
    }
    (captured, truncated)
}

/// Graceful shutdown: `SIGTERM` to the process group, wait grace period, then `SIGKILL`.
///
/// The child leads its own group, so helpers it left behind are signalled
/// even after the child itself has exited.
#[cfg(unix)]
async fn graceful_shutdown(child: &mut Child, pid: u32) -> Result<(), VisionError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(pid).map_err(|_| VisionError::InvalidConfig(format!("PID {pid} exceeds i32::MAX")))?;
    let group = Pid::from_raw(raw_pid);

    let signal_group = |sig: Signal| match signal::killpg(group, sig) {
        // ESRCH: the whole group is already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(VisionError::SignalFailed {
            signal: sig.as_str().to_string(),
            pid,
            source: e,
        }),
    };

    signal_group(Signal::SIGTERM)?;

    let exited = timeout(GRACE_PERIOD, child.wait()).await;
    signal_group(Signal::SIGKILL)?;

    match exited {
        Ok(Ok(_status)) => Ok(()),
        Ok(Err(e)) => Err(VisionError::SpawnFailed {
            stage: "graceful_shutdown wait".to_string(),
            source: e,
        }),
        Err(_) => {
            child.kill().await.map_err(|e| VisionError::SpawnFailed {
                stage: "SIGKILL".to_string(),
                source: e,
            })?;
            Ok(())
        }
    }
}

/// Windows: immediate termination.
#[cfg(windows)]
async fn graceful_shutdown(child: &mut Child, _pid: u32) -> Result<(), VisionError> {
    child.kill().await.map_err(|e| VisionError::SpawnFailed {
        stage: "TerminateProcess".to_string(),
        source: e,
    })
}
