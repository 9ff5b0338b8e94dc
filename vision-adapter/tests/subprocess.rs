//! Subprocess behaviour against stand-in shell scripts.
//!
//! The last test needs a real `ledgerlens-vision` binary and is ignored by
//! default:
//!
//! ```bash
//! cargo test -p ledgerlens-vision -- --ignored
//! ```

#![cfg(unix)]

use ledgerlens_vision::{RunConfig, RunRequest, VisionCli, VisionError};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Writes an executable `sh` script into `dir` and returns its path.
fn script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-vision");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

fn request() -> RunRequest {
    RunRequest {
        prompt: "Extract the receipt".to_string(),
        feedback: Some("Attempt 1/2: re-read the total".to_string()),
        images: vec![PathBuf::from("receipt.jpg")],
    }
}

#[tokio::test]
async fn passes_arguments_and_captures_stdout() {
    let dir = TempDir::new().unwrap();
    let cli = VisionCli::new(script(&dir, r#"printf '%s\n' "$@""#), 2).unwrap();

    let result = cli.run(&request(), &RunConfig::default()).await.unwrap();

    let lines: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "--output-format",
            "json",
            "--prompt",
            "Extract the receipt",
            "--feedback",
            "Attempt 1/2: re-read the total",
            "--",
            "receipt.jpg"
        ]
    );
    assert_eq!(result.exit_code, 0);
    assert!(result.json.is_none());
}

#[tokio::test]
async fn parses_json_envelope() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        r#"echo '{"type": "result", "structured_output": {"total_amount": "18,16"}}'"#,
    );
    let cli = VisionCli::new(path, 1).unwrap();

    let result = cli.run(&request(), &RunConfig::default()).await.unwrap();
    assert_eq!(result.payload(), r#"{"total_amount":"18,16"}"#);
}

#[tokio::test]
async fn non_zero_exit_is_an_error() {
    let dir = TempDir::new().unwrap();
    let cli = VisionCli::new(script(&dir, "echo 'model overloaded' >&2\nexit 3"), 1).unwrap();

    let err = cli.run(&request(), &RunConfig::default()).await.unwrap_err();
    match err {
        VisionError::NonZeroExit {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, 3);
            assert!(stderr.contains("model overloaded"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn hung_process_is_terminated() {
    let dir = TempDir::new().unwrap();
    let cli = VisionCli::new(script(&dir, "exec sleep 30"), 1).unwrap();
    let config = RunConfig {
        timeout: Duration::from_millis(200),
        ..RunConfig::default()
    };

    let started = std::time::Instant::now();
    let err = cli.run(&request(), &config).await.unwrap_err();

    assert!(matches!(err, VisionError::Timeout { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(cli.available_slots(), 1);
}

#[tokio::test]
async fn background_helper_holding_stdout_does_not_outlive_timeout() {
    let dir = TempDir::new().unwrap();
    let cli = VisionCli::new(script(&dir, "sleep 8 &\necho '{}'"), 1).unwrap();
    let config = RunConfig {
        timeout: Duration::from_millis(500),
        ..RunConfig::default()
    };

    let started = std::time::Instant::now();
    let err = cli.run(&request(), &config).await.unwrap_err();

    assert!(matches!(err, VisionError::Timeout { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    assert_eq!(cli.available_slots(), 1);
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let dir = TempDir::new().unwrap();
    let cli = VisionCli::new(script(&dir, r#"echo "$LEDGERLENS_MODE $(pwd)""#), 1).unwrap();
    let config = RunConfig {
        cwd: Some(dir.path().to_path_buf()),
        env: vec![("LEDGERLENS_MODE".to_string(), "strict".to_string())],
        ..RunConfig::default()
    };

    let result = cli.run(&request(), &config).await.unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    assert!(result.stdout.starts_with("strict "));
    assert!(result.stdout.trim_end().ends_with(canonical.to_str().unwrap()));
}

#[test]
fn zero_concurrency_is_rejected() {
    let err = VisionCli::new(PathBuf::from("/bin/true"), 0).unwrap_err();
    assert!(matches!(err, VisionError::InvalidConfig(_)));
}

#[tokio::test]
#[ignore = "Requires the ledgerlens-vision binary"]
async fn e2e_real_binary_answers_with_json() {
    let Ok(cli) = VisionCli::discover(None, 1) else {
        eprintln!("Skipping: ledgerlens-vision not found");
        return;
    };
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../fixtures/receipt.png");
    let request = RunRequest {
        prompt: "Extract the receipt as JSON.".to_string(),
        feedback: None,
        images: vec![sample],
    };
    let config = RunConfig {
        json_schema: Some(serde_json::json!({"type": "object"})),
        timeout: Duration::from_secs(120),
        ..RunConfig::default()
    };

    let result = cli.run(&request, &config).await.expect("vision run");
    assert!(result.payload().contains('{'));
}
