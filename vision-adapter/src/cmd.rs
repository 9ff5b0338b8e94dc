//! Command-line argument builder for vision CLI invocations.

use crate::types::{RunConfig, RunRequest};
use std::ffi::OsString;

/// Builds the argument list for one extraction call.
///
/// Flags come first; image paths follow a `--` separator at the end.
#[must_use]
pub fn build_args(request: &RunRequest, config: &RunConfig) -> Vec<OsString> {
    let mut args = Vec::new();

    args.push(OsString::from("--output-format"));
    args.push(OsString::from("json"));

    if let Some(ref model) = config.model {
        args.push(OsString::from("--model"));
        args.push(OsString::from(model));
    }

    if let Some(schema) = &config.json_schema {
        args.push(OsString::from("--json-schema"));
        args.push(OsString::from(schema.to_string()));
    }

    args.push(OsString::from("--prompt"));
    args.push(OsString::from(&request.prompt));

    if let Some(feedback) = &request.feedback {
        args.push(OsString::from("--feedback"));
        args.push(OsString::from(feedback));
    }

    if !request.images.is_empty() {
        args.push(OsString::from("--"));
    }
    for image in &request.images {
        args.push(image.as_os_str().to_owned());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request() -> RunRequest {
        RunRequest {
            prompt: "Extract the invoice".to_string(),
            feedback: None,
            images: vec![PathBuf::from("scan/p1.png"), PathBuf::from("scan/p2.png")],
        }
    }

    fn strings(args: &[OsString]) -> Vec<&str> {
        args.iter().filter_map(|s| s.to_str()).collect()
    }

    #[test]
    fn test_minimal_invocation() {
        let args = build_args(&request(), &RunConfig::default());
        assert_eq!(
            strings(&args),
            vec![
                "--output-format",
                "json",
                "--prompt",
                "Extract the invoice",
                "--",
                "scan/p1.png",
                "scan/p2.png"
            ]
        );
    }

    #[test]
    fn test_model_and_schema_flags() {
        let config = RunConfig {
            model: Some("vision-large".to_string()),
            json_schema: Some(serde_json::json!({"type": "object"})),
            ..RunConfig::default()
        };
        let args = build_args(&request(), &config);
        let args_str = strings(&args);

        assert!(
            args_str.windows(2).any(|w| w[0] == "--model" && w[1] == "vision-large"),
            "Expected '--model vision-large' but got: {args_str:?}"
        );
        assert!(
            args_str.windows(2).any(|w| w[0] == "--json-schema" && w[1] == r#"{"type":"object"}"#),
            "Expected '--json-schema' with compact schema but got: {args_str:?}"
        );
    }

    #[test]
    fn test_feedback_precedes_images() {
        let req = RunRequest {
            feedback: Some("Attempt 1/2: re-read the total".to_string()),
            ..request()
        };
        let args = build_args(&req, &RunConfig::default());
        let args_str = strings(&args);

        let feedback_at = args_str.iter().position(|a| *a == "--feedback").unwrap();
        assert_eq!(args_str[feedback_at + 1], "Attempt 1/2: re-read the total");
        let first_image = args_str.iter().position(|a| *a == "scan/p1.png").unwrap();
        assert!(feedback_at < first_image);
        assert_eq!(args_str.last(), Some(&"scan/p2.png"));
    }

    #[test]
    fn test_dash_prefixed_image_is_not_a_flag() {
        let req = RunRequest {
            images: vec![PathBuf::from("-scan.png")],
            ..request()
        };
        let args = build_args(&req, &RunConfig::default());
        let args_str = strings(&args);

        assert!(
            args_str.windows(2).any(|w| w[0] == "--" && w[1] == "-scan.png"),
            "Expected '-- -scan.png' but got: {args_str:?}"
        );
        assert_eq!(args_str.last(), Some(&"-scan.png"));
    }

    #[test]
    fn test_no_separator_without_images() {
        let req = RunRequest {
            images: Vec::new(),
            ..request()
        };
        let args = build_args(&req, &RunConfig::default());
        assert!(!strings(&args).contains(&"--"));
    }
}
