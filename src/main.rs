use anyhow::{Context, Result};
use code_grader::{
    ExecutionRequest, ExecutionResponse, Executor, GraderConfig, GradingReport, GradingRunner,
    TestCase,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;
use tracing::{info, warn};

/// One JSON document on stdin: a batch when it carries `testCases`,
/// otherwise a single execution.
#[derive(Debug)]
enum Request {
    Batch(BatchRequest),
    Single(ExecutionRequest),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    code: String,
    language: String,
    test_cases: Vec<TestCase>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    /// Assignment points; when present the response carries the grade
    #[serde(default)]
    points: Option<f64>,
}

/// A document with a `testCases` key must be a valid batch; it never falls
/// back to a single execution.
fn parse_request(raw: &str) -> Result<Request> {
    let document: serde_json::Value = serde_json::from_str(raw).context("Invalid request JSON")?;
    let is_batch = document
        .as_object()
        .map_or(false, |fields| fields.contains_key("testCases"));
    if is_batch {
        let batch = serde_json::from_value(document).context("Invalid batch request")?;
        Ok(Request::Batch(batch))
    } else {
        let single = serde_json::from_value(document).context("Invalid execution request")?;
        Ok(Request::Single(single))
    }
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    #[serde(flatten)]
    report: GradingReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade: Option<f64>,
}

/// Load `.env` (or `env_file`) first, so a RUST_LOG set there decides the
/// log filter.
fn load_env_and_log_filter(env_file: Option<&Path>) -> EnvFilter {
    match env_file {
        Some(path) => dotenvy::from_path(path).ok(),
        None => dotenvy::dotenv().ok().map(|_| ()),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("code_grader=info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(load_env_and_log_filter(None))
        .init();

    let config = GraderConfig::from_env()?;
    let executor = Executor::from_config(&config);
    info!(scratch = %config.scratch_root.display(), "code grader ready");
    for (language, missing) in executor.registry().missing_toolchains() {
        warn!(%language, missing = ?missing, "toolchain not found on PATH");
    }

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read request from stdin")?;
    match parse_request(&raw)? {
        Request::Batch(batch) => {
            let runner = GradingRunner::new(executor);
            let report = runner
                .run(&batch.code, &batch.language, &batch.test_cases, batch.timeout_ms)
                .await;
            // points means the caller is grading a student, who must not
            // see hidden cases
            let response = match batch.points {
                Some(points) => BatchResponse {
                    grade: Some(report.score(points)),
                    report: report.redacted(),
                },
                None => BatchResponse {
                    report,
                    grade: None,
                },
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Request::Single(single) => match executor.execute(&single).await {
            Ok(result) => {
                let response = ExecutionResponse::from(&result);
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Err(e) => {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
                std::process::exit(2);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_without_test_cases_is_a_single_execution() {
        let raw = r#"{"code":"print(1)","language":"python","input":"x","timeoutMs":100}"#;
        match parse_request(raw).unwrap() {
            Request::Single(single) => {
                assert_eq!(single.language, "python");
                assert_eq!(single.input, Some(json!("x")));
                assert_eq!(single.timeout_ms, Some(100));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn document_with_test_cases_is_a_batch() {
        let raw = r#"{"code":"print(input())","language":"python","points":10,
            "testCases":[{"input":"3","expectedOutput":"3","isHidden":true}]}"#;
        match parse_request(raw).unwrap() {
            Request::Batch(batch) => {
                assert_eq!(batch.test_cases.len(), 1);
                assert!(batch.test_cases[0].is_hidden);
                assert_eq!(batch.points, Some(10.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_batch_is_rejected_instead_of_run_once() {
        let null_cases = r#"{"code":"print(1)","language":"python","testCases":null}"#;
        let bad_field =
            r#"{"code":"print(1)","language":"python","testCases":[{"input":1,"isHidden":"yes"}]}"#;
        for raw in [null_cases, bad_field] {
            let err = parse_request(raw).unwrap_err();
            assert!(format!("{:#}", err).contains("Invalid batch request"), "{}", raw);
        }
    }

    #[test]
    fn log_filter_comes_from_the_env_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "RUST_LOG=code_grader=trace\n").unwrap();
        std::env::remove_var("RUST_LOG");

        let filter = load_env_and_log_filter(Some(&env_file));
        assert!(filter.to_string().contains("code_grader=trace"), "{}", filter);
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn malformed_single_request_is_rejected() {
        assert!(parse_request(r#"{"language":"python"}"#).is_err());
        assert!(parse_request("not json").is_err());
    }
}
