use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One judged (input, expected output) pair of an assignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub expected_output: Option<Value>,
    #[serde(default)]
    pub is_hidden: bool,
}

impl TestCase {
    pub fn new(input: impl Into<Value>, expected_output: impl Into<Value>) -> Self {
        Self {
            input: Some(input.into()),
            expected_output: Some(expected_output.into()),
            is_hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }
}

/// Input to a single execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub expected_output: Option<Value>,
    /// Falls back to the executor's default when absent or zero
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            input: None,
            expected_output: None,
            timeout_ms: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<Value>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// How an execution ended. Exactly one applies per run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The program exited with status 0. `passed` is true when no
    /// expectation was given.
    Completed {
        actual_output: Value,
        passed: bool,
        stderr: Option<String>,
    },
    TimedOut,
    CompileFailed { diagnostics: String },
    RuntimeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Failure of the engine itself (scratch file, spawn, ...)
    Internal { message: String },
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "completed",
            Outcome::TimedOut => "timeout",
            Outcome::CompileFailed { .. } => "compile_error",
            Outcome::RuntimeFailed { .. } => "runtime_error",
            Outcome::Internal { .. } => "internal_error",
        }
    }
}

pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Result of one execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Untrimmed standard output, whatever was captured before exit or kill
    pub raw_output: String,
    pub execution_time_ms: f64,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Completed { passed: true, .. })
    }

    pub fn actual_output(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Completed { actual_output, .. } => Some(actual_output),
            _ => None,
        }
    }

    /// A wrong answer carries no error; only failures to run do.
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Completed { .. } => None,
            Outcome::TimedOut => Some(TIMEOUT_MESSAGE.to_string()),
            Outcome::CompileFailed { diagnostics } => {
                Some(format!("Compilation error: {}", diagnostics))
            }
            Outcome::RuntimeFailed { exit_code, stderr } => {
                if !stderr.is_empty() {
                    Some(stderr.clone())
                } else {
                    match exit_code {
                        Some(code) => Some(format!("Process exited with code {}", code)),
                        None => Some("Process terminated by signal".to_string()),
                    }
                }
            }
            Outcome::Internal { message } => Some(message.clone()),
        }
    }
}

/// Wire form of an [`ExecutionResult`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub output: String,
    pub execution_time_ms: f64,
    pub error: Option<String>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<Value>,
    pub status: String,
}

impl From<&ExecutionResult> for ExecutionResponse {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            output: result.raw_output.clone(),
            execution_time_ms: result.execution_time_ms,
            error: result.error_message(),
            passed: result.passed(),
            actual_output: result.actual_output().cloned(),
            status: result.outcome.status().to_string(),
        }
    }
}

/// Per-test-case line of a grading report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Position in the submitted test cases; -1 marks the synthetic entry
    /// recorded when the run could not proceed at all.
    pub test_case_id: i64,
    pub input: Value,
    pub expected_output: Value,
    pub actual_output: Value,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub hidden: bool,
}

/// Aggregate over all test cases of one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingReport {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub details: Vec<TestCaseResult>,
}
