use crate::executor::Executor;
use crate::types::*;
use serde_json::Value;
use tracing::{error, info};

const HIDDEN: &str = "hidden";

/// Grades a submission by running it once per test case, in order.
#[derive(Debug, Clone)]
pub struct GradingRunner {
    executor: Executor,
}

impl GradingRunner {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run `code` against every test case and tally the results.
    ///
    /// Cases run one after another; a timeout or crash in one case does not
    /// stop the rest. If the submission cannot be executed at all (unknown
    /// language) the report gets a single synthetic entry and every case not
    /// yet judged counts as failed, so `total` always equals
    /// `test_cases.len()`.
    pub async fn run(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
        timeout_ms: Option<u64>,
    ) -> GradingReport {
        let mut report = GradingReport {
            total: test_cases.len(),
            ..GradingReport::default()
        };

        for (index, case) in test_cases.iter().enumerate() {
            let request = ExecutionRequest {
                code: code.to_string(),
                language: language.to_string(),
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                timeout_ms,
            };

            match self.executor.execute(&request).await {
                Ok(result) => {
                    if result.passed() {
                        report.passed += 1;
                    } else {
                        report.failed += 1;
                    }
                    report.details.push(case_result(index, case, &result));
                }
                Err(e) => {
                    error!(language, error = %e, "Error executing test cases");
                    report.failed += test_cases.len() - index;
                    report.details.push(aborted_run());
                    break;
                }
            }
        }

        info!(
            language,
            passed = report.passed,
            failed = report.failed,
            total = report.total,
            "grading finished"
        );
        report
    }
}

fn case_result(index: usize, case: &TestCase, result: &ExecutionResult) -> TestCaseResult {
    let actual_output = result
        .actual_output()
        .cloned()
        .unwrap_or_else(|| Value::String(result.raw_output.clone()));
    TestCaseResult {
        test_case_id: index as i64,
        input: case.input.clone().unwrap_or(Value::Null),
        expected_output: case.expected_output.clone().unwrap_or(Value::Null),
        actual_output,
        passed: result.passed(),
        execution_time_ms: Some(result.execution_time_ms),
        error: result.error_message(),
        hidden: case.is_hidden,
    }
}

fn aborted_run() -> TestCaseResult {
    let na = || Value::String("N/A".to_string());
    TestCaseResult {
        test_case_id: -1,
        input: na(),
        expected_output: na(),
        actual_output: na(),
        passed: false,
        execution_time_ms: None,
        error: Some("Error executing test cases".to_string()),
        hidden: false,
    }
}

impl GradingReport {
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    /// Share of `points` earned, rounded to two decimals
    pub fn score(&self, points: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.passed as f64 / self.total as f64 * points;
        (raw * 100.0).round() / 100.0
    }

    /// Copy safe to show the student: hidden cases keep their verdict,
    /// timing and error but not their data.
    pub fn redacted(&self) -> GradingReport {
        let mut report = self.clone();
        for detail in report.details.iter_mut().filter(|d| d.hidden) {
            detail.input = Value::String(HIDDEN.to_string());
            detail.expected_output = Value::String(HIDDEN.to_string());
            detail.actual_output = Value::String(HIDDEN.to_string());
        }
        report
    }
}
