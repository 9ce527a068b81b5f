/// Verdict Evaluator - Language-Agnostic Reduction Logic
///
/// **Core Responsibility:**
/// Turn terminal job results into per-test-case verdicts and an aggregate
/// outcome for the batch.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP or the execution service
/// - Knows nothing about polling or deadlines
/// - Pure function: (test cases, results) → outcome
/// - Never short-circuits: every result gets a verdict
///
/// **Modes:**
/// - Validation: Pass iff the service reported Accepted
/// - Submission: Pass iff Accepted and the trimmed stdout equals the
///   trimmed expected output; a service-side internal error is `Error`
///   rather than `Fail`. Without an expected output the execution status
///   alone decides, no comparison is made.
///
/// A job that hit the deadline is `Fail` in both modes.
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace
/// - Internal whitespace and case are significant
use codelab_common::types::{BatchOutcome, JobResult, JobStatus, TestCase, Verdict, VerdictStatus};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionMode {
    /// Reference-solution check while authoring a problem
    Validation,
    /// User code run against a problem's test cases
    Submission,
}

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Classify a single terminal result
pub fn evaluate_result(
    index: usize,
    test_case: &TestCase,
    result: JobResult,
    mode: ReductionMode,
) -> Verdict {
    let status = match mode {
        _ if result.timed_out => VerdictStatus::Fail,
        ReductionMode::Validation => {
            if result.status.is_accepted() {
                VerdictStatus::Pass
            } else {
                VerdictStatus::Fail
            }
        }
        ReductionMode::Submission => match result.status {
            JobStatus::Accepted => match &test_case.expected_output {
                Some(expected) => {
                    if normalize_output(&result.stdout) == normalize_output(expected) {
                        VerdictStatus::Pass
                    } else {
                        VerdictStatus::Fail
                    }
                }
                None => VerdictStatus::Pass,
            },
            JobStatus::WrongAnswer
            | JobStatus::CompileError
            | JobStatus::RuntimeError
            | JobStatus::TimeLimitExceeded => VerdictStatus::Fail,
            // Internal errors and anything that somehow arrived non-terminal
            _ => VerdictStatus::Error,
        },
    };

    Verdict {
        test_case_index: index,
        status,
        raw_result: result,
    }
}

/// Aggregate verdicts into the batch outcome
pub fn aggregate(batch_id: Uuid, verdicts: Vec<Verdict>) -> BatchOutcome {
    let first_failure_index = verdicts
        .iter()
        .filter(|v| !v.passed())
        .map(|v| v.test_case_index)
        .min();

    BatchOutcome {
        batch_id,
        all_passed: first_failure_index.is_none(),
        verdicts,
        first_failure_index,
    }
}

/// Evaluate all results of a batch
///
/// `results[i]` must belong to `test_cases[i]`.
pub fn evaluate(
    batch_id: Uuid,
    test_cases: &[TestCase],
    results: Vec<JobResult>,
    mode: ReductionMode,
) -> BatchOutcome {
    debug_assert_eq!(test_cases.len(), results.len());

    let verdicts = test_cases
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (test_case, result))| evaluate_result(index, test_case, result, mode))
        .collect();

    aggregate(batch_id, verdicts)
}
