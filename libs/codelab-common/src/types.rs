use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Test Case Definition (Immutable Input)
/// Identified only by its position inside a batch - the index is the
/// join key back to results, the execution service never sees it.
///
/// `expected_output` is optional: a run without it only reports how the
/// program executed, it is never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: Some(expected_output.into()),
        }
    }

    /// Test case that is executed but never compared
    pub fn input_only(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: None,
        }
    }
}

/// Opaque handle assigned by the execution service to one submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobToken(String);

impl JobToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a batch as sent to the execution service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// Job lifecycle as reported by the execution service
///
/// `Pending`, `InQueue` and `Processing` are transient; every other
/// variant is terminal and will not change on later queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    InternalError,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            JobStatus::Pending | JobStatus::InQueue | JobStatus::Processing
        )
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, JobStatus::Accepted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::InQueue => "in_queue",
            JobStatus::Processing => "processing",
            JobStatus::Accepted => "accepted",
            JobStatus::WrongAnswer => "wrong_answer",
            JobStatus::CompileError => "compile_error",
            JobStatus::RuntimeError => "runtime_error",
            JobStatus::TimeLimitExceeded => "time_limit_exceeded",
            JobStatus::InternalError => "internal_error",
        };
        f.write_str(name)
    }
}

/// Raw result of one job, exactly as far as the service reported it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub token: JobToken,
    pub status: JobStatus,
    /// Service-defined status id, kept for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u32>,
    pub status_description: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub compile_output: String,
    /// Wall time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Peak memory in kilobytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Set when the engine gave up waiting for this job
    #[serde(default)]
    pub timed_out: bool,
}

impl JobResult {
    /// Placeholder for a job that has not reported anything yet
    pub fn pending(token: JobToken) -> Self {
        Self {
            token,
            status: JobStatus::Pending,
            status_id: None,
            status_description: "Pending".to_string(),
            stdout: String::new(),
            stderr: String::new(),
            compile_output: String::new(),
            time: None,
            memory: None,
            timed_out: false,
        }
    }

    /// Synthetic terminal result for a job still unresolved at the deadline
    pub fn timed_out(token: JobToken) -> Self {
        Self {
            status: JobStatus::InternalError,
            status_description: "Timeout: no terminal status before the deadline".to_string(),
            timed_out: true,
            ..Self::pending(token)
        }
    }
}

/// Engine-side classification of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub test_case_index: usize,
    pub status: VerdictStatus,
    pub raw_result: JobResult,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }
}

/// Reduced outcome of one batch
///
/// `verdicts` is ordered exactly like the test cases that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub all_passed: bool,
    pub verdicts: Vec<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failure_index: Option<usize>,
}

impl BatchOutcome {
    pub fn passed_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.passed()).count()
    }

    pub fn timed_out_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| v.raw_result.timed_out)
            .count()
    }

    pub fn first_failure(&self) -> Option<&Verdict> {
        self.first_failure_index.and_then(|idx| self.verdicts.get(idx))
    }
}
