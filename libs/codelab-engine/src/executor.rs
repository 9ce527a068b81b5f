/// Execution Orchestrator - High-Level Coordination
///
/// **Responsibility:**
/// The facade callers use. Resolves the language, submits the batch, polls
/// it to completion and reduces the results.
///
/// **Architecture:**
/// 1. Resolve the language (language.rs)
/// 2. Submit one job per test case as a single batch (submitter.rs)
/// 3. Poll until every job is terminal or the deadline passes (poller.rs)
/// 4. Reduce results into verdicts (evaluator.rs)
///
/// **Failure semantics:**
/// - Bad input (unknown language, no test cases) fails before any network call
/// - A failed submission aborts the batch, nothing is polled
/// - A poll timeout is not an error: affected test cases simply do not pass
/// - A batch the deadline catches before the service accepted it (no
///   capacity in time, deadline already passed, hung submission) gets a
///   timed-out result per test case
///
/// Batches share nothing but the outbound capacity to the service, which is
/// bounded by a semaphore.
use crate::error::{EngineError, ServiceError};
use crate::evaluator::{self, ReductionMode};
use crate::judge0::Judge0Client;
use crate::language;
use crate::poller::{self, PollSettings};
use crate::service::ExecutionService;
use crate::submitter;
use codelab_common::types::{BatchOutcome, JobResult, JobSpec, JobToken, TestCase, VerdictStatus};
use codelab_common::{EngineConfig, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Reference solution of a problem for one language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSolution {
    pub language: String,
    pub source_code: String,
}

impl ReferenceSolution {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
        }
    }
}

/// Where a reference solution went wrong
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    /// Language as given by the caller
    pub language: String,
    pub test_case_index: usize,
    pub status: VerdictStatus,
    pub status_description: String,
    pub outcome: BatchOutcome,
}

/// Outcome of one language of a validation run
#[derive(Debug, Clone, Serialize)]
pub struct LanguageRun {
    /// Canonical language name
    pub language: &'static str,
    pub elapsed_ms: u64,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Languages whose solution passed every test case, in run order
    pub validated: Vec<String>,
    pub failures: Vec<ValidationFailure>,
    /// Every language that produced an outcome, in run order
    pub runs: Vec<LanguageRun>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&ValidationFailure> {
        self.failures.first()
    }
}

pub struct ExecutionEngine {
    service: Arc<dyn ExecutionService>,
    config: EngineConfig,
    permits: Semaphore,
}

impl ExecutionEngine {
    pub fn new(service: Arc<dyn ExecutionService>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let permits = Semaphore::new(config.max_concurrent_batches);
        Ok(Self {
            service,
            config,
            permits,
        })
    }

    /// Engine backed by a Judge0 instance
    pub fn with_judge0(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Judge0Client::new(&config)
            .map_err(|e| EngineError::InvalidConfig(format!("cannot build Judge0 client: {}", e)))?;
        Self::new(Arc::new(client), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.config.poll_interval,
            max_interval: self.config.max_poll_interval,
        }
    }

    /// Run `source_code` against every test case and reduce the results
    pub async fn run_batch(
        &self,
        source_code: &str,
        language: &str,
        test_cases: &[TestCase],
        deadline: Instant,
        mode: ReductionMode,
    ) -> Result<BatchOutcome, EngineError> {
        let language_id = language::resolve(language)?;
        self.run_resolved(source_code, language, language_id, test_cases, deadline, mode)
            .await
    }

    #[instrument(
        skip(self, source_code, test_cases, deadline),
        fields(batch_id = tracing::field::Empty, test_cases = test_cases.len())
    )]
    async fn run_resolved(
        &self,
        source_code: &str,
        language: &str,
        language_id: u32,
        test_cases: &[TestCase],
        deadline: Instant,
        mode: ReductionMode,
    ) -> Result<BatchOutcome, EngineError> {
        if test_cases.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));
        let started = Instant::now();

        let jobs = build_jobs(source_code, language_id, test_cases);

        let _permit = match timeout_at(deadline, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(EngineError::InvalidConfig(
                    "execution limiter has been closed".to_string(),
                ))
            }
            Err(_) => {
                warn!("No execution capacity before the deadline, batch not submitted");
                return Ok(unsubmitted_outcome(batch_id, test_cases, mode));
            }
        };

        let tokens = match submitter::submit(self.service.as_ref(), &jobs, deadline).await {
            Ok(tokens) => tokens,
            Err(EngineError::SubmissionFailed(ServiceError::Timeout)) => {
                warn!("Deadline reached before the batch was accepted");
                return Ok(unsubmitted_outcome(batch_id, test_cases, mode));
            }
            Err(e) => return Err(e),
        };
        let report = poller::poll(self.service.as_ref(), &tokens, deadline, self.poll_settings()).await;

        if report.timed_out > 0 {
            warn!(
                timed_out = report.timed_out,
                total = tokens.len(),
                "Batch degraded by poll timeout"
            );
        }

        let outcome = evaluator::evaluate(batch_id, test_cases, report.results, mode);

        info!(
            all_passed = outcome.all_passed,
            passed = outcome.passed_count(),
            total = outcome.verdicts.len(),
            first_failure = ?outcome.first_failure_index,
            poll_cycles = report.cycles,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch resolved"
        );

        Ok(outcome)
    }

    /// Execute user code against a problem's test cases
    ///
    /// `timeout` defaults to the configured deadline.
    pub async fn execute_submission(
        &self,
        source_code: &str,
        language: &str,
        test_cases: &[TestCase],
        timeout: Option<Duration>,
    ) -> Result<BatchOutcome, EngineError> {
        let deadline = Instant::now() + timeout.unwrap_or(self.config.deadline);
        self.run_batch(
            source_code,
            language,
            test_cases,
            deadline,
            ReductionMode::Submission,
        )
        .await
    }

    /// Check that every reference solution passes all test cases
    pub async fn validate_reference_solutions(
        &self,
        solutions: &[ReferenceSolution],
        test_cases: &[TestCase],
    ) -> Result<ValidationReport, EngineError> {
        self.validate_with_policy(solutions, test_cases, self.config.validation_policy)
            .await
    }

    /// Validation with an explicit policy
    ///
    /// All languages are resolved up front and share one deadline, so an
    /// unsupported language fails before anything is executed.
    #[instrument(skip(self, solutions, test_cases), fields(languages = solutions.len(), test_cases = test_cases.len()))]
    pub async fn validate_with_policy(
        &self,
        solutions: &[ReferenceSolution],
        test_cases: &[TestCase],
        policy: ValidationPolicy,
    ) -> Result<ValidationReport, EngineError> {
        if test_cases.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        let resolved = solutions
            .iter()
            .map(|solution| language::resolve(&solution.language).map(|id| (solution, id)))
            .collect::<Result<Vec<_>, _>>()?;

        if resolved.is_empty() {
            warn!("No reference solutions to validate");
        }

        let deadline = Instant::now() + self.config.deadline;
        let mut report = ValidationReport::default();

        for (solution, language_id) in resolved {
            let started = Instant::now();
            let outcome = self
                .run_resolved(
                    &solution.source_code,
                    &solution.language,
                    language_id,
                    test_cases,
                    deadline,
                    ReductionMode::Validation,
                )
                .await?;

            report.runs.push(LanguageRun {
                language: language::name_for_id(language_id).unwrap_or("unknown"),
                elapsed_ms: started.elapsed().as_millis() as u64,
                outcome: outcome.clone(),
            });

            let Some(failed) = outcome.first_failure().cloned() else {
                report.validated.push(solution.language.clone());
                continue;
            };

            warn!(
                language = %solution.language,
                test_case = failed.test_case_index,
                status = %failed.raw_result.status,
                "Reference solution failed"
            );
            report.failures.push(ValidationFailure {
                language: solution.language.clone(),
                test_case_index: failed.test_case_index,
                status: failed.status,
                status_description: failed.raw_result.status_description,
                outcome,
            });

            if policy == ValidationPolicy::FailFast {
                break;
            }
        }

        Ok(report)
    }
}

/// Outcome for a batch that never reached the service
fn unsubmitted_outcome(batch_id: Uuid, test_cases: &[TestCase], mode: ReductionMode) -> BatchOutcome {
    let results = test_cases
        .iter()
        .map(|_| JobResult::timed_out(JobToken::new("")))
        .collect();
    evaluator::evaluate(batch_id, test_cases, results, mode)
}

fn build_jobs(source_code: &str, language_id: u32, test_cases: &[TestCase]) -> Vec<JobSpec> {
    test_cases
        .iter()
        .map(|tc| JobSpec {
            source_code: source_code.to_string(),
            language_id,
            stdin: tc.input.clone(),
            expected_output: tc.expected_output.clone(),
        })
        .collect()
}
