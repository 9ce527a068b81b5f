// Test fixtures: result builders and a scripted in-memory execution service

use crate::error::ServiceError;
use crate::service::ExecutionService;
use codelab_common::types::{JobResult, JobSpec, JobStatus, JobToken};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn with_status(token: JobToken, status: JobStatus) -> JobResult {
    JobResult {
        status,
        status_description: format!("{:?}", status),
        ..JobResult::pending(token)
    }
}

pub(crate) fn accepted(token: JobToken, stdout: &str) -> JobResult {
    JobResult {
        stdout: stdout.to_string(),
        status_id: Some(3),
        time: Some(0.01),
        memory: Some(1024),
        ..with_status(token, JobStatus::Accepted)
    }
}

pub(crate) fn processing(token: JobToken) -> JobResult {
    with_status(token, JobStatus::Processing)
}

/// How one submitted job behaves
#[derive(Debug, Clone)]
pub(crate) struct Scripted {
    /// Number of queries after which the job turns terminal
    pub ready_after: u32,
    pub status: JobStatus,
    pub stdout: String,
}

impl Scripted {
    pub fn accepted(stdout: impl Into<String>) -> Self {
        Self {
            ready_after: 1,
            status: JobStatus::Accepted,
            stdout: stdout.into(),
        }
    }

    pub fn status(status: JobStatus) -> Self {
        Self {
            ready_after: 1,
            status,
            stdout: String::new(),
        }
    }

    pub fn never() -> Self {
        Self {
            ready_after: u32::MAX,
            status: JobStatus::Processing,
            stdout: String::new(),
        }
    }

    pub fn after(mut self, polls: u32) -> Self {
        self.ready_after = polls;
        self
    }
}

type Script = dyn Fn(&JobSpec) -> Scripted + Send + Sync;

#[derive(Default)]
struct State {
    jobs: HashMap<JobToken, (Scripted, u32)>,
    submitted: Vec<Vec<JobSpec>>,
    queried: Vec<Vec<JobToken>>,
    next_id: usize,
}

/// Fake execution service whose jobs follow a script keyed on the job spec
pub(crate) struct ScriptedService {
    script: Box<Script>,
    submit_failure: Option<u16>,
    state: Mutex<State>,
    submit_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&JobSpec) -> Scripted + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            submit_failure: None,
            state: Mutex::new(State::default()),
            submit_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Every submission is answered with this HTTP status
    pub fn failing_submissions(mut self, status: u16) -> Self {
        self.submit_failure = Some(status);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Language ids of every submitted batch, in submission order
    pub fn submitted_languages(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        state
            .submitted
            .iter()
            .filter_map(|batch| batch.first().map(|job| job.language_id))
            .collect()
    }

    pub fn submitted(&self) -> Vec<Vec<JobSpec>> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn largest_query(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.queried.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ExecutionService for ScriptedService {
    async fn submit_batch(&self, jobs: &[JobSpec]) -> Result<Vec<JobToken>, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.submit_failure {
            return Err(ServiceError::Status {
                status,
                body: "scripted failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.submitted.push(jobs.to_vec());

        let mut tokens = Vec::with_capacity(jobs.len());
        for job in jobs {
            state.next_id += 1;
            let token = JobToken::new(format!("{}-{}", job.language_id, state.next_id));
            state.jobs.insert(token.clone(), ((self.script)(job), 0));
            tokens.push(token);
        }
        Ok(tokens)
    }

    async fn fetch_results(&self, tokens: &[JobToken]) -> Result<Vec<JobResult>, ServiceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        state.queried.push(tokens.to_vec());

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            let Some((scripted, polls)) = state.jobs.get_mut(token) else {
                continue;
            };
            *polls += 1;
            let result = if *polls >= scripted.ready_after {
                JobResult {
                    stdout: scripted.stdout.clone(),
                    ..with_status(token.clone(), scripted.status)
                }
            } else {
                processing(token.clone())
            };
            results.push(result);
        }
        // The service does not promise any order
        results.reverse();
        Ok(results)
    }
}
