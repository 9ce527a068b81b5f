/// Execution Service - Contract of the external sandbox
///
/// **Core Responsibility:**
/// Accept a batch of jobs and report their status by token.
///
/// **Contract the engine relies on:**
/// - `submit_batch` returns one token per job, in job order
/// - `fetch_results` answers for many tokens in a single round trip
/// - a terminal status never changes on later queries
///
/// The engine never assumes anything about how jobs are executed.
use crate::error::ServiceError;
use codelab_common::types::{JobResult, JobSpec, JobToken};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ExecutionService: Send + Sync {
    /// Submit every job in one call
    async fn submit_batch(&self, jobs: &[JobSpec]) -> Result<Vec<JobToken>, ServiceError>;

    /// Query the current status of every given token in one call
    ///
    /// The response may be in any order and may omit tokens.
    async fn fetch_results(&self, tokens: &[JobToken]) -> Result<Vec<JobResult>, ServiceError>;
}
