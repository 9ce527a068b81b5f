/// Batch Submitter
///
/// One batch, one round trip. Either every job gets a token or the whole
/// submission fails and no tokens exist - the caller must not poll.
use crate::error::{EngineError, ServiceError};
use crate::service::ExecutionService;
use codelab_common::types::{JobSpec, JobToken};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

/// Submit `jobs` as a single batch
///
/// The returned token at position *i* belongs to the job at position *i*.
pub async fn submit<S>(
    service: &S,
    jobs: &[JobSpec],
    deadline: Instant,
) -> Result<Vec<JobToken>, EngineError>
where
    S: ExecutionService + ?Sized,
{
    if jobs.is_empty() {
        return Err(EngineError::EmptyBatch);
    }
    if Instant::now() >= deadline {
        error!(jobs = jobs.len(), "Deadline passed before submission");
        return Err(EngineError::SubmissionFailed(ServiceError::Timeout));
    }

    let tokens = match timeout_at(deadline, service.submit_batch(jobs)).await {
        Ok(Ok(tokens)) => tokens,
        Ok(Err(e)) => {
            error!(jobs = jobs.len(), error = %e, "Batch submission failed");
            return Err(EngineError::SubmissionFailed(e));
        }
        Err(_) => {
            error!(jobs = jobs.len(), "Batch submission hit the deadline");
            return Err(EngineError::SubmissionFailed(ServiceError::Timeout));
        }
    };

    if tokens.len() != jobs.len() {
        error!(
            expected = jobs.len(),
            actual = tokens.len(),
            "Token count does not match job count"
        );
        return Err(EngineError::SubmissionFailed(
            ServiceError::TokenCountMismatch {
                expected: jobs.len(),
                actual: tokens.len(),
            },
        ));
    }

    debug!(tokens = tokens.len(), "Batch accepted by execution service");
    Ok(tokens)
}
