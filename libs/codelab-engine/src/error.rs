use thiserror::Error;

/// Failure talking to the execution service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("execution service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode execution service response: {0}")]
    Decode(String),

    #[error("execution service returned no token for job {index}: {reason}")]
    MissingToken { index: usize, reason: String },

    #[error("execution service returned {actual} tokens for {expected} jobs")]
    TokenCountMismatch { expected: usize, actual: usize },

    #[error("execution service call did not finish before the deadline")]
    Timeout,
}

impl ServiceError {
    /// The service rejected the request itself (4xx), as opposed to failing
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Errors surfaced by the execution engine
///
/// Poll timeouts are deliberately absent: they degrade into failing
/// verdicts instead of aborting the request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("batch contains no test cases")]
    EmptyBatch,

    #[error("batch submission failed: {0}")]
    SubmissionFailed(#[source] ServiceError),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Whether the caller can fix the request and try again
    pub fn is_client_error(&self) -> bool {
        match self {
            EngineError::UnsupportedLanguage(_) | EngineError::EmptyBatch => true,
            EngineError::SubmissionFailed(cause) => cause.is_rejection(),
            EngineError::InvalidConfig(_) => false,
        }
    }
}
