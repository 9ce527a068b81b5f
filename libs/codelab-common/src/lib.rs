pub mod config;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{EngineConfig, ValidationPolicy};
pub use types::{
    BatchOutcome, JobResult, JobSpec, JobStatus, JobToken, TestCase, Verdict, VerdictStatus,
};
