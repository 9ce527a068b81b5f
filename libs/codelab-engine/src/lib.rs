//! Batch execution & verdict engine
//!
//! Runs one piece of source code against an ordered set of test cases on an
//! external sandboxed execution service and reduces the raw job results into
//! verdicts. Layers, leaves first:
//!
//! - `language`  - human-readable name to service language id
//! - `service`   - the submit/poll seam, `judge0` implements it over HTTP
//! - `submitter` - one batch, one round trip, one token per job
//! - `poller`    - drives every token to a terminal status or the deadline
//! - `evaluator` - turns terminal results into verdicts
//! - `executor`  - the facade callers use

pub mod error;
pub mod evaluator;
pub mod executor;
pub mod judge0;
pub mod language;
pub mod poller;
pub mod service;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use error::{EngineError, ServiceError};
pub use evaluator::ReductionMode;
pub use executor::{
    ExecutionEngine, LanguageRun, ReferenceSolution, ValidationFailure, ValidationReport,
};
pub use judge0::Judge0Client;
pub use service::ExecutionService;
