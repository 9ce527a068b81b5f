use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How multi-language reference validation reacts to a failing language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Stop at the first failing language, later languages are not run
    #[default]
    FailFast,
    /// Run every language and report every failure
    ReportAll,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_fast" | "fail-fast" | "failfast" => Ok(ValidationPolicy::FailFast),
            "report_all" | "report-all" | "all" => Ok(ValidationPolicy::ReportAll),
            other => Err(format!("unknown validation policy '{}'", other)),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::FailFast => write!(f, "fail_fast"),
            ValidationPolicy::ReportAll => write!(f, "report_all"),
        }
    }
}

/// Execution engine configuration
/// Provides defaults with environment variable overrides
#[derive(Clone)]
pub struct EngineConfig {
    /// Base URL of the execution service, without trailing slash
    pub service_url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub poll_interval: Duration,
    /// Upper bound for the backed-off poll interval.
    /// Equal to `poll_interval` means a fixed interval.
    pub max_poll_interval: Duration,
    /// Default wall-clock bound for one batch (or one validation run)
    pub deadline: Duration,
    /// Timeout for a single HTTP round trip
    pub request_timeout: Duration,
    pub max_concurrent_batches: usize,
    /// Largest batch the service accepts in one request
    pub max_batch_size: usize,
    pub validation_policy: ValidationPolicy,
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let poll_interval = env_millis("POLL_INTERVAL_MS", 1000);

        Self {
            service_url: env::var("JUDGE0_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:2358".to_string()),
            api_key: env::var("JUDGE0_API_KEY").ok().filter(|k| !k.is_empty()),
            api_key_header: env::var("JUDGE0_API_KEY_HEADER")
                .unwrap_or_else(|_| "X-Auth-Token".to_string()),
            poll_interval,
            max_poll_interval: env_millis("POLL_MAX_INTERVAL_MS", poll_interval.as_millis() as u64),
            deadline: env_millis("BATCH_DEADLINE_MS", 30_000),
            request_timeout: env_millis("HTTP_TIMEOUT_MS", 10_000),
            max_concurrent_batches: env::var("MAX_CONCURRENT_BATCHES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
            max_batch_size: env::var("JUDGE0_MAX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            validation_policy: env::var("VALIDATION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Reject values the poll loop cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.service_url.is_empty() {
            return Err("service url must not be empty".to_string());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be greater than zero".to_string());
        }
        if self.max_poll_interval < self.poll_interval {
            return Err(format!(
                "max poll interval ({}ms) is below the poll interval ({}ms)",
                self.max_poll_interval.as_millis(),
                self.poll_interval.as_millis()
            ));
        }
        if self.deadline.is_zero() {
            return Err("batch deadline must be greater than zero".to_string());
        }
        if self.max_concurrent_batches == 0 {
            return Err("max concurrent batches must be at least 1".to_string());
        }
        if self.max_batch_size == 0 {
            return Err("max batch size must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:2358".to_string(),
            api_key: None,
            api_key_header: "X-Auth-Token".to_string(),
            poll_interval: Duration::from_millis(1000),
            max_poll_interval: Duration::from_millis(1000),
            deadline: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            max_concurrent_batches: 16,
            max_batch_size: 20,
            validation_policy: ValidationPolicy::FailFast,
        }
    }
}

// Keep the api key out of logs
impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("service_url", &self.service_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_header", &self.api_key_header)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_interval", &self.max_poll_interval)
            .field("deadline", &self.deadline)
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrent_batches", &self.max_concurrent_batches)
            .field("max_batch_size", &self.max_batch_size)
            .field("validation_policy", &self.validation_policy)
            .finish()
    }
}
