/// Judge0 client - HTTP implementation of the execution service
///
/// Uses the batch endpoints so a whole batch costs one request to submit
/// and one request per poll cycle:
/// - `POST /submissions/batch`
/// - `GET  /submissions/batch?tokens=..`
///
/// Text fields travel base64-encoded in both directions so that programs
/// printing invalid UTF-8 do not break decoding of the whole batch.
///
/// Judge0 rejects batch requests larger than its `MAX_SUBMISSION_BATCH_SIZE`
/// (20 by default) with a 4xx. Batches are split into requests of at most
/// `max_batch_size` jobs, in order, so one engine batch may cost several
/// requests per submit or poll cycle. Keep `JUDGE0_MAX_BATCH_SIZE` in line
/// with the server setting.
use crate::error::ServiceError;
use crate::service::ExecutionService;
use base64::{engine::general_purpose, Engine as _};
use codelab_common::types::{JobResult, JobSpec, JobStatus, JobToken};
use codelab_common::EngineConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

const RESULT_FIELDS: &str = "token,stdout,stderr,status,time,memory,compile_output";

pub struct Judge0Client {
    http: reqwest::Client,
    base_url: String,
    max_batch_size: usize,
}

impl Judge0Client {
    pub fn new(config: &EngineConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                .map_err(|e| ServiceError::Decode(format!("invalid api key header name: {}", e)))?;
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| ServiceError::Decode(format!("invalid api key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            max_batch_size: config.max_batch_size.max(1),
        })
    }

    fn batch_url(&self) -> String {
        format!("{}/submissions/batch", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct SubmissionPayload {
    source_code: String,
    language_id: u32,
    stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
}

impl From<&JobSpec> for SubmissionPayload {
    fn from(job: &JobSpec) -> Self {
        Self {
            source_code: encode(&job.source_code),
            language_id: job.language_id,
            stdin: encode(&job.stdin),
            expected_output: job.expected_output.as_deref().map(encode),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchPayload {
    submissions: Vec<SubmissionPayload>,
}

/// One entry of the batch-create response: either a token or field errors
#[derive(Debug, Deserialize)]
struct TokenEntry {
    token: Option<String>,
    #[serde(flatten)]
    errors: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BatchResults {
    submissions: Vec<Option<RawSubmission>>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    id: u32,
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    token: String,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    time: Option<String>,
    memory: Option<u64>,
    status: Option<RawStatus>,
}

/// Map a service status id onto the engine's status enumeration
///
/// The table belongs to the service; unknown ids are treated as an
/// internal error so a job can never stay unresolved forever.
pub fn status_from_id(id: u32) -> JobStatus {
    match id {
        1 => JobStatus::InQueue,
        2 => JobStatus::Processing,
        3 => JobStatus::Accepted,
        4 => JobStatus::WrongAnswer,
        5 => JobStatus::TimeLimitExceeded,
        6 => JobStatus::CompileError,
        7..=12 => JobStatus::RuntimeError,
        _ => JobStatus::InternalError,
    }
}

fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

fn decode(field: Option<String>) -> Result<String, ServiceError> {
    let Some(encoded) = field else {
        return Ok(String::new());
    };
    // The service wraps base64 output at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ServiceError::Decode(format!("invalid base64 field: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl TryFrom<RawSubmission> for JobResult {
    type Error = ServiceError;

    fn try_from(raw: RawSubmission) -> Result<Self, Self::Error> {
        let (status, status_id, status_description) = match raw.status {
            Some(s) => (status_from_id(s.id), Some(s.id), s.description),
            None => (JobStatus::Pending, None, "Pending".to_string()),
        };

        Ok(JobResult {
            token: JobToken::new(raw.token),
            status,
            status_id,
            status_description,
            stdout: decode(raw.stdout)?,
            stderr: decode(raw.stderr)?,
            compile_output: decode(raw.compile_output)?,
            time: raw.time.and_then(|t| t.parse().ok()),
            memory: raw.memory,
            timed_out: false,
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

fn tokens_from_entries(entries: Vec<TokenEntry>) -> Result<Vec<JobToken>, ServiceError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry.token {
            Some(token) => Ok(JobToken::new(token)),
            None => Err(ServiceError::MissingToken {
                index,
                reason: serde_json::Value::Object(entry.errors).to_string(),
            }),
        })
        .collect()
}

impl Judge0Client {
    async fn submit_chunk(&self, jobs: &[JobSpec]) -> Result<Vec<TokenEntry>, ServiceError> {
        let payload = BatchPayload {
            submissions: jobs.iter().map(SubmissionPayload::from).collect(),
        };

        let response = self
            .http
            .post(self.batch_url())
            .query(&[("base64_encoded", "true")])
            .json(&payload)
            .send()
            .await?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn fetch_chunk(&self, tokens: &[JobToken]) -> Result<Vec<JobResult>, ServiceError> {
        let joined = tokens
            .iter()
            .map(JobToken::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .http
            .get(self.batch_url())
            .query(&[
                ("tokens", joined.as_str()),
                ("base64_encoded", "true"),
                ("fields", RESULT_FIELDS),
            ])
            .send()
            .await?;
        let batch: BatchResults = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        batch
            .submissions
            .into_iter()
            .flatten()
            .map(JobResult::try_from)
            .collect()
    }
}

#[async_trait::async_trait]
impl ExecutionService for Judge0Client {
    async fn submit_batch(&self, jobs: &[JobSpec]) -> Result<Vec<JobToken>, ServiceError> {
        let mut entries = Vec::with_capacity(jobs.len());
        for chunk in jobs.chunks(self.max_batch_size) {
            entries.extend(self.submit_chunk(chunk).await?);
        }

        debug!(jobs = jobs.len(), tokens = entries.len(), "Batch submitted");
        tokens_from_entries(entries)
    }

    async fn fetch_results(&self, tokens: &[JobToken]) -> Result<Vec<JobResult>, ServiceError> {
        let mut results = Vec::with_capacity(tokens.len());
        for chunk in tokens.chunks(self.max_batch_size) {
            results.extend(self.fetch_chunk(chunk).await?);
        }
        Ok(results)
    }
}
