// HTTP route handlers for the Codelab API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use codelab_common::types::{BatchOutcome, TestCase};
use codelab_engine::{language, EngineError, ReferenceSolution};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::{metrics, AppState};

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, message: impl Into<String>) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                status_code: StatusCode::OK.as_u16(),
                data,
                message: message.into(),
                success: true,
            }),
        )
            .into_response()
    }
}

/// Error envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "status_code": self.status.as_u16(),
            "message": self.message,
            "success": false,
        });
        if let Some(details) = self.details {
            body["errors"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            message: err.to_string(),
            details: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCodeRequest {
    pub source_code: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Execution-service language id, accepted for older clients
    #[serde(default)]
    pub language_id: Option<u32>,
    #[serde(default)]
    pub stdin: Vec<String>,
    #[serde(default)]
    pub expected_outputs: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteCodeResponse {
    pub language: String,
    pub passed: usize,
    pub total: usize,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: BatchOutcome,
}

/// Canonical language name from either field of the request
///
/// Aliases and casing collapse to one name, which is also the metrics label.
fn requested_language(payload: &ExecuteCodeRequest) -> Result<&'static str, ApiError> {
    let resolved = match (&payload.language, payload.language_id) {
        (Some(name), _) => language::lookup(name)
            .map(|lang| lang.name)
            .ok_or_else(|| ApiError::from(EngineError::UnsupportedLanguage(name.clone()))),
        (None, Some(id)) => language::name_for_id(id)
            .ok_or_else(|| ApiError::bad_request(format!("unsupported language id: {}", id))),
        (None, None) => {
            metrics::record_rejected("missing_language");
            return Err(ApiError::bad_request("language is required"));
        }
    };
    if resolved.is_err() {
        metrics::record_rejected("unsupported_language");
    }
    resolved
}

/// POST /api/v1/execute-code - Run code against the given test cases
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteCodeRequest>,
) -> Response {
    match run_execute_code(&state, payload).await {
        Ok(response) => ApiResponse::ok(response, "Code executed"),
        Err(e) => e.into_response(),
    }
}

async fn run_execute_code(
    state: &AppState,
    payload: ExecuteCodeRequest,
) -> Result<ExecuteCodeResponse, ApiError> {
    if payload.stdin.is_empty() || payload.expected_outputs.len() != payload.stdin.len() {
        metrics::record_rejected("invalid_test_cases");
        return Err(ApiError::bad_request("Invalid or missing test cases"));
    }

    let language = requested_language(&payload)?;

    // Requests may shorten the deadline, never extend it
    let max_timeout = state.engine.config().deadline;
    let timeout = payload
        .timeout_ms
        .map(Duration::from_millis)
        .map_or(max_timeout, |t| t.min(max_timeout));

    let test_cases: Vec<TestCase> = payload
        .stdin
        .into_iter()
        .zip(payload.expected_outputs)
        .map(|(input, expected)| TestCase::new(input, expected))
        .collect();

    let start = Instant::now();
    let outcome = state
        .engine
        .execute_submission(&payload.source_code, language, &test_cases, Some(timeout))
        .await
        .map_err(|e| {
            if e.is_client_error() {
                metrics::record_rejected("engine_rejected");
                warn!(language = %language, error = %e, "Execution request rejected");
            } else {
                metrics::record_upstream_failure("execute_code");
                error!(language = %language, error = %e, "Execution failed");
            }
            ApiError::from(e)
        })?;
    let duration_ms = start.elapsed().as_millis() as u64;

    metrics::record_batch(language, &outcome, duration_ms as f64);
    info!(
        batch_id = %outcome.batch_id,
        language = %language,
        passed = outcome.passed_count(),
        total = outcome.verdicts.len(),
        duration_ms,
        "Code executed"
    );

    Ok(ExecuteCodeResponse {
        language: language.to_string(),
        passed: outcome.passed_count(),
        total: outcome.verdicts.len(),
        completed_at: Utc::now(),
        duration_ms,
        outcome,
    })
}

#[derive(Debug, Deserialize)]
pub struct TestCaseInput {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateProblemRequest {
    pub reference_solutions: Vec<ReferenceSolution>,
    pub test_cases: Vec<TestCaseInput>,
}

#[derive(Debug, Serialize)]
pub struct ValidateProblemResponse {
    pub valid: bool,
    pub validated: Vec<String>,
}

/// POST /api/v1/problems/validate - Check reference solutions before saving a problem
pub async fn validate_problem(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateProblemRequest>,
) -> Response {
    match run_validate_problem(&state, payload).await {
        Ok(response) => ApiResponse::ok(response, "All reference solutions passed"),
        Err(e) => e.into_response(),
    }
}

async fn run_validate_problem(
    state: &AppState,
    payload: ValidateProblemRequest,
) -> Result<ValidateProblemResponse, ApiError> {
    if payload.test_cases.is_empty() {
        metrics::record_rejected("invalid_test_cases");
        return Err(ApiError::bad_request("At least one test case is required"));
    }

    let test_cases: Vec<TestCase> = payload
        .test_cases
        .into_iter()
        .map(|tc| TestCase::new(tc.input, tc.output))
        .collect();

    let report = state
        .engine
        .validate_reference_solutions(&payload.reference_solutions, &test_cases)
        .await
        .map_err(|e| {
            if !e.is_client_error() {
                metrics::record_upstream_failure("validate_problem");
            }
            ApiError::from(e)
        })?;

    for run in &report.runs {
        metrics::record_batch(run.language, &run.outcome, run.elapsed_ms as f64);
    }

    if let Some(failure) = report.first_failure() {
        warn!(
            language = %failure.language,
            test_case = failure.test_case_index,
            "Problem rejected: reference solution failed"
        );
        let failures: Vec<serde_json::Value> = report
            .failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "language": f.language,
                    "test_case_index": f.test_case_index,
                    "status": f.status,
                    "status_description": f.status_description,
                })
            })
            .collect();

        return Err(ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: format!(
                "Testcase {} failed for language {}",
                failure.test_case_index + 1,
                failure.language
            ),
            details: Some(serde_json::Value::Array(failures)),
        });
    }

    Ok(ValidateProblemResponse {
        valid: true,
        validated: report.validated,
    })
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "uptime_secs": state.start_time.elapsed().as_secs(),
        })),
    )
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, metrics::render_metrics())
}
