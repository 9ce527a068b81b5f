// Route definitions for the Codelab API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/execute-code", post(handlers::execute_code))
        .route("/api/v1/problems/validate", post(handlers::validate_problem))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
}
