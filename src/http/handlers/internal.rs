use crate::error::ApiError;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// External-scheduler entry point for the settlement reconciliation
/// sweep. Idempotent; overlapping invocations only ever transition rows
/// still `unknown`.
pub async fn reconcile_sweep(State(state): State<AppState>) -> Response {
    match state.reconciler.sweep().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

/// External-scheduler entry point for the capability refresh sweep.
pub async fn capability_refresh_sweep(State(state): State<AppState>) -> Response {
    match state.capability_service.refresh_all().await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}
