use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListDecisionsQuery {
    pub limit: Option<i64>,
}

pub async fn list_decisions(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ListDecisionsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.decisions_repo.list_recent(tenant_id, limit).await {
        Ok(decisions) => (StatusCode::OK, Json(decisions)).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}
