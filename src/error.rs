use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Error body returned by every endpoint: `{error, code, details?}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid request")]
    InvalidRequest(Vec<String>),
    #[error("ruleset not configured")]
    RulesetMissing,
    #[error("ruleset invalid")]
    RulesetInvalid(Vec<String>),
    #[error("no eligible connections")]
    NoEligibleConnections,
    #[error("no routing match")]
    NoRoute,
    #[error("resource not found")]
    NotFound,
    #[error("upstream provider error")]
    Upstream,
    #[error("settlement outcome unknown")]
    SettleUnknown { request_id: String },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::RulesetMissing => "ruleset_missing",
            ApiError::RulesetInvalid(_) => "ruleset_invalid",
            ApiError::NoEligibleConnections => "no_eligible_connections",
            ApiError::NoRoute => "no_route",
            ApiError::NotFound => "not_found",
            ApiError::Upstream => "upstream_error",
            ApiError::SettleUnknown { .. } => "settle_unknown",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_)
            | ApiError::RulesetMissing
            | ApiError::RulesetInvalid(_)
            | ApiError::NoRoute => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NoEligibleConnections | ApiError::SettleUnknown { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Upstream => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (message, details) = match &self {
            ApiError::InvalidRequest(issues) | ApiError::RulesetInvalid(issues) => {
                (self.to_string(), Some(issues.clone()))
            }
            ApiError::SettleUnknown { request_id } => (
                "Settlement unknown".to_string(),
                Some(vec![format!("requestId: {}", request_id)]),
            ),
            // internal detail is logged by the caller, never returned
            ApiError::Internal(_) => ("internal error".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: message,
            code,
            details,
        };
        (status, Json(body)).into_response()
    }
}
