use crate::auth::api_keys::{hash_api_key, hashes_match, parse_bearer_token, API_KEY_PREFIX};
use crate::error::ApiError;
use crate::repo::api_keys_repo::ApiKeysRepo;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

/// Inserted into request extensions on successful authentication. The
/// facade only ever sees the tenant identifier this produces.
#[derive(Debug, Clone, Copy)]
pub struct AuthedTenant {
    pub tenant_id: Uuid,
    pub api_key_id: Uuid,
}

#[derive(Clone)]
pub struct ApiKeyAuthState {
    pub api_keys_repo: ApiKeysRepo,
}

pub async fn authenticate(
    State(state): State<ApiKeyAuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_bearer_token)
    {
        Some(t) if t.starts_with(API_KEY_PREFIX) => t.to_string(),
        _ => return ApiError::Unauthorized.into_response(),
    };

    let hash = hash_api_key(&token);
    let record = match state.api_keys_repo.find_active_by_hash(&hash).await {
        Ok(Some(record)) => record,
        Ok(None) => return ApiError::Unauthorized.into_response(),
        Err(err) => {
            tracing::error!(error = %err, "api key lookup failed");
            return ApiError::Internal(err).into_response();
        }
    };

    if !hashes_match(&hash, &record.key_hash) {
        return ApiError::Unauthorized.into_response();
    }

    if let Err(err) = state.api_keys_repo.touch_last_used(record.id).await {
        tracing::warn!(error = %err, "failed to touch api key");
    }

    request.extensions_mut().insert(AuthedTenant {
        tenant_id: record.tenant_id,
        api_key_id: record.id,
    });

    next.run(request).await
}
