use crate::domain::connection::Provider;
use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub provider: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub credentials: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateConnectionRequest {
    pub enabled: bool,
}

pub async fn list_connections(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    match state.connections_repo.list(tenant_id).await {
        Ok(connections) => (StatusCode::OK, Json(connections)).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

pub async fn create_connection(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<CreateConnectionRequest>,
) -> Response {
    let provider = match Provider::parse(&req.provider) {
        Some(provider) => provider,
        None => {
            return ApiError::InvalidRequest(vec![format!(
                "provider: unknown provider \"{}\"",
                req.provider
            )])
            .into_response()
        }
    };

    if req.name.trim().is_empty() {
        return ApiError::InvalidRequest(vec!["name: required".to_string()]).into_response();
    }

    if let Err(issues) = validate_credentials(provider, &req.credentials) {
        return ApiError::InvalidRequest(issues).into_response();
    }

    let encrypted = match state
        .cipher
        .encrypt(tenant_id, &req.credentials)
        .and_then(|payload| payload.to_json())
    {
        Ok(value) => value,
        Err(err) => return ApiError::Internal(err.into()).into_response(),
    };

    match state
        .connections_repo
        .create(tenant_id, provider, req.name.trim(), req.enabled, encrypted)
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

pub async fn update_connection(
    State(state): State<AppState>,
    Path((tenant_id, connection_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateConnectionRequest>,
) -> Response {
    match state
        .connections_repo
        .set_enabled(tenant_id, connection_id, req.enabled)
        .await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": connection_id, "enabled": req.enabled })),
        )
            .into_response(),
        Ok(false) => ApiError::NotFound.into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

pub async fn test_connection(
    State(state): State<AppState>,
    Path((tenant_id, connection_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match state
        .capability_service
        .test_connection(tenant_id, connection_id)
        .await
    {
        Ok(check) => (StatusCode::OK, Json(check)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Shape check before encryption; each provider declares its own required
/// credential fields.
fn validate_credentials(
    provider: Provider,
    credentials: &serde_json::Value,
) -> Result<(), Vec<String>> {
    let required: &[&str] = match provider {
        Provider::Cdp => &["apiKey", "apiSecret"],
        Provider::Thirdweb => &["walletSecret"],
        Provider::Mogami | Provider::Mock => &[],
    };

    if !credentials.is_object() {
        return Err(vec!["credentials: expected an object".to_string()]);
    }

    let issues: Vec<String> = required
        .iter()
        .filter(|field| {
            credentials
                .get(**field)
                .and_then(serde_json::Value::as_str)
                .map(|s| s.is_empty())
                .unwrap_or(true)
        })
        .map(|field| format!("credentials.{}: required", field))
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cdp_credentials_require_key_and_secret() {
        let issues =
            validate_credentials(Provider::Cdp, &json!({"apiKey": "k"})).unwrap_err();
        assert_eq!(issues, vec!["credentials.apiSecret: required".to_string()]);
    }

    #[test]
    fn mogami_credentials_may_be_empty() {
        assert!(validate_credentials(Provider::Mogami, &json!({})).is_ok());
    }

    #[test]
    fn non_object_credentials_rejected() {
        assert!(validate_credentials(Provider::Mock, &json!("nope")).is_err());
    }
}
