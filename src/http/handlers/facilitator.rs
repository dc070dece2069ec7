use crate::domain::x402::{SettleRequest, VerifyRequest};
use crate::error::ApiError;
use crate::http::middleware::api_key_auth::AuthedTenant;
use crate::service::router_service::RouteMeta;
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

const CONNECTION_HEADER: &str = "x-route402-connection";
const RULE_HEADER: &str = "x-route402-rule";

fn with_route_headers(mut response: Response, meta: &RouteMeta) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&meta.connection_name) {
        headers.insert(CONNECTION_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.rule_name) {
        headers.insert(RULE_HEADER, value);
    }
    response
}

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::InvalidRequest(vec![e.to_string()]))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(tenant): Extension<AuthedTenant>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let req: VerifyRequest = match parse_body(body) {
        Ok(req) => req,
        Err(err) => return err.into_response(),
    };

    match state.router_service.verify(tenant.tenant_id, req).await {
        Ok((outcome, meta)) => {
            with_route_headers((StatusCode::OK, Json(outcome)).into_response(), &meta)
        }
        Err(err) => err.into_response(),
    }
}

pub async fn settle(
    State(state): State<AppState>,
    Extension(tenant): Extension<AuthedTenant>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let req: SettleRequest = match parse_body(body) {
        Ok(req) => req,
        Err(err) => return err.into_response(),
    };

    match state.router_service.settle(tenant.tenant_id, req).await {
        Ok((outcome, meta)) => {
            with_route_headers((StatusCode::OK, Json(outcome)).into_response(), &meta)
        }
        Err(err) => err.into_response(),
    }
}

pub async fn supported(
    State(state): State<AppState>,
    Extension(tenant): Extension<AuthedTenant>,
) -> Response {
    match state.router_service.supported(tenant.tenant_id).await {
        Ok(aggregated) => (StatusCode::OK, Json(aggregated)).into_response(),
        Err(err) => err.into_response(),
    }
}
