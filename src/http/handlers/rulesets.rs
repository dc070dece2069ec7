use crate::domain::decision::RoutingEndpoint;
use crate::domain::x402::PaymentRequirements;
use crate::error::ApiError;
use crate::routing::context::build_routing_context;
use crate::routing::dsl::compile_document;
use crate::routing::eval::evaluate;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RulesetDocumentRequest {
    pub document: String,
}

#[derive(Debug, Deserialize)]
pub struct DryRunRequest {
    pub document: String,
    pub endpoint: RoutingEndpoint,
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

#[derive(Debug, Serialize)]
struct ContextView {
    scheme: Option<String>,
    network: Option<String>,
    asset: Option<String>,
    amount: Option<String>,
    #[serde(rename = "payTo")]
    pay_to: Option<String>,
    endpoint: &'static str,
}

pub async fn get_active_ruleset(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    match state.rulesets_repo.load_active(tenant_id).await {
        Ok(Some(stored)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "version": stored.version,
                "document": stored.document,
            })),
        )
            .into_response(),
        Ok(None) => ApiError::NotFound.into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

/// Compile-only check; nothing is stored.
pub async fn validate_ruleset(
    Path(_tenant_id): Path<Uuid>,
    Json(req): Json<RulesetDocumentRequest>,
) -> Response {
    match compile_document(&req.document) {
        Ok(compiled) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "defaultConnection": compiled.default,
                "ruleCount": compiled.rules.len(),
            })),
        )
            .into_response(),
        Err(err) => ApiError::RulesetInvalid(err.issues()).into_response(),
    }
}

/// Evaluate a candidate document against caller-supplied requirements
/// without touching stored state. Pure evaluation makes this exact.
pub async fn dry_run_ruleset(
    Path(_tenant_id): Path<Uuid>,
    Json(req): Json<DryRunRequest>,
) -> Response {
    let compiled = match compile_document(&req.document) {
        Ok(compiled) => compiled,
        Err(err) => return ApiError::RulesetInvalid(err.issues()).into_response(),
    };

    let context = build_routing_context(&req.payment_requirements, req.endpoint);
    let decision = evaluate(&compiled, &context);

    let view = ContextView {
        scheme: context.scheme.clone(),
        network: context.network.clone(),
        asset: context.asset.clone(),
        amount: context.amount.clone(),
        pay_to: context.pay_to.clone(),
        endpoint: context.endpoint.as_str(),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true,
            "decision": decision,
            "context": view,
        })),
    )
        .into_response()
}

/// Activate a new version: compile first, then deactivate-and-insert
/// atomically. All prior versions are disabled in the same transaction.
pub async fn activate_ruleset(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<RulesetDocumentRequest>,
) -> Response {
    if let Err(err) = compile_document(&req.document) {
        return ApiError::RulesetInvalid(err.issues()).into_response();
    }

    match state.rulesets_repo.activate(tenant_id, &req.document).await {
        Ok(version) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "version": version })),
        )
            .into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}
