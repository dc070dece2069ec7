use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingEndpoint {
    Verify,
    Settle,
}

impl RoutingEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingEndpoint::Verify => "verify",
            RoutingEndpoint::Settle => "settle",
        }
    }
}

/// Append-only decision log entry, one per verify/settle request.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub tenant_id: Uuid,
    pub request_id: String,
    pub endpoint: RoutingEndpoint,
    pub connection_id: Option<Uuid>,
    pub rule_name: Option<String>,
    pub fingerprint: Option<String>,
    pub latency_ms: i32,
    pub ok: bool,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionView {
    pub request_id: String,
    pub endpoint: String,
    pub connection_id: Option<Uuid>,
    pub rule_name: Option<String>,
    pub fingerprint: Option<String>,
    pub latency_ms: Option<i32>,
    pub ok: bool,
    pub error_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
