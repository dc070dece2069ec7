use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Cdp,
    Thirdweb,
    Mogami,
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Cdp => "cdp",
            Provider::Thirdweb => "thirdweb",
            Provider::Mogami => "mogami",
            Provider::Mock => "mock",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "cdp" => Some(Provider::Cdp),
            "thirdweb" => Some(Provider::Thirdweb),
            "mogami" => Some(Provider::Mogami),
            "mock" => Some(Provider::Mock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatus {
    Unknown,
    Ok,
    Error,
}

impl CapabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityStatus::Unknown => "unknown",
            CapabilityStatus::Ok => "ok",
            CapabilityStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> CapabilityStatus {
        match s {
            "ok" => CapabilityStatus::Ok,
            "error" => CapabilityStatus::Error,
            _ => CapabilityStatus::Unknown,
        }
    }
}

/// A tenant's registration of one upstream facilitator backend.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: Provider,
    pub name: String,
    pub enabled: bool,
    pub credentials_enc: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub id: Uuid,
    pub name: String,
    pub provider: Provider,
    pub enabled: bool,
    pub status: CapabilityStatus,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub latency_p50_ms: Option<i32>,
    pub latency_p95_ms: Option<i32>,
}
