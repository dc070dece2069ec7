use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Unknown,
    Settled,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Unknown => "unknown",
            SettlementStatus::Settled => "settled",
            SettlementStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> SettlementStatus {
        match s {
            "settled" => SettlementStatus::Settled,
            "failed" => SettlementStatus::Failed,
            "unknown" => SettlementStatus::Unknown,
            _ => SettlementStatus::Pending,
        }
    }

    /// Terminal rows never transition again and short-circuit dispatch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Settled | SettlementStatus::Failed)
    }
}

/// One row per `(tenant, fingerprint)`. The bound connection is immutable
/// once written; the row itself is never deleted.
#[derive(Debug, Clone)]
pub struct SettlementRow {
    pub tenant_id: Uuid,
    pub fingerprint: String,
    pub connection_id: Option<Uuid>,
    pub status: SettlementStatus,
    pub payer: Option<String>,
    pub tx_hash: Option<String>,
    pub network: Option<String>,
    pub error_reason: Option<String>,
    pub request_enc: Option<serde_json::Value>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
