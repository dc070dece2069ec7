use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(rename = "payTo", skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
    #[serde(rename = "paymentPayload", skip_serializing_if = "Option::is_none")]
    pub payment_payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
    #[serde(rename = "paymentPayload")]
    pub payment_payload: serde_json::Value,
}

/// Canonical verify result, independent of provider wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(rename = "invalidReason", skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Canonical settle result, independent of provider wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(rename = "errorReason", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeSupport {
    pub scheme: String,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    pub schemes: Vec<SchemeSupport>,
}
