use crate::domain::connection::Provider;
use crate::domain::x402::{SchemeSupport, SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::facilitators::{AdapterContext, AdapterError, FacilitatorAdapter};
use serde::Deserialize;
use uuid::Uuid;

/// In-process adapter driven by a `behavior` field in its credential blob.
/// Serves tests and sandbox tenants without touching the network.
#[derive(Default)]
pub struct MockAdapter;

#[derive(Debug, Default, Deserialize)]
struct MockCredentials {
    behavior: Option<String>,
}

fn behavior(ctx: &AdapterContext) -> String {
    serde_json::from_value::<MockCredentials>(ctx.credentials.clone())
        .ok()
        .and_then(|c| c.behavior)
        .unwrap_or_else(|| "always-success".to_string())
}

#[async_trait::async_trait]
impl FacilitatorAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn supported(&self, _ctx: &AdapterContext) -> Result<SupportedResponse, AdapterError> {
        Ok(SupportedResponse {
            schemes: vec![SchemeSupport {
                scheme: "exact".to_string(),
                networks: vec!["base".to_string(), "base-sepolia".to_string()],
            }],
        })
    }

    async fn verify(
        &self,
        ctx: &AdapterContext,
        _req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError> {
        match behavior(ctx).as_str() {
            "always-invalid" => Ok(VerifyOutcome {
                is_valid: false,
                payer: None,
                invalid_reason: Some("mock rejection".to_string()),
            }),
            "always-timeout" => Err(AdapterError::Timeout),
            _ => Ok(VerifyOutcome {
                is_valid: true,
                payer: Some("0xmockpayer".to_string()),
                invalid_reason: None,
            }),
        }
    }

    async fn settle(
        &self,
        ctx: &AdapterContext,
        req: &SettleRequest,
    ) -> Result<SettleOutcome, AdapterError> {
        match behavior(ctx).as_str() {
            "always-failure" => Ok(SettleOutcome {
                success: false,
                payer: None,
                tx_hash: None,
                network: req.payment_requirements.network.clone(),
                error_reason: Some("mock decline".to_string()),
            }),
            "always-timeout" => Err(AdapterError::Timeout),
            _ => Ok(SettleOutcome {
                success: true,
                payer: Some("0xmockpayer".to_string()),
                tx_hash: Some(format!("0xmock{}", Uuid::new_v4().simple())),
                network: req.payment_requirements.network.clone(),
                error_reason: None,
            }),
        }
    }
}
