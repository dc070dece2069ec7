use crate::domain::connection::Provider;
use crate::domain::x402::{SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::facilitators::client::{build_url, send_json, send_json_with_retry};
use crate::facilitators::normalize::{normalize_settle, normalize_supported, normalize_verify};
use crate::facilitators::{AdapterContext, AdapterError, AdapterTimeouts, FacilitatorAdapter};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.thirdweb.com/v1/payments/x402";
const SECRET_HEADER: &str = "x-secret-key";

#[derive(Debug, Deserialize)]
struct ThirdwebCredentials {
    #[serde(rename = "walletSecret")]
    wallet_secret: String,
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
}

pub struct ThirdwebAdapter {
    client: reqwest::Client,
    timeouts: AdapterTimeouts,
}

impl ThirdwebAdapter {
    pub fn new(client: reqwest::Client, timeouts: AdapterTimeouts) -> Self {
        Self { client, timeouts }
    }

    fn credentials(ctx: &AdapterContext) -> Result<ThirdwebCredentials, AdapterError> {
        serde_json::from_value(ctx.credentials.clone()).map_err(|e| AdapterError::Credentials {
            provider: "thirdweb",
            detail: e.to_string(),
        })
    }

    fn base_url(credentials: &ThirdwebCredentials) -> String {
        credentials
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

/// thirdweb wraps responses in a `result` envelope; unwrap before handing
/// to the shared normalizer.
fn unwrap_result(raw: &serde_json::Value) -> &serde_json::Value {
    raw.get("result").unwrap_or(raw)
}

#[async_trait::async_trait]
impl FacilitatorAdapter for ThirdwebAdapter {
    fn provider(&self) -> Provider {
        Provider::Thirdweb
    }

    async fn supported(&self, ctx: &AdapterContext) -> Result<SupportedResponse, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/supported");

        let raw = send_json_with_retry(
            self.client
                .get(&url)
                .header(SECRET_HEADER, &credentials.wallet_secret),
            self.timeouts.read,
        )
        .await?;
        Ok(normalize_supported(&raw)?)
    }

    async fn verify(
        &self,
        ctx: &AdapterContext,
        req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/verify");

        let raw = send_json_with_retry(
            self.client
                .post(&url)
                .header(SECRET_HEADER, &credentials.wallet_secret)
                .json(req),
            self.timeouts.read,
        )
        .await?;
        Ok(normalize_verify(unwrap_result(&raw))?)
    }

    async fn settle(
        &self,
        ctx: &AdapterContext,
        req: &SettleRequest,
    ) -> Result<SettleOutcome, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/settle");

        let raw = send_json(
            self.client
                .post(&url)
                .header(SECRET_HEADER, &credentials.wallet_secret)
                .json(req),
            self.timeouts.settle,
        )
        .await?;
        Ok(normalize_settle(unwrap_result(&raw))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_result_envelope_when_present() {
        let wrapped = json!({"result": {"isValid": true}});
        assert_eq!(unwrap_result(&wrapped), &json!({"isValid": true}));

        let bare = json!({"isValid": false});
        assert_eq!(unwrap_result(&bare), &bare);
    }
}
