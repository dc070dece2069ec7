use crate::domain::connection::Provider;
use crate::domain::x402::{SchemeSupport, SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::facilitators::client::{build_url, send_json, send_json_with_retry, send_ok};
use crate::facilitators::normalize::{normalize_settle, normalize_supported, normalize_verify};
use crate::facilitators::{AdapterContext, AdapterError, AdapterTimeouts, FacilitatorAdapter};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://v1.facilitator.mogami.tech";
const DEFAULT_SCHEME: &str = "exact";
const DEFAULT_NETWORK: &str = "base-sepolia";

#[derive(Debug, Default, Deserialize)]
struct MogamiCredentials {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
}

pub struct MogamiAdapter {
    client: reqwest::Client,
    timeouts: AdapterTimeouts,
}

impl MogamiAdapter {
    pub fn new(client: reqwest::Client, timeouts: AdapterTimeouts) -> Self {
        Self { client, timeouts }
    }

    fn base_url(ctx: &AdapterContext) -> Result<String, AdapterError> {
        let credentials: MogamiCredentials = serde_json::from_value(ctx.credentials.clone())
            .map_err(|e| AdapterError::Credentials {
                provider: "mogami",
                detail: e.to_string(),
            })?;
        Ok(credentials
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }
}

#[async_trait::async_trait]
impl FacilitatorAdapter for MogamiAdapter {
    fn provider(&self) -> Provider {
        Provider::Mogami
    }

    async fn supported(&self, ctx: &AdapterContext) -> Result<SupportedResponse, AdapterError> {
        let base_url = Self::base_url(ctx)?;

        let first_attempt = match send_json(
            self.client.get(build_url(&base_url, "/supported")),
            self.timeouts.read,
        )
        .await
        {
            Ok(raw) => normalize_supported(&raw).map_err(AdapterError::from),
            Err(err) => Err(err),
        };

        match first_attempt {
            Ok(supported) => Ok(supported),
            Err(_) => {
                // older deployments only expose a liveness-style /support
                // probe and publish a fixed capability set
                send_ok(
                    self.client.get(build_url(&base_url, "/support")),
                    self.timeouts.read,
                )
                .await?;

                Ok(SupportedResponse {
                    schemes: vec![SchemeSupport {
                        scheme: DEFAULT_SCHEME.to_string(),
                        networks: vec![DEFAULT_NETWORK.to_string()],
                    }],
                })
            }
        }
    }

    async fn verify(
        &self,
        ctx: &AdapterContext,
        req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError> {
        let base_url = Self::base_url(ctx)?;
        let raw = send_json_with_retry(
            self.client.post(build_url(&base_url, "/verify")).json(req),
            self.timeouts.read,
        )
        .await?;
        Ok(normalize_verify(&raw)?)
    }

    async fn settle(
        &self,
        ctx: &AdapterContext,
        req: &SettleRequest,
    ) -> Result<SettleOutcome, AdapterError> {
        let base_url = Self::base_url(ctx)?;
        let raw = send_json(
            self.client.post(build_url(&base_url, "/settle")).json(req),
            self.timeouts.settle,
        )
        .await?;
        Ok(normalize_settle(&raw)?)
    }
}
