use crate::domain::connection::Provider;
use crate::domain::x402::{SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::facilitators::normalize::NormalizeError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod cdp;
pub mod client;
pub mod mock;
pub mod mogami;
pub mod normalize;
pub mod thirdweb;

/// Per-call context handed to an adapter: which connection is speaking,
/// with its decrypted credential blob.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub tenant_id: Uuid,
    pub connection_id: Uuid,
    pub provider: Provider,
    pub credentials: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid {provider} credentials: {detail}")]
    Credentials { provider: &'static str, detail: String },
    #[error("network error calling upstream: {0}")]
    Network(String),
    #[error("upstream call timed out")]
    Timeout,
    #[error("upstream error ({0})")]
    UpstreamStatus(u16),
    #[error("upstream returned invalid JSON")]
    InvalidJson,
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl AdapterError {
    /// Transport-level failures: the only class eligible for the single
    /// retry on idempotent calls.
    pub fn is_network(&self) -> bool {
        matches!(self, AdapterError::Network(_) | AdapterError::Timeout)
    }
}

#[async_trait::async_trait]
pub trait FacilitatorAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn supported(&self, ctx: &AdapterContext) -> Result<SupportedResponse, AdapterError>;

    async fn verify(
        &self,
        ctx: &AdapterContext,
        req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError>;

    async fn settle(
        &self,
        ctx: &AdapterContext,
        req: &SettleRequest,
    ) -> Result<SettleOutcome, AdapterError>;
}

/// Adapter call timeouts. Settle is much longer than the read paths and is
/// never retried at this layer.
#[derive(Debug, Clone, Copy)]
pub struct AdapterTimeouts {
    pub read: Duration,
    pub settle: Duration,
}

impl AdapterTimeouts {
    pub fn from_millis(read_ms: u64, settle_ms: u64) -> Self {
        Self {
            read: Duration::from_millis(read_ms),
            settle: Duration::from_millis(settle_ms),
        }
    }
}

#[derive(Clone)]
pub struct AdapterRegistry {
    cdp: Arc<cdp::CdpAdapter>,
    thirdweb: Arc<thirdweb::ThirdwebAdapter>,
    mogami: Arc<mogami::MogamiAdapter>,
    mock: Arc<mock::MockAdapter>,
}

impl AdapterRegistry {
    pub fn new(client: reqwest::Client, timeouts: AdapterTimeouts) -> Self {
        Self {
            cdp: Arc::new(cdp::CdpAdapter::new(client.clone(), timeouts)),
            thirdweb: Arc::new(thirdweb::ThirdwebAdapter::new(client.clone(), timeouts)),
            mogami: Arc::new(mogami::MogamiAdapter::new(client, timeouts)),
            mock: Arc::new(mock::MockAdapter::default()),
        }
    }

    pub fn get(&self, provider: Provider) -> Arc<dyn FacilitatorAdapter> {
        match provider {
            Provider::Cdp => self.cdp.clone(),
            Provider::Thirdweb => self.thirdweb.clone(),
            Provider::Mogami => self.mogami.clone(),
            Provider::Mock => self.mock.clone(),
        }
    }
}
