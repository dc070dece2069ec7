use crate::crypto::{CredentialCipher, EncryptedPayload};
use crate::domain::connection::{CapabilityStatus, Connection};
use crate::error::ApiError;
use crate::facilitators::{AdapterContext, AdapterRegistry};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityCheck {
    pub status: &'static str,
    pub latency_ms: i32,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RefreshSummary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
}

/// Refreshes what each connection last reported as supported. Invoked per
/// connection from the management API and in bulk by the periodic sweep;
/// redundant invocations are harmless.
#[derive(Clone)]
pub struct CapabilityService {
    pub connections_repo: crate::repo::connections_repo::ConnectionsRepo,
    pub adapters: AdapterRegistry,
    pub cipher: CredentialCipher,
}

impl CapabilityService {
    pub async fn test_connection(
        &self,
        tenant_id: Uuid,
        connection_id: Uuid,
    ) -> Result<CapabilityCheck, ApiError> {
        let connection = self
            .connections_repo
            .find(tenant_id, connection_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::NotFound)?;

        match self.probe(&connection).await {
            Ok(check) => Ok(check),
            Err(err) => {
                self.connections_repo
                    .record_capability_error(connection.id)
                    .await
                    .map_err(ApiError::Internal)?;
                tracing::warn!(
                    tenant = %tenant_id,
                    connection = %connection.id,
                    provider = connection.provider.as_str(),
                    error = %err,
                    "capability check failed"
                );
                Ok(CapabilityCheck {
                    status: CapabilityStatus::Error.as_str(),
                    latency_ms: 0,
                })
            }
        }
    }

    async fn probe(&self, connection: &Connection) -> anyhow::Result<CapabilityCheck> {
        let payload = EncryptedPayload::from_json(&connection.credentials_enc)?;
        let credentials = self.cipher.decrypt(connection.tenant_id, &payload)?;

        let ctx = AdapterContext {
            tenant_id: connection.tenant_id,
            connection_id: connection.id,
            provider: connection.provider,
            credentials,
        };

        let adapter = self.adapters.get(connection.provider);
        let started = Instant::now();
        let supported = adapter.supported(&ctx).await?;
        let latency_ms = started.elapsed().as_millis() as i32;

        self.connections_repo
            .record_capability_ok(connection.id, serde_json::to_value(&supported)?, latency_ms)
            .await?;

        Ok(CapabilityCheck {
            status: CapabilityStatus::Ok.as_str(),
            latency_ms,
        })
    }

    /// Sweep every enabled connection. Failures degrade that connection's
    /// capability to `error` and keep going.
    pub async fn refresh_all(&self) -> anyhow::Result<RefreshSummary> {
        let connections = self.connections_repo.list_enabled_all().await?;
        let mut summary = RefreshSummary {
            total: connections.len(),
            ..Default::default()
        };

        for (tenant_id, connection_id) in connections {
            match self.test_connection(tenant_id, connection_id).await {
                Ok(check) if check.status == "ok" => summary.ok += 1,
                Ok(_) => summary.failed += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        tenant = %tenant_id,
                        connection = %connection_id,
                        error = %err,
                        "capability refresh failed"
                    );
                }
            }
        }

        Ok(summary)
    }

    pub async fn run(self, interval: std::time::Duration) {
        loop {
            tokio::time::sleep(interval).await;
            match self.refresh_all().await {
                Ok(summary) => tracing::info!(
                    total = summary.total,
                    ok = summary.ok,
                    failed = summary.failed,
                    "capability refresh sweep complete"
                ),
                Err(err) => tracing::error!(error = %err, "capability refresh sweep error"),
            }
        }
    }
}
