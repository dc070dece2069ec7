use crate::crypto::{CredentialCipher, EncryptedPayload};
use crate::domain::settlement::SettlementStatus;
use crate::domain::x402::SettleRequest;
use crate::facilitators::{AdapterContext, AdapterRegistry};
use crate::repo::connections_repo::ConnectionsRepo;
use crate::repo::settlements_repo::SettlementsRepo;
use serde::Serialize;
use uuid::Uuid;

const SWEEP_BATCH: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileResult {
    Settled,
    Failed,
    Unknown,
    Skipped,
    Missing,
    Invalid,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub settled: usize,
    pub failed: usize,
    pub still_unknown: usize,
}

/// Re-drives settlements stuck at `unknown` through their bound adapter,
/// replaying the stored request. Safe to invoke redundantly: only rows
/// still `unknown` are transitioned, and status is re-checked before each
/// dispatch.
#[derive(Clone)]
pub struct Reconciler {
    pub settlements_repo: SettlementsRepo,
    pub connections_repo: ConnectionsRepo,
    pub adapters: AdapterRegistry,
    pub cipher: CredentialCipher,
    pub settle_timeout: std::time::Duration,
}

impl Reconciler {
    pub async fn run(self, interval: std::time::Duration) {
        loop {
            tokio::time::sleep(interval).await;
            match self.sweep().await {
                Ok(stats) => {
                    if stats.scanned > 0 {
                        tracing::info!(
                            scanned = stats.scanned,
                            settled = stats.settled,
                            failed = stats.failed,
                            still_unknown = stats.still_unknown,
                            "reconciliation sweep complete"
                        );
                    }
                }
                Err(err) => tracing::error!(error = %err, "reconciliation sweep error"),
            }
        }
    }

    pub async fn sweep(&self) -> anyhow::Result<SweepStats> {
        let pending = self.settlements_repo.list_unknown(SWEEP_BATCH).await?;
        let mut stats = SweepStats {
            scanned: pending.len(),
            ..Default::default()
        };

        for (tenant_id, fp) in pending {
            match self.reconcile_one(tenant_id, &fp).await {
                Ok(ReconcileResult::Settled) => stats.settled += 1,
                Ok(ReconcileResult::Failed) => stats.failed += 1,
                Ok(ReconcileResult::Unknown) => stats.still_unknown += 1,
                Ok(_) => {}
                Err(err) => {
                    stats.still_unknown += 1;
                    tracing::warn!(tenant = %tenant_id, fingerprint = %fp, error = %err, "reconcile error");
                }
            }
        }

        Ok(stats)
    }

    pub async fn reconcile_one(
        &self,
        tenant_id: Uuid,
        fp: &str,
    ) -> anyhow::Result<ReconcileResult> {
        let row = match self.settlements_repo.find(tenant_id, fp).await? {
            Some(row) => row,
            None => {
                tracing::warn!(tenant = %tenant_id, fingerprint = %fp, "settlement state missing");
                return Ok(ReconcileResult::Missing);
            }
        };

        // re-check before acting: another reconciler or a client retry may
        // have resolved the row since it was listed
        if row.status != SettlementStatus::Unknown {
            return Ok(ReconcileResult::Skipped);
        }

        let connection_id = match row.connection_id {
            Some(id) => id,
            None => {
                self.settlements_repo
                    .mark_failed_orphan(tenant_id, fp, "no bound connection")
                    .await?;
                return Ok(ReconcileResult::Failed);
            }
        };

        let connection = match self.connections_repo.find_by_id(connection_id).await? {
            Some(connection) => connection,
            None => {
                self.settlements_repo
                    .mark_failed_orphan(tenant_id, fp, "bound connection deleted")
                    .await?;
                return Ok(ReconcileResult::Failed);
            }
        };

        let request_enc = match &row.request_enc {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(tenant = %tenant_id, fingerprint = %fp, "settlement payload missing");
                return Ok(ReconcileResult::Invalid);
            }
        };

        let req: SettleRequest = {
            let payload = EncryptedPayload::from_json(&request_enc)?;
            let decrypted = self.cipher.decrypt(tenant_id, &payload)?;
            match serde_json::from_value(decrypted) {
                Ok(req) => req,
                Err(err) => {
                    tracing::warn!(tenant = %tenant_id, fingerprint = %fp, error = %err, "settlement payload invalid");
                    return Ok(ReconcileResult::Invalid);
                }
            }
        };

        let payload = EncryptedPayload::from_json(&connection.credentials_enc)?;
        let credentials = self.cipher.decrypt(tenant_id, &payload)?;
        let ctx = AdapterContext {
            tenant_id,
            connection_id: connection.id,
            provider: connection.provider,
            credentials,
        };

        let adapter = self.adapters.get(connection.provider);
        let outcome =
            match tokio::time::timeout(self.settle_timeout, adapter.settle(&ctx, &req)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    tracing::warn!(
                        tenant = %tenant_id,
                        fingerprint = %fp,
                        provider = connection.provider.as_str(),
                        error = %err,
                        "reconcile dispatch failed, will retry later"
                    );
                    return Ok(ReconcileResult::Unknown);
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        tenant = %tenant_id,
                        fingerprint = %fp,
                        provider = connection.provider.as_str(),
                        "reconcile dispatch timed out, will retry later"
                    );
                    return Ok(ReconcileResult::Unknown);
                }
            };

        let applied = self
            .settlements_repo
            .record_reconcile_outcome(tenant_id, fp, &outcome)
            .await?;
        if !applied {
            // lost to a concurrent transition; that writer owns the result
            return Ok(ReconcileResult::Skipped);
        }

        Ok(if outcome.success {
            ReconcileResult::Settled
        } else {
            ReconcileResult::Failed
        })
    }
}
