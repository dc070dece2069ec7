use crate::domain::settlement::{SettlementRow, SettlementStatus};
use crate::domain::x402::SettleOutcome;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct SettlementsRepo {
    pub pool: PgPool,
}

impl SettlementsRepo {
    pub async fn find(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
    ) -> anyhow::Result<Option<SettlementRow>> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, fingerprint, connection_id, status,
                   payer, tx_hash, network, error_reason, request_enc, updated_at
            FROM settlement_state
            WHERE tenant_id = $1 AND fingerprint = $2
            "#,
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SettlementRow {
            tenant_id: r.get("tenant_id"),
            fingerprint: r.get("fingerprint"),
            connection_id: r.get("connection_id"),
            status: SettlementStatus::parse(r.get("status")),
            payer: r.get("payer"),
            tx_hash: r.get("tx_hash"),
            network: r.get("network"),
            error_reason: r.get("error_reason"),
            request_enc: r.get("request_enc"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Insert-if-absent. Returns false when a concurrent inserter won the
    /// race; the caller re-reads and adopts the winner's binding.
    pub async fn try_insert_pending(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
        connection_id: Uuid,
        request_enc: serde_json::Value,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlement_state (tenant_id, fingerprint, connection_id, status, request_enc, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, now())
            ON CONFLICT (tenant_id, fingerprint) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .bind(connection_id)
        .bind(request_enc)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// A timed-out or failed dispatch leaves the row `unknown`, never a
    /// terminal status. Guarded so a terminal row is never demoted.
    pub async fn mark_unknown(&self, tenant_id: Uuid, fingerprint: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE settlement_state SET status = 'unknown', updated_at = now()
            WHERE tenant_id = $1 AND fingerprint = $2 AND status IN ('pending', 'unknown')
            "#,
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Terminal transition from the request path. The encrypted replay
    /// payload is erased once the outcome is known.
    pub async fn record_outcome(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
        outcome: &SettleOutcome,
    ) -> anyhow::Result<()> {
        self.record_terminal(tenant_id, fingerprint, outcome, &["pending", "unknown"])
            .await
            .map(|_| ())
    }

    /// Terminal transition from reconciliation: only rows still `unknown`
    /// may move, which is the fingerprint-scoped mutual exclusion.
    pub async fn record_reconcile_outcome(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
        outcome: &SettleOutcome,
    ) -> anyhow::Result<bool> {
        let updated = self
            .record_terminal(tenant_id, fingerprint, outcome, &["unknown"])
            .await?;
        Ok(updated)
    }

    async fn record_terminal(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
        outcome: &SettleOutcome,
        from_statuses: &[&str],
    ) -> anyhow::Result<bool> {
        let status = if outcome.success {
            SettlementStatus::Settled
        } else {
            SettlementStatus::Failed
        };
        let result = sqlx::query(
            r#"
            UPDATE settlement_state SET
                status = $3,
                payer = $4,
                tx_hash = $5,
                network = $6,
                error_reason = $7,
                request_enc = NULL,
                updated_at = now()
            WHERE tenant_id = $1 AND fingerprint = $2 AND status = ANY($8)
            "#,
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .bind(status.as_str())
        .bind(outcome.payer.as_deref())
        .bind(outcome.tx_hash.as_deref())
        .bind(outcome.network.as_deref())
        .bind(outcome.error_reason.as_deref())
        .bind(from_statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reconciliation dead end (bound connection deleted): close the row
    /// out rather than retrying forever.
    pub async fn mark_failed_orphan(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
        reason: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE settlement_state SET
                status = 'failed', error_reason = $3, request_enc = NULL, updated_at = now()
            WHERE tenant_id = $1 AND fingerprint = $2 AND status = 'unknown'
            "#,
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_unknown(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, fingerprint
            FROM settlement_state
            WHERE status = 'unknown'
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("tenant_id"), r.get("fingerprint")))
            .collect())
    }
}
