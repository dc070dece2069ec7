use crate::domain::decision::{DecisionRecord, DecisionView};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct DecisionsRepo {
    pub pool: PgPool,
}

impl DecisionsRepo {
    pub async fn insert(&self, record: &DecisionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO routing_decisions (
                tenant_id, request_id, endpoint, connection_id,
                rule_name, fingerprint, latency_ms, ok, error_code
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.tenant_id)
        .bind(&record.request_id)
        .bind(record.endpoint.as_str())
        .bind(record.connection_id)
        .bind(record.rule_name.as_deref())
        .bind(record.fingerprint.as_deref())
        .bind(record.latency_ms)
        .bind(record.ok)
        .bind(record.error_code.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_recent(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<DecisionView>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, endpoint, connection_id, rule_name, fingerprint,
                   latency_ms, ok, error_code, created_at
            FROM routing_decisions
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DecisionView {
                request_id: r.get("request_id"),
                endpoint: r.get("endpoint"),
                connection_id: r.get("connection_id"),
                rule_name: r.get("rule_name"),
                fingerprint: r.get("fingerprint"),
                latency_ms: r.get("latency_ms"),
                ok: r.get("ok"),
                error_code: r.get("error_code"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
