use crate::domain::connection::{CapabilityStatus, Connection, ConnectionSummary, Provider};
use crate::domain::x402::SupportedResponse;
use crate::routing::eligibility::CandidateConnection;
use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct ConnectionsRepo {
    pub pool: PgPool,
}

fn parse_provider(raw: &str) -> anyhow::Result<Provider> {
    Provider::parse(raw).with_context(|| format!("unknown provider '{}'", raw))
}

impl ConnectionsRepo {
    pub async fn list(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ConnectionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.provider, c.enabled,
                   cap.status, cap.last_checked_at, cap.latency_p50_ms, cap.latency_p95_ms
            FROM facilitator_connections c
            LEFT JOIN facilitator_capabilities cap ON cap.connection_id = c.id
            WHERE c.tenant_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(ConnectionSummary {
                    id: r.get("id"),
                    name: r.get("name"),
                    provider: parse_provider(r.get("provider"))?,
                    enabled: r.get("enabled"),
                    status: r
                        .get::<Option<String>, _>("status")
                        .map(|s| CapabilityStatus::parse(&s))
                        .unwrap_or(CapabilityStatus::Unknown),
                    last_checked_at: r.get("last_checked_at"),
                    latency_p50_ms: r.get("latency_p50_ms"),
                    latency_p95_ms: r.get("latency_p95_ms"),
                })
            })
            .collect()
    }

    /// Enabled connections with their latest capability, in creation
    /// order. The eligibility filter runs over this set in memory.
    pub async fn list_enabled_with_capability(
        &self,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<CandidateConnection>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.provider, c.credentials_enc,
                   cap.status, cap.supported_json
            FROM facilitator_connections c
            LEFT JOIN facilitator_capabilities cap ON cap.connection_id = c.id
            WHERE c.tenant_id = $1 AND c.enabled = true
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let supported = r
                    .get::<Option<serde_json::Value>, _>("supported_json")
                    .and_then(|v| serde_json::from_value::<SupportedResponse>(v).ok());
                Ok(CandidateConnection {
                    id: r.get("id"),
                    name: r.get("name"),
                    provider: parse_provider(r.get("provider"))?,
                    credentials_enc: r.get("credentials_enc"),
                    capability_status: r
                        .get::<Option<String>, _>("status")
                        .map(|s| CapabilityStatus::parse(&s))
                        .unwrap_or(CapabilityStatus::Unknown),
                    supported,
                })
            })
            .collect()
    }

    pub async fn find(
        &self,
        tenant_id: Uuid,
        connection_id: Uuid,
    ) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, provider, name, enabled, credentials_enc
            FROM facilitator_connections
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_connection).transpose()
    }

    /// Lookup by id alone: sticky settlement routing and reconciliation
    /// must reach the bound connection even after it is disabled.
    pub async fn find_by_id(&self, connection_id: Uuid) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, provider, name, enabled, credentials_enc
            FROM facilitator_connections
            WHERE id = $1
            "#,
        )
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_connection).transpose()
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        provider: Provider,
        name: &str,
        enabled: bool,
        credentials_enc: serde_json::Value,
    ) -> anyhow::Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO facilitator_connections (tenant_id, provider, name, enabled, credentials_enc)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(provider.as_str())
        .bind(name)
        .bind(enabled)
        .bind(credentials_enc)
        .fetch_one(tx.as_mut())
        .await?;

        let connection_id: Uuid = row.get("id");

        sqlx::query(
            r#"
            INSERT INTO facilitator_capabilities (connection_id, supported_json, status)
            VALUES ($1, '{}'::jsonb, 'unknown')
            ON CONFLICT (connection_id) DO NOTHING
            "#,
        )
        .bind(connection_id)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(connection_id)
    }

    pub async fn set_enabled(
        &self,
        tenant_id: Uuid,
        connection_id: Uuid,
        enabled: bool,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE facilitator_connections SET enabled = $3, updated_at = now() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(connection_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn record_capability_ok(
        &self,
        connection_id: Uuid,
        supported_json: serde_json::Value,
        latency_ms: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO facilitator_capabilities
                (connection_id, supported_json, status, last_checked_at, latency_p50_ms, latency_p95_ms)
            VALUES ($1, $2, 'ok', now(), $3, $3)
            ON CONFLICT (connection_id) DO UPDATE SET
                supported_json = EXCLUDED.supported_json,
                status = 'ok',
                last_checked_at = now(),
                latency_p50_ms = EXCLUDED.latency_p50_ms,
                latency_p95_ms = EXCLUDED.latency_p95_ms
            "#,
        )
        .bind(connection_id)
        .bind(supported_json)
        .bind(latency_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A failed check flips status but keeps the last good capability set.
    pub async fn record_capability_error(&self, connection_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO facilitator_capabilities (connection_id, supported_json, status, last_checked_at)
            VALUES ($1, '{}'::jsonb, 'error', now())
            ON CONFLICT (connection_id) DO UPDATE SET
                status = 'error',
                last_checked_at = now()
            "#,
        )
        .bind(connection_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_enabled_all(&self) -> anyhow::Result<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query(
            "SELECT tenant_id, id FROM facilitator_connections WHERE enabled = true ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("tenant_id"), r.get("id")))
            .collect())
    }
}

fn row_to_connection(r: sqlx::postgres::PgRow) -> anyhow::Result<Connection> {
    Ok(Connection {
        id: r.get("id"),
        tenant_id: r.get("tenant_id"),
        provider: parse_provider(r.get("provider"))?,
        name: r.get("name"),
        enabled: r.get("enabled"),
        credentials_enc: r.get("credentials_enc"),
    })
}
