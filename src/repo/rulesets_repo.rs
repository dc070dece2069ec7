use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredRuleset {
    pub version: i32,
    pub document: String,
}

#[derive(Clone)]
pub struct RulesetsRepo {
    pub pool: PgPool,
}

impl RulesetsRepo {
    pub async fn load_active(&self, tenant_id: Uuid) -> anyhow::Result<Option<StoredRuleset>> {
        let row = sqlx::query(
            r#"
            SELECT version, document
            FROM routing_rulesets
            WHERE tenant_id = $1 AND enabled = true
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredRuleset {
            version: r.get("version"),
            document: r.get("document"),
        }))
    }

    /// Deactivate-then-activate as one atomic unit: every prior version is
    /// disabled and the next version inserted in a single transaction. A
    /// partial unique index on `(tenant_id) WHERE enabled` backstops the
    /// single-active invariant against concurrent activations.
    pub async fn activate(&self, tenant_id: Uuid, document: &str) -> anyhow::Result<i32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE routing_rulesets SET enabled = false, updated_at = now() WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(tx.as_mut())
            .await?;

        let row = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) AS latest FROM routing_rulesets WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(tx.as_mut())
        .await?;
        let next_version: i32 = row.get::<i32, _>("latest") + 1;

        sqlx::query(
            r#"
            INSERT INTO routing_rulesets (tenant_id, version, document, enabled)
            VALUES ($1, $2, $3, true)
            "#,
        )
        .bind(tenant_id)
        .bind(next_version)
        .bind(document.trim())
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(next_version)
    }
}
