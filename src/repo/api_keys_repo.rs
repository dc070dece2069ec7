use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key_hash: String,
}

#[derive(Clone)]
pub struct ApiKeysRepo {
    pub pool: PgPool,
}

impl ApiKeysRepo {
    pub async fn find_active_by_hash(
        &self,
        key_hash: &str,
    ) -> anyhow::Result<Option<ApiKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, key_hash
            FROM api_keys
            WHERE key_hash = $1 AND revoked_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ApiKeyRecord {
            id: r.get("id"),
            tenant_id: r.get("tenant_id"),
            key_hash: r.get("key_hash"),
        }))
    }

    pub async fn touch_last_used(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
