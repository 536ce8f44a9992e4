//! Credential storage, keyed by `(source_id, key)`.
//!
//! Secrets are written during provisioning, merged back into connection
//! configs by [`resolve_connection`](crate::adapter::resolve_connection),
//! and deleted as a unit on rollback or source removal. They are never
//! copied into the catalog's source rows.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::CoreError;
use crate::models::SecretKey;

/// Key/value store for credential fragments. The trait is the seam where
/// an OS-keychain-backed implementation would plug in.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn store(&self, source_id: &str, key: SecretKey, value: &str) -> Result<(), CoreError>;

    async fn retrieve(&self, source_id: &str, key: SecretKey)
        -> Result<Option<String>, CoreError>;

    /// Remove every secret for a source. Used by rollback and removal;
    /// deleting a source with no secrets is a no-op.
    async fn delete_all(&self, source_id: &str) -> Result<(), CoreError>;
}

/// SQLite-backed secret store sharing the catalog pool.
pub struct SqliteSecretStore {
    pool: SqlitePool,
}

impl SqliteSecretStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
    async fn store(&self, source_id: &str, key: SecretKey, value: &str) -> Result<(), CoreError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO secrets (source_id, key, value, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(source_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source_id)
        .bind(key.as_str())
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn retrieve(
        &self,
        source_id: &str,
        key: SecretKey,
    ) -> Result<Option<String>, CoreError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM secrets WHERE source_id = ? AND key = ?")
                .bind(source_id)
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    async fn delete_all(&self, source_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM secrets WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
