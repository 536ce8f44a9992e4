//! The catalog store: persistent source records and their schema
//! snapshots.
//!
//! All writes are row-granular; the snapshot write is transactional with
//! its `crawled` status transition so a reader never observes a snapshot
//! paired with a stale status (or the reverse). Status strings in storage
//! always round-trip through the tagged unions in [`crate::status`].

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::CoreError;
use crate::models::{SchemaSnapshot, Source, SourceError};
use crate::status::{ConnectionStatus, CrawlStatus};

pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─── Lookups ────────────────────────────────────────────────────

    pub async fn find_source(&self, id: &str) -> Result<Option<Source>, CoreError> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_source).transpose()
    }

    pub async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Source>, CoreError> {
        let row = sqlx::query("SELECT * FROM sources WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_source).transpose()
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, CoreError> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_source).collect()
    }

    pub async fn list_source_ids(&self) -> Result<Vec<String>, CoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM sources ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    // ─── Creation & Removal ─────────────────────────────────────────

    /// Insert a new source row. A fingerprint collision (the UNIQUE
    /// constraint acting as concurrent backstop behind the service-level
    /// duplicate check) maps to a `Validation` error.
    pub async fn insert_source(&self, source: &Source) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sources (
                id, kind, name, description, owners_json, tags_json,
                connection_json, fingerprint, connection_status, crawl_status,
                last_error_json, last_connected_at, last_crawl_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.id)
        .bind(source.kind().as_str())
        .bind(&source.name)
        .bind(&source.description)
        .bind(serde_json::to_string(&source.owners)?)
        .bind(serde_json::to_string(&source.tags)?)
        .bind(serde_json::to_string(&source.connection)?)
        .bind(&source.fingerprint)
        .bind(source.connection_status.as_str())
        .bind(source.crawl_status.as_str())
        .bind(
            source
                .last_error
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(source.last_connected_at.map(|t| t.timestamp()))
        .bind(source.last_crawl_at.map(|t| t.timestamp()))
        .bind(source.created_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(CoreError::Validation {
                    message: format!(
                        "a source with the same connection already exists (fingerprint {})",
                        &source.fingerprint[..12.min(source.fingerprint.len())]
                    ),
                    existing_id: None,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a source row and its snapshot in one transaction. Deleting
    /// an id that does not exist is a no-op — rollback relies on that.
    pub async fn delete_source(&self, id: &str) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM schema_snapshots WHERE source_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Status Writes ──────────────────────────────────────────────

    /// Persist a connection status transition. `connected` clears the last
    /// error and stamps `last_connected_at`; `error` records the failure.
    /// Updating a missing row is a no-op.
    pub async fn update_connection_status(
        &self,
        id: &str,
        status: ConnectionStatus,
        error: Option<&SourceError>,
    ) -> Result<(), CoreError> {
        match status {
            ConnectionStatus::Connected => {
                sqlx::query(
                    r#"
                    UPDATE sources
                    SET connection_status = ?, last_error_json = NULL, last_connected_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(status.as_str())
                .bind(Utc::now().timestamp())
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            ConnectionStatus::Error => {
                sqlx::query(
                    "UPDATE sources SET connection_status = ?, last_error_json = ? WHERE id = ?",
                )
                .bind(status.as_str())
                .bind(error.map(serde_json::to_string).transpose()?)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            ConnectionStatus::Unknown | ConnectionStatus::Checking => {
                sqlx::query("UPDATE sources SET connection_status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    /// Persist a crawl status transition. The `crawled` transition goes
    /// through [`persist_snapshot`](Catalog::persist_snapshot) instead so
    /// the snapshot and the status land atomically.
    pub async fn update_crawl_status(
        &self,
        id: &str,
        status: CrawlStatus,
        error: Option<&SourceError>,
    ) -> Result<(), CoreError> {
        match status {
            CrawlStatus::Error => {
                sqlx::query(
                    "UPDATE sources SET crawl_status = ?, last_error_json = ? WHERE id = ?",
                )
                .bind(status.as_str())
                .bind(error.map(serde_json::to_string).transpose()?)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            CrawlStatus::NotCrawled | CrawlStatus::Crawling | CrawlStatus::Crawled => {
                sqlx::query("UPDATE sources SET crawl_status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    // ─── Snapshots ──────────────────────────────────────────────────

    /// Replace the source's snapshot and mark it `crawled` in a single
    /// transaction: stamps `last_crawl_at`, clears `last_error`.
    pub async fn persist_snapshot(
        &self,
        id: &str,
        snapshot: &SchemaSnapshot,
    ) -> Result<(), CoreError> {
        let snapshot_json = serde_json::to_string(snapshot)?;
        let crawled_at = snapshot.crawled_at.timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO schema_snapshots (source_id, snapshot_json, crawled_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                snapshot_json = excluded.snapshot_json,
                crawled_at = excluded.crawled_at
            "#,
        )
        .bind(id)
        .bind(&snapshot_json)
        .bind(crawled_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE sources
            SET crawl_status = ?, last_crawl_at = ?, last_error_json = NULL
            WHERE id = ?
            "#,
        )
        .bind(CrawlStatus::Crawled.as_str())
        .bind(crawled_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn load_snapshot(&self, id: &str) -> Result<Option<SchemaSnapshot>, CoreError> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT snapshot_json FROM schema_snapshots WHERE source_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        json.map(|j| serde_json::from_str(&j).map_err(CoreError::from))
            .transpose()
    }
}

// ─── Row Mapping ────────────────────────────────────────────────────

fn row_to_source(row: SqliteRow) -> Result<Source, CoreError> {
    let connection_json: String = row.try_get("connection_json")?;
    let owners_json: String = row.try_get("owners_json")?;
    let tags_json: String = row.try_get("tags_json")?;
    let last_error_json: Option<String> = row.try_get("last_error_json")?;

    let connection_status: String = row.try_get("connection_status")?;
    let connection_status = ConnectionStatus::parse(&connection_status).ok_or_else(|| {
        CoreError::Internal(format!(
            "corrupt connection status in catalog: {}",
            connection_status
        ))
    })?;

    let crawl_status: String = row.try_get("crawl_status")?;
    let crawl_status = CrawlStatus::parse(&crawl_status).ok_or_else(|| {
        CoreError::Internal(format!("corrupt crawl status in catalog: {}", crawl_status))
    })?;

    let last_connected_at: Option<i64> = row.try_get("last_connected_at")?;
    let last_crawl_at: Option<i64> = row.try_get("last_crawl_at")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(Source {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        owners: serde_json::from_str(&owners_json)?,
        tags: serde_json::from_str(&tags_json)?,
        connection: serde_json::from_str(&connection_json)?,
        fingerprint: row.try_get("fingerprint")?,
        connection_status,
        crawl_status,
        last_error: last_error_json
            .map(|j| serde_json::from_str::<SourceError>(&j))
            .transpose()?,
        last_connected_at: last_connected_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        last_crawl_at: last_crawl_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}
