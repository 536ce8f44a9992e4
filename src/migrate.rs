use anyhow::Result;
use sqlx::SqlitePool;

/// Create all catalog tables. Idempotent — safe to run on every open.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    // Source records. Connection specs are stored as JSON with secrets
    // already stripped; credentials live only in the secrets table.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            owners_json TEXT NOT NULL DEFAULT '[]',
            tags_json TEXT NOT NULL DEFAULT '[]',
            connection_json TEXT NOT NULL,
            fingerprint TEXT NOT NULL UNIQUE,
            connection_status TEXT NOT NULL,
            crawl_status TEXT NOT NULL,
            last_error_json TEXT,
            last_connected_at INTEGER,
            last_crawl_at INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS secrets (
            source_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (source_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One snapshot per source, replaced wholesale on each crawl.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_snapshots (
            source_id TEXT PRIMARY KEY,
            snapshot_json TEXT NOT NULL,
            crawled_at INTEGER NOT NULL,
            FOREIGN KEY (source_id) REFERENCES sources(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_kind ON sources(kind)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_crawl_status ON sources(crawl_status)")
        .execute(pool)
        .await?;

    Ok(())
}
