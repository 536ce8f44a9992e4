//! Adapter for embedded analytical files (SQLite databases on disk).
//!
//! Schema comes from `sqlite_master` plus `PRAGMA table_info`; profiling
//! runs COUNT/COUNT DISTINCT/null-count aggregates per column with a
//! handful of sampled values. Virtual tables (FTS and friends) are skipped
//! with an `error`-level warning — the crawl itself carries on.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::adapter::{CrawlPart, ProfileDepth, SourceAdapter};
use crate::error::CoreError;
use crate::models::{
    ColumnProfile, ColumnSchema, CrawlWarning, ProfileReport, SchemaGraph, TableProfile,
    TableSchema, WarningLevel,
};

/// Number of rows a sampled profile inspects per table.
const SAMPLE_ROW_LIMIT: i64 = 1000;

pub struct SqliteFileAdapter {
    pool: SqlitePool,
    sample_values: usize,
}

impl SqliteFileAdapter {
    /// Open an existing database file read-only. A missing file is a
    /// health failure, not an invitation to create one.
    pub async fn open(path: &Path, sample_values: usize) -> Result<Self, CoreError> {
        if !path.is_file() {
            return Err(CoreError::Internal(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(CoreError::internal)?
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| CoreError::Internal(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            pool,
            sample_values,
        })
    }
}

#[async_trait]
impl SourceAdapter for SqliteFileAdapter {
    async fn health_check(&self) -> Result<(), CoreError> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    async fn crawl_schema(&self) -> Result<CrawlPart<SchemaGraph>, CoreError> {
        let mut warnings = Vec::new();
        let mut tables = Vec::new();

        let rows = sqlx::query(
            r#"
            SELECT name, sql FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let name: String = row.try_get("name")?;
            let sql: Option<String> = row.try_get("sql")?;

            // Virtual tables answer PRAGMA table_info but their storage
            // shape is module-defined; skip with a loud warning.
            if sql
                .as_deref()
                .is_some_and(|s| s.trim_start().to_uppercase().starts_with("CREATE VIRTUAL"))
            {
                warnings.push(CrawlWarning {
                    level: WarningLevel::Error,
                    feature: "virtual-table".into(),
                    message: format!("skipped virtual table '{}'", name),
                });
                continue;
            }

            let columns = self.table_columns(&name).await?;
            if columns.is_empty() {
                warnings.push(CrawlWarning {
                    level: WarningLevel::Warning,
                    feature: "empty-table-info".into(),
                    message: format!("table '{}' reported no columns", name),
                });
            }
            tables.push(TableSchema { name, columns });
        }

        Ok(CrawlPart {
            data: SchemaGraph { tables },
            warnings,
        })
    }

    async fn profile(
        &self,
        schema: &SchemaGraph,
        depth: ProfileDepth,
    ) -> Result<CrawlPart<ProfileReport>, CoreError> {
        let mut warnings = Vec::new();
        let mut tables = Vec::new();

        for table in &schema.tables {
            let quoted = quote_ident(&table.name);

            let row_count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted))
                    .fetch_one(&self.pool)
                    .await?;

            // Sampled depth bounds the scan; full depth aggregates over
            // every row.
            let scan_source = match depth {
                ProfileDepth::Full => quoted.clone(),
                ProfileDepth::Sampled => {
                    format!("(SELECT * FROM {} LIMIT {})", quoted, SAMPLE_ROW_LIMIT)
                }
            };
            let scanned_rows = match depth {
                ProfileDepth::Full => row_count,
                ProfileDepth::Sampled => row_count.min(SAMPLE_ROW_LIMIT),
            };

            let mut columns = Vec::new();
            for column in &table.columns {
                let qcol = quote_ident(&column.name);

                let row = sqlx::query(&format!(
                    "SELECT COUNT({c}) AS present, COUNT(DISTINCT {c}) AS distinct_vals FROM {t}",
                    c = qcol,
                    t = scan_source
                ))
                .fetch_one(&self.pool)
                .await?;
                let present: i64 = row.try_get("present")?;
                let distinct: i64 = row.try_get("distinct_vals")?;

                let samples: Vec<String> = sqlx::query_scalar(&format!(
                    "SELECT DISTINCT CAST({c} AS TEXT) FROM {t} WHERE {c} IS NOT NULL LIMIT {n}",
                    c = qcol,
                    t = scan_source,
                    n = self.sample_values
                ))
                .fetch_all(&self.pool)
                .await?;

                let null_fraction = if scanned_rows > 0 {
                    Some((scanned_rows - present) as f64 / scanned_rows as f64)
                } else {
                    None
                };

                if column.data_type.is_empty() {
                    warnings.push(CrawlWarning {
                        level: WarningLevel::Warning,
                        feature: "untyped-column".into(),
                        message: format!(
                            "column '{}.{}' has no declared type",
                            table.name, column.name
                        ),
                    });
                }

                columns.push(ColumnProfile {
                    column: column.name.clone(),
                    null_fraction,
                    distinct_count: Some(distinct),
                    samples,
                });
            }

            tables.push(TableProfile {
                table: table.name.clone(),
                row_count,
                columns,
            });
        }

        Ok(CrawlPart {
            data: ProfileReport { tables },
            warnings,
        })
    }

    async fn close(&self) -> Result<(), CoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteFileAdapter {
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSchema>, CoreError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let data_type: String = row.try_get("type")?;
            let notnull: i64 = row.try_get("notnull")?;
            columns.push(ColumnSchema {
                name,
                data_type,
                nullable: notnull == 0,
            });
        }

        Ok(columns)
    }
}

/// Quote an identifier for interpolation into SQL text. Bind parameters
/// cannot name tables or columns, so identifiers from `sqlite_master` are
/// double-quoted with embedded quotes doubled.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
