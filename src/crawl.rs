//! Metadata crawling: connect, extract structure, profile, persist.
//!
//! A crawl drives both state machines. The crawl dimension goes
//! `crawling` → `crawled`/`error`; the connection dimension is held at
//! `checking` for the duration and lands on `connected` or `error`
//! together with the crawl outcome — a crawl that dies after a good
//! health check still ends with `connection_status = error`, because the
//! source demonstrably cannot be worked with.
//!
//! The snapshot replaces any previous snapshot for the source; partial
//! results are never persisted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::{profile_depth, resolve_connection, AdapterFactory, SourceAdapter};
use crate::broadcast::StatusBroadcaster;
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::models::{CrawlWarning, SchemaSnapshot, Source, SourceError, WarningLevel};
use crate::queue::JobRunner;
use crate::secrets::SecretStore;
use crate::status::{ConnectionStatus, CrawlStatus};

/// Outcome of a successful crawl.
#[derive(Clone, Debug)]
pub struct CrawlReport {
    pub source_id: String,
    pub tables: usize,
    pub warnings: usize,
    pub crawled_at: DateTime<Utc>,
}

pub struct MetadataCrawlService {
    catalog: Arc<Catalog>,
    secrets: Arc<dyn SecretStore>,
    adapters: Arc<dyn AdapterFactory>,
    broadcaster: StatusBroadcaster,
}

impl MetadataCrawlService {
    pub fn new(
        catalog: Arc<Catalog>,
        secrets: Arc<dyn SecretStore>,
        adapters: Arc<dyn AdapterFactory>,
        broadcaster: StatusBroadcaster,
    ) -> Self {
        Self {
            catalog,
            secrets,
            adapters,
            broadcaster,
        }
    }

    /// Crawl one source end to end. On failure both status dimensions are
    /// written and broadcast before the error is returned.
    pub async fn crawl_source(&self, source_id: &str) -> Result<CrawlReport, CoreError> {
        let source = self
            .catalog
            .find_source(source_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(source_id.to_string()))?;

        self.mark_crawl(&source, CrawlStatus::Crawling, None).await?;
        self.mark_connection(&source, ConnectionStatus::Checking, None)
            .await?;

        match self.crawl_inner(&source).await {
            Ok(snapshot) => {
                let tables = snapshot.schema.tables.len();
                let warnings = snapshot.warnings.len();
                let crawled_at = snapshot.crawled_at;

                // Snapshot write and `crawled` land in one transaction.
                self.catalog.persist_snapshot(source_id, &snapshot).await?;
                let connected = ConnectionStatus::Checking.transition(ConnectionStatus::Connected)?;
                self.catalog
                    .update_connection_status(source_id, connected, None)
                    .await?;

                self.broadcaster
                    .notify_crawl(source_id, CrawlStatus::Crawled, None);
                self.broadcaster
                    .notify_connection(source_id, ConnectionStatus::Connected, None);

                tracing::info!(source_id, tables, warnings, "crawl finished");
                Ok(CrawlReport {
                    source_id: source_id.to_string(),
                    tables,
                    warnings,
                    crawled_at,
                })
            }
            Err(e) => {
                let record = SourceError::new("crawl", e.to_string());
                let crawl_err = CrawlStatus::Crawling.transition(CrawlStatus::Error)?;
                let conn_err = ConnectionStatus::Checking.transition(ConnectionStatus::Error)?;
                self.catalog
                    .update_crawl_status(source_id, crawl_err, Some(&record))
                    .await?;
                self.catalog
                    .update_connection_status(source_id, conn_err, Some(&record))
                    .await?;

                self.broadcaster.notify_crawl(
                    source_id,
                    CrawlStatus::Error,
                    Some(record.message.clone()),
                );
                self.broadcaster.notify_connection(
                    source_id,
                    ConnectionStatus::Error,
                    Some(record.message.clone()),
                );

                tracing::warn!(source_id, error = %e, "crawl failed");
                Err(e)
            }
        }
    }

    /// The pipeline proper: resolve secrets, open, health-check, extract,
    /// profile, assemble the snapshot. The adapter is closed on every path.
    async fn crawl_inner(&self, source: &Source) -> Result<SchemaSnapshot, CoreError> {
        let conn =
            resolve_connection(&source.id, &source.connection, self.secrets.as_ref()).await?;
        let adapter = self.adapters.open(source.kind(), conn).await?;

        let result = self.extract(source, adapter.as_ref()).await;
        if let Err(e) = adapter.close().await {
            tracing::warn!(source_id = %source.id, error = %e, "adapter close failed");
        }
        result
    }

    async fn extract(
        &self,
        source: &Source,
        adapter: &dyn SourceAdapter,
    ) -> Result<SchemaSnapshot, CoreError> {
        adapter.health_check().await?;

        let schema_part = adapter.crawl_schema().await?;
        let depth = profile_depth(source.kind());
        let profile_part = adapter.profile(&schema_part.data, depth).await?;

        let mut warnings: Vec<CrawlWarning> = schema_part.warnings;
        warnings.extend(profile_part.warnings);
        for w in &warnings {
            match w.level {
                WarningLevel::Error => {
                    tracing::warn!(source_id = %source.id, feature = %w.feature, "{}", w.message)
                }
                WarningLevel::Warning | WarningLevel::Info => {
                    tracing::debug!(source_id = %source.id, feature = %w.feature, "{}", w.message)
                }
            }
        }

        Ok(SchemaSnapshot {
            schema: schema_part.data,
            profile: profile_part.data,
            warnings,
            crawled_at: Utc::now(),
        })
    }

    async fn mark_crawl(
        &self,
        source: &Source,
        next: CrawlStatus,
        error: Option<&SourceError>,
    ) -> Result<(), CoreError> {
        let next = source.crawl_status.transition(next)?;
        self.catalog
            .update_crawl_status(&source.id, next, error)
            .await?;
        self.broadcaster
            .notify_crawl(&source.id, next, error.map(|e| e.message.clone()));
        Ok(())
    }

    async fn mark_connection(
        &self,
        source: &Source,
        next: ConnectionStatus,
        error: Option<&SourceError>,
    ) -> Result<(), CoreError> {
        let next = source.connection_status.transition(next)?;
        self.catalog
            .update_connection_status(&source.id, next, error)
            .await?;
        self.broadcaster
            .notify_connection(&source.id, next, error.map(|e| e.message.clone()));
        Ok(())
    }
}

#[async_trait]
impl JobRunner for MetadataCrawlService {
    fn queue_name(&self) -> &'static str {
        "crawl"
    }

    async fn run(&self, source_id: &str) -> Result<(), CoreError> {
        self.crawl_source(source_id).await.map(|_| ())
    }
}
