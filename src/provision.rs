//! Source provisioning: validate, register, store credentials, queue the
//! first crawl.
//!
//! Provisioning is atomic from the caller's point of view: either the
//! source row and all of its secrets exist afterwards, or neither does.
//! The catalog row is written first; if credential storage then fails, the
//! row (and any secrets that did land) are rolled back and the caller gets
//! an `AuthRequired` error.
//!
//! Duplicate detection is by connection fingerprint — same kind, same
//! non-secret coordinates. A duplicate is rejected outright, with the id
//! of the already-registered source in the error so a caller can point the
//! user at it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::broadcast::StatusBroadcaster;
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::fingerprint::fingerprint;
use crate::models::{ConnectionRequest, CreateSourceRequest, Source, SourceError};
use crate::queue::JobQueue;
use crate::secrets::SecretStore;
use crate::status::{ConnectionStatus, CrawlStatus};

/// Outcome of a successful provision.
#[derive(Clone, Debug)]
pub struct ProvisionOutcome {
    pub source_id: String,
    /// Whether the initial crawl job was queued. `false` means the kickoff
    /// could not be recorded or the queue worker is gone; the source
    /// itself exists either way and the crawl can be re-enqueued.
    pub crawl_queued: bool,
}

pub struct SourceProvisioningService {
    catalog: Arc<Catalog>,
    secrets: Arc<dyn SecretStore>,
    broadcaster: StatusBroadcaster,
    crawl_queue: Arc<JobQueue>,
}

impl SourceProvisioningService {
    pub fn new(
        catalog: Arc<Catalog>,
        secrets: Arc<dyn SecretStore>,
        broadcaster: StatusBroadcaster,
        crawl_queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            catalog,
            secrets,
            broadcaster,
            crawl_queue,
        }
    }

    /// Register a new source. Validation and duplicate rejection happen
    /// before anything durable changes.
    pub async fn create_source(
        &self,
        request: CreateSourceRequest,
    ) -> Result<ProvisionOutcome, CoreError> {
        validate(&request)?;

        let spec = request.connection.spec();
        let fp = fingerprint(&spec);

        if let Some(existing) = self.catalog.find_by_fingerprint(&fp).await? {
            return Err(CoreError::Validation {
                message: format!(
                    "connection already registered as '{}' ({})",
                    existing.name, existing.id
                ),
                existing_id: Some(existing.id),
            });
        }

        // The row is born `checking`: its first connection attempt (the
        // initial crawl) is already on its way.
        let source = Source {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            description: request.description,
            owners: request.owners,
            tags: request.tags,
            connection: spec,
            fingerprint: fp,
            connection_status: ConnectionStatus::Checking,
            crawl_status: CrawlStatus::NotCrawled,
            last_error: None,
            last_connected_at: None,
            last_crawl_at: None,
            created_at: Utc::now(),
        };

        self.catalog.insert_source(&source).await?;
        self.broadcaster
            .notify_connection(&source.id, ConnectionStatus::Checking, None);

        for (key, value) in request.connection.secrets() {
            if let Err(e) = self.secrets.store(&source.id, key, &value).await {
                self.rollback(&source.id).await;
                self.broadcaster.notify_connection(
                    &source.id,
                    ConnectionStatus::Error,
                    Some(e.to_string()),
                );
                return Err(CoreError::AuthRequired(e.to_string()));
            }
        }

        tracing::info!(
            source_id = %source.id,
            kind = %source.kind(),
            name = %source.name,
            "source registered"
        );

        // First crawl is queued automatically; its outcome arrives through
        // the broadcaster, not through this call. From here on the source
        // durably exists and is connectable, so a failed kickoff degrades
        // the crawl dimension but never fails the provisioning call.
        let crawl_queued = self.queue_initial_crawl(&source).await;

        Ok(ProvisionOutcome {
            source_id: source.id,
            crawl_queued,
        })
    }

    /// Transition to `crawling` and enqueue the first crawl. Best effort:
    /// failures are recorded on the row and logged, never returned.
    async fn queue_initial_crawl(&self, source: &Source) -> bool {
        let crawling = match source.crawl_status.transition(CrawlStatus::Crawling) {
            Ok(status) => status,
            Err(e) => {
                self.fail_initial_crawl(&source.id, &e.to_string()).await;
                return false;
            }
        };
        if let Err(e) = self
            .catalog
            .update_crawl_status(&source.id, crawling, None)
            .await
        {
            self.fail_initial_crawl(&source.id, &e.to_string()).await;
            return false;
        }
        self.broadcaster.notify_crawl(&source.id, crawling, None);

        match self.crawl_queue.enqueue(&source.id) {
            Ok(enqueued) => enqueued.queued,
            Err(e) => {
                self.fail_initial_crawl(&source.id, &e.to_string()).await;
                false
            }
        }
    }

    /// Record a failed crawl kickoff on the row. Also best effort — the
    /// caller is already degrading, a second failure is only logged.
    async fn fail_initial_crawl(&self, source_id: &str, message: &str) {
        tracing::warn!(source_id, error = %message, "initial crawl not queued");
        let record = SourceError::new("provision", format!("crawl not queued: {}", message));
        match self
            .catalog
            .update_crawl_status(source_id, CrawlStatus::Error, Some(&record))
            .await
        {
            Ok(()) => {
                self.broadcaster.notify_crawl(
                    source_id,
                    CrawlStatus::Error,
                    Some(record.message.clone()),
                );
            }
            Err(e) => {
                tracing::error!(source_id, error = %e, "could not record failed crawl kickoff");
            }
        }
    }

    /// Remove a source, its snapshot, and its secrets.
    pub async fn remove_source(&self, source_id: &str) -> Result<(), CoreError> {
        let source = self
            .catalog
            .find_source(source_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(source_id.to_string()))?;

        self.secrets.delete_all(source_id).await?;
        self.catalog.delete_source(source_id).await?;

        tracing::info!(source_id, name = %source.name, "source removed");
        Ok(())
    }

    /// Undo a half-finished provision. Errors here are logged and
    /// swallowed — the caller is already on an error path, and both
    /// deletes are no-ops for ids that never landed.
    async fn rollback(&self, source_id: &str) {
        if let Err(e) = self.secrets.delete_all(source_id).await {
            tracing::error!(source_id, error = %e, "rollback: secret cleanup failed");
        }
        if let Err(e) = self.catalog.delete_source(source_id).await {
            tracing::error!(source_id, error = %e, "rollback: source row cleanup failed");
        }
        tracing::warn!(source_id, "provisioning rolled back");
    }
}

/// Reject malformed requests before anything is persisted.
fn validate(request: &CreateSourceRequest) -> Result<(), CoreError> {
    if request.name.trim().is_empty() {
        return Err(CoreError::validation("source name must not be empty"));
    }

    match &request.connection {
        ConnectionRequest::Postgres { host, port, database, user, .. }
        | ConnectionRequest::MySql { host, port, database, user, .. } => {
            if host.trim().is_empty() {
                return Err(CoreError::validation("host must not be empty"));
            }
            if *port == 0 {
                return Err(CoreError::validation("port must be non-zero"));
            }
            if database.trim().is_empty() {
                return Err(CoreError::validation("database name must not be empty"));
            }
            if user.trim().is_empty() {
                return Err(CoreError::validation("user must not be empty"));
            }
        }
        ConnectionRequest::MongoDb { host, port, database, uri } => {
            if host.trim().is_empty() {
                return Err(CoreError::validation("host must not be empty"));
            }
            if *port == 0 {
                return Err(CoreError::validation("port must be non-zero"));
            }
            if database.trim().is_empty() {
                return Err(CoreError::validation("database name must not be empty"));
            }
            if uri.trim().is_empty() {
                return Err(CoreError::validation("connection uri must not be empty"));
            }
        }
        ConnectionRequest::SqliteFile { path } => {
            if path.as_os_str().is_empty() {
                return Err(CoreError::validation("database file path must not be empty"));
            }
        }
    }

    Ok(())
}
