//! The wired-up catalog core: one constructor, every service behind it.
//!
//! [`Dock::open`] connects the database, runs migrations, and assembles
//! the provisioning, connectivity, and crawl services around a shared
//! catalog, secret store, and status broadcaster. Both job queues are
//! started here; their workers live as long as the tokio runtime does.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapter::{AdapterFactory, BuiltinAdapterFactory};
use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::connectivity::{CheckReport, ConnectivityService, SweepReport};
use crate::crawl::{CrawlReport, MetadataCrawlService};
use crate::error::CoreError;
use crate::models::{CreateSourceRequest, SchemaSnapshot, Source};
use crate::provision::{ProvisionOutcome, SourceProvisioningService};
use crate::queue::{Enqueued, JobQueue};
use crate::secrets::{SecretStore, SqliteSecretStore};
use crate::{db, migrate};

pub struct Dock {
    catalog: Arc<Catalog>,
    broadcaster: StatusBroadcaster,
    provisioning: SourceProvisioningService,
    connectivity: Arc<ConnectivityService>,
    crawler: Arc<MetadataCrawlService>,
    check_queue: Arc<JobQueue>,
    crawl_queue: Arc<JobQueue>,
}

impl Dock {
    /// Open with the stock adapter factory.
    pub async fn open(config: Config) -> Result<Self> {
        let factory = Arc::new(BuiltinAdapterFactory::new(config.crawl.clone()));
        Self::open_with(config, factory).await
    }

    /// Open with a caller-supplied adapter factory. Tests use this to
    /// substitute scripted adapters for real ones.
    pub async fn open_with(config: Config, adapters: Arc<dyn AdapterFactory>) -> Result<Self> {
        let pool = db::connect(&config.db.path)
            .await
            .with_context(|| format!("Failed to open catalog db: {}", config.db.path.display()))?;
        migrate::run(&pool)
            .await
            .context("Failed to run catalog migrations")?;

        let catalog = Arc::new(Catalog::new(pool.clone()));
        let secrets: Arc<dyn SecretStore> = Arc::new(SqliteSecretStore::new(pool));
        let broadcaster = StatusBroadcaster::new(config.events.buffer);

        let connectivity = Arc::new(ConnectivityService::new(
            catalog.clone(),
            secrets.clone(),
            adapters.clone(),
            broadcaster.clone(),
        ));
        let crawler = Arc::new(MetadataCrawlService::new(
            catalog.clone(),
            secrets.clone(),
            adapters,
            broadcaster.clone(),
        ));

        let check_queue = Arc::new(JobQueue::start(connectivity.clone(), broadcaster.clone()));
        let crawl_queue = Arc::new(JobQueue::start(crawler.clone(), broadcaster.clone()));

        let provisioning = SourceProvisioningService::new(
            catalog.clone(),
            secrets,
            broadcaster.clone(),
            crawl_queue.clone(),
        );

        Ok(Self {
            catalog,
            broadcaster,
            provisioning,
            connectivity,
            crawler,
            check_queue,
            crawl_queue,
        })
    }

    // ─── Provisioning ───────────────────────────────────────────────

    pub async fn create_source(
        &self,
        request: CreateSourceRequest,
    ) -> Result<ProvisionOutcome, CoreError> {
        self.provisioning.create_source(request).await
    }

    pub async fn remove_source(&self, source_id: &str) -> Result<(), CoreError> {
        self.provisioning.remove_source(source_id).await
    }

    // ─── Connectivity ───────────────────────────────────────────────

    /// Run a check inline, bypassing the queue.
    pub async fn check_source(&self, source_id: &str) -> Result<CheckReport, CoreError> {
        self.connectivity.check_source(source_id).await
    }

    /// Sweep every source inline, sequentially.
    pub async fn check_all(&self) -> Result<SweepReport, CoreError> {
        self.connectivity.check_all().await
    }

    /// Queue a check; the outcome arrives through the broadcaster.
    pub fn enqueue_check(&self, source_id: &str) -> Result<Enqueued, CoreError> {
        self.check_queue.enqueue(source_id)
    }

    /// Queue a check for every source. Returns how many were queued
    /// (sources already pending are skipped).
    pub async fn enqueue_check_all(&self) -> Result<usize, CoreError> {
        let ids = self.catalog.list_source_ids().await?;
        self.check_queue.enqueue_all(ids)
    }

    // ─── Crawling ───────────────────────────────────────────────────

    /// Run a crawl inline, bypassing the queue.
    pub async fn crawl_source(&self, source_id: &str) -> Result<CrawlReport, CoreError> {
        self.crawler.crawl_source(source_id).await
    }

    /// Queue a crawl; the outcome arrives through the broadcaster.
    pub fn enqueue_crawl(&self, source_id: &str) -> Result<Enqueued, CoreError> {
        self.crawl_queue.enqueue(source_id)
    }

    /// Queue a crawl for every source. Returns how many were queued
    /// (sources already pending are skipped).
    pub async fn enqueue_crawl_all(&self) -> Result<usize, CoreError> {
        let ids = self.catalog.list_source_ids().await?;
        self.crawl_queue.enqueue_all(ids)
    }

    // ─── Catalog & Events ───────────────────────────────────────────

    pub async fn find_source(&self, source_id: &str) -> Result<Option<Source>, CoreError> {
        self.catalog.find_source(source_id).await
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, CoreError> {
        self.catalog.list_sources().await
    }

    pub async fn load_snapshot(
        &self,
        source_id: &str,
    ) -> Result<Option<SchemaSnapshot>, CoreError> {
        self.catalog.load_snapshot(source_id).await
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StatusEvent> {
        self.broadcaster.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
