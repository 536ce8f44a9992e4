//! Connectivity checking: on-demand health verification of sources.
//!
//! A check walks the connection state machine — `checking` is written and
//! broadcast before the probe, and exactly one terminal write (`connected`
//! or `error`) follows it. Checks mutate only the connection dimension;
//! crawl status and snapshots are untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::{resolve_connection, AdapterFactory};
use crate::broadcast::StatusBroadcaster;
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::models::{Source, SourceError};
use crate::queue::JobRunner;
use crate::secrets::SecretStore;
use crate::status::ConnectionStatus;

/// Outcome of a single successful check.
#[derive(Clone, Debug)]
pub struct CheckReport {
    pub source_id: String,
    pub status: ConnectionStatus,
    pub checked_at: DateTime<Utc>,
}

/// Outcome of a full sweep. Per-source failures are folded into `failed`;
/// the sweep itself only errors if the catalog cannot be listed.
#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    pub checked: usize,
    pub connected: usize,
    pub failed: usize,
}

pub struct ConnectivityService {
    catalog: Arc<Catalog>,
    secrets: Arc<dyn SecretStore>,
    adapters: Arc<dyn AdapterFactory>,
    broadcaster: StatusBroadcaster,
}

impl ConnectivityService {
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

    /// Check one source end to end. On failure the error is recorded on the
    /// source row and broadcast before it is returned, so the caller and
    /// every subscriber see the same story.
    pub async fn check_source(&self, source_id: &str) -> Result<CheckReport, CoreError> {
        let source = self
            .catalog
            .find_source(source_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(source_id.to_string()))?;

        self.mark(&source, ConnectionStatus::Checking, None).await?;

        match self.probe(&source).await {
            Ok(()) => {
                self.mark_from(source_id, ConnectionStatus::Checking, ConnectionStatus::Connected, None)
                    .await?;
                tracing::info!(source_id, kind = %source.kind(), "source reachable");
                Ok(CheckReport {
                    source_id: source_id.to_string(),
                    status: ConnectionStatus::Connected,
                    checked_at: Utc::now(),
                })
            }
            Err(e) => {
                let record = SourceError::new("connectivity", e.to_string());
                self.mark_from(
                    source_id,
                    ConnectionStatus::Checking,
                    ConnectionStatus::Error,
                    Some(&record),
                )
                .await?;
                tracing::warn!(source_id, kind = %source.kind(), error = %e, "source unreachable");
                Err(e)
            }
        }
    }

    /// Check every source, sequentially, in catalog order. One unreachable
    /// source never stops the sweep.
    pub async fn check_all(&self) -> Result<SweepReport, CoreError> {
        let ids = self.catalog.list_source_ids().await?;
        let mut report = SweepReport::default();

        for id in ids {
            report.checked += 1;
            match self.check_source(&id).await {
                Ok(_) => report.connected += 1,
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            checked = report.checked,
            connected = report.connected,
            failed = report.failed,
            "connectivity sweep finished"
        );
        Ok(report)
    }

    /// Resolve secrets, open the adapter, probe, close. The adapter is
    /// closed on both paths; a close failure is logged, not escalated.
    async fn probe(&self, source: &Source) -> Result<(), CoreError> {
        let conn =
            resolve_connection(&source.id, &source.connection, self.secrets.as_ref()).await?;
        let adapter = self.adapters.open(source.kind(), conn).await?;

        let probed = adapter.health_check().await;
        if let Err(e) = adapter.close().await {
            tracing::warn!(source_id = %source.id, error = %e, "adapter close failed");
        }
        probed
    }

    async fn mark(
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

    async fn mark_from(
        &self,
        source_id: &str,
        from: ConnectionStatus,
        next: ConnectionStatus,
        error: Option<&SourceError>,
    ) -> Result<(), CoreError> {
        let next = from.transition(next)?;
        self.catalog
            .update_connection_status(source_id, next, error)
            .await?;
        self.broadcaster
            .notify_connection(source_id, next, error.map(|e| e.message.clone()));
        Ok(())
    }
}

#[async_trait]
impl JobRunner for ConnectivityService {
    fn queue_name(&self) -> &'static str {
        "connectivity"
    }

    async fn run(&self, source_id: &str) -> Result<(), CoreError> {
        self.check_source(source_id).await.map(|_| ())
    }
}
