//! Adapter contract for per-kind source access.
//!
//! Each source kind is reached through a [`SourceAdapter`]: a short-lived
//! handle exposing `health_check` / `crawl_schema` / `profile` / `close`.
//! Adapters are produced by an [`AdapterFactory`], which is the single
//! place where the closed [`SourceKind`] sum is dispatched to concrete
//! implementations — adding a kind without a factory arm is a compile
//! error.
//!
//! Stored connection specs hold no credentials; [`resolve_connection`]
//! merges the spec with the secret store, one place, for both the
//! connectivity and crawl services.

use async_trait::async_trait;

use crate::config::CrawlConfig;
use crate::error::CoreError;
use crate::models::{ConnectionSpec, CrawlWarning, ProfileReport, SchemaGraph, SourceKind};
use crate::secrets::SecretStore;

/// Result half of a crawl call: the payload plus any non-fatal warnings
/// the adapter accumulated while producing it.
#[derive(Debug)]
pub struct CrawlPart<T> {
    pub data: T,
    pub warnings: Vec<CrawlWarning>,
}

/// How thoroughly to profile. Relational and file kinds scan fully;
/// document stores are profiled from a sample of documents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProfileDepth {
    Full,
    Sampled,
}

/// Profiling depth per kind — exhaustive by construction.
pub fn profile_depth(kind: SourceKind) -> ProfileDepth {
    match kind {
        SourceKind::Postgres | SourceKind::MySql | SourceKind::SqliteFile => ProfileDepth::Full,
        SourceKind::MongoDb => ProfileDepth::Sampled,
    }
}

/// A live handle to one source. All methods may suspend; `close` must be
/// called regardless of earlier outcomes (close errors are logged, never
/// escalated).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Cheap reachability probe. An error means the source is unreachable
    /// or the credentials are wrong.
    async fn health_check(&self) -> Result<(), CoreError>;

    /// Extract structural metadata (tables/collections and their columns).
    async fn crawl_schema(&self) -> Result<CrawlPart<SchemaGraph>, CoreError>;

    /// Compute profiling statistics for the crawled structure.
    async fn profile(
        &self,
        schema: &SchemaGraph,
        depth: ProfileDepth,
    ) -> Result<CrawlPart<ProfileReport>, CoreError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), CoreError>;
}

/// A connection spec with its secrets merged back in, ready to hand to a
/// factory. Held only on the stack for the duration of one job.
#[derive(Clone, Debug)]
pub struct ResolvedConnection {
    pub spec: ConnectionSpec,
    pub password: Option<String>,
    pub uri: Option<String>,
}

/// Merge a stored spec with the secrets its kind requires. Shared by the
/// connectivity and crawl services so the per-kind secret knowledge lives
/// in exactly one place.
pub async fn resolve_connection(
    source_id: &str,
    spec: &ConnectionSpec,
    secrets: &dyn SecretStore,
) -> Result<ResolvedConnection, CoreError> {
    use crate::models::SecretKey;

    let (password, uri) = match spec.kind() {
        SourceKind::Postgres | SourceKind::MySql => {
            // Password-less servers are legitimate; retrieval errors are not.
            let password = secrets.retrieve(source_id, SecretKey::Password).await?;
            (password, None)
        }
        SourceKind::MongoDb => {
            let uri = secrets
                .retrieve(source_id, SecretKey::Uri)
                .await?
                .ok_or_else(|| {
                    CoreError::AuthRequired(format!(
                        "no stored connection uri for source {}",
                        source_id
                    ))
                })?;
            (None, Some(uri))
        }
        SourceKind::SqliteFile => (None, None),
    };

    Ok(ResolvedConnection {
        spec: spec.clone(),
        password,
        uri,
    })
}

/// Produces adapters for the fixed kind set.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn open(
        &self,
        kind: SourceKind,
        conn: ResolvedConnection,
    ) -> Result<Box<dyn SourceAdapter>, CoreError>;
}

/// The factory shipped with the `dock` binary. Embedded analytical files
/// are crawled natively; the network kinds need a protocol client that is
/// deliberately not part of this core, so opening them reports a typed
/// error (which the services record as a connection failure).
pub struct BuiltinAdapterFactory {
    crawl: CrawlConfig,
}

impl BuiltinAdapterFactory {
    pub fn new(crawl: CrawlConfig) -> Self {
        Self { crawl }
    }
}

#[async_trait]
impl AdapterFactory for BuiltinAdapterFactory {
    async fn open(
        &self,
        kind: SourceKind,
        conn: ResolvedConnection,
    ) -> Result<Box<dyn SourceAdapter>, CoreError> {
        match kind {
            SourceKind::SqliteFile => {
                let path = match conn.spec {
                    ConnectionSpec::SqliteFile { path } => path,
                    other => {
                        return Err(CoreError::Internal(format!(
                            "connection spec kind mismatch: expected sqlite, got {}",
                            other.kind()
                        )))
                    }
                };
                let adapter =
                    crate::adapter_sqlite::SqliteFileAdapter::open(&path, self.crawl.sample_values)
                        .await?;
                Ok(Box::new(adapter))
            }
            SourceKind::Postgres | SourceKind::MySql | SourceKind::MongoDb => {
                Err(CoreError::Internal(format!(
                    "no {} client is linked into this build",
                    kind
                )))
            }
        }
    }
}
