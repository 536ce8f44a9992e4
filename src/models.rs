//! Core data models for the source catalog.
//!
//! These types represent managed sources, their connection definitions,
//! and the schema snapshots produced by a crawl. Connection definitions
//! come in two flavors: [`ConnectionRequest`] (what a caller submits,
//! secrets included) and [`ConnectionSpec`] (what the catalog persists,
//! secrets stripped). The split is enforced by the type system — a
//! `ConnectionSpec` simply has no field that could hold a credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::status::{ConnectionStatus, CrawlStatus};

// ═══════════════════════════════════════════════════════════════════════
// Source Kinds & Connections
// ═══════════════════════════════════════════════════════════════════════

/// The fixed set of supported source kinds. Adding a kind without updating
/// every dispatch site is a compile error — all matches are exhaustive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SourceKind {
    Postgres,
    MySql,
    MongoDb,
    SqliteFile,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Postgres,
        SourceKind::MySql,
        SourceKind::MongoDb,
        SourceKind::SqliteFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Postgres => "postgres",
            SourceKind::MySql => "mysql",
            SourceKind::MongoDb => "mongodb",
            SourceKind::SqliteFile => "sqlite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "postgres" => Some(SourceKind::Postgres),
            "mysql" => Some(SourceKind::MySql),
            "mongodb" => Some(SourceKind::MongoDb),
            "sqlite" => Some(SourceKind::SqliteFile),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-secret connection definition, persisted in the catalog and used to
/// derive the connection fingerprint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionSpec {
    Postgres {
        host: String,
        port: u16,
        database: String,
        user: String,
    },
    MySql {
        host: String,
        port: u16,
        database: String,
        user: String,
    },
    #[serde(rename = "mongodb")]
    MongoDb {
        host: String,
        port: u16,
        database: String,
    },
    #[serde(rename = "sqlite")]
    SqliteFile { path: PathBuf },
}

impl ConnectionSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            ConnectionSpec::Postgres { .. } => SourceKind::Postgres,
            ConnectionSpec::MySql { .. } => SourceKind::MySql,
            ConnectionSpec::MongoDb { .. } => SourceKind::MongoDb,
            ConnectionSpec::SqliteFile { .. } => SourceKind::SqliteFile,
        }
    }

    /// Short human-readable location, for listings.
    pub fn location(&self) -> String {
        match self {
            ConnectionSpec::Postgres {
                host,
                port,
                database,
                ..
            }
            | ConnectionSpec::MySql {
                host,
                port,
                database,
                ..
            }
            | ConnectionSpec::MongoDb {
                host,
                port,
                database,
            } => format!("{}:{}/{}", host, port, database),
            ConnectionSpec::SqliteFile { path } => path.display().to_string(),
        }
    }
}

/// Key under which a credential fragment is stored, scoped by source id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SecretKey {
    Password,
    Uri,
}

impl SecretKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::Password => "password",
            SecretKey::Uri => "uri",
        }
    }
}

/// Connection definition as submitted by a caller, secrets included.
/// Splits into a persistable [`ConnectionSpec`] plus `(key, value)` secret
/// pairs via [`spec`](ConnectionRequest::spec) and
/// [`secrets`](ConnectionRequest::secrets).
#[derive(Clone, Debug)]
pub enum ConnectionRequest {
    Postgres {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: Option<String>,
    },
    MySql {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: Option<String>,
    },
    MongoDb {
        host: String,
        port: u16,
        database: String,
        /// Full connection URI including credentials; stored only in the
        /// secret store, never in the catalog row.
        uri: String,
    },
    SqliteFile {
        path: PathBuf,
    },
}

impl ConnectionRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            ConnectionRequest::Postgres { .. } => SourceKind::Postgres,
            ConnectionRequest::MySql { .. } => SourceKind::MySql,
            ConnectionRequest::MongoDb { .. } => SourceKind::MongoDb,
            ConnectionRequest::SqliteFile { .. } => SourceKind::SqliteFile,
        }
    }

    /// The non-secret part, suitable for catalog persistence.
    pub fn spec(&self) -> ConnectionSpec {
        match self {
            ConnectionRequest::Postgres {
                host,
                port,
                database,
                user,
                ..
            } => ConnectionSpec::Postgres {
                host: host.clone(),
                port: *port,
                database: database.clone(),
                user: user.clone(),
            },
            ConnectionRequest::MySql {
                host,
                port,
                database,
                user,
                ..
            } => ConnectionSpec::MySql {
                host: host.clone(),
                port: *port,
                database: database.clone(),
                user: user.clone(),
            },
            ConnectionRequest::MongoDb {
                host,
                port,
                database,
                ..
            } => ConnectionSpec::MongoDb {
                host: host.clone(),
                port: *port,
                database: database.clone(),
            },
            ConnectionRequest::SqliteFile { path } => {
                ConnectionSpec::SqliteFile { path: path.clone() }
            }
        }
    }

    /// The secret fields for this kind, in storage order. Server-based
    /// kinds carry an optional password; the document-store kind carries a
    /// mandatory URI; file sources carry nothing.
    pub fn secrets(&self) -> Vec<(SecretKey, String)> {
        match self {
            ConnectionRequest::Postgres { password, .. }
            | ConnectionRequest::MySql { password, .. } => password
                .iter()
                .map(|p| (SecretKey::Password, p.clone()))
                .collect(),
            ConnectionRequest::MongoDb { uri, .. } => vec![(SecretKey::Uri, uri.clone())],
            ConnectionRequest::SqliteFile { .. } => Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════════

/// Structured error snapshot recorded on a source row. Cleared on the next
/// successful transition of the dimension that wrote it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceError {
    /// The operation that failed: `"provision"`, `"connectivity"`, `"crawl"`.
    pub operation: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SourceError {
    pub fn new(operation: &str, message: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// A managed connection definition and its lifecycle state.
#[derive(Clone, Debug)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owners: Vec<String>,
    pub tags: Vec<String>,
    pub connection: ConnectionSpec,
    /// Derived from kind + non-secret connection fields; unique per
    /// active source.
    pub fingerprint: String,
    pub connection_status: ConnectionStatus,
    pub crawl_status: CrawlStatus,
    pub last_error: Option<SourceError>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_crawl_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        self.connection.kind()
    }
}

/// A validated request to create a new source.
#[derive(Clone, Debug)]
pub struct CreateSourceRequest {
    pub name: String,
    pub description: Option<String>,
    pub owners: Vec<String>,
    pub tags: Vec<String>,
    pub connection: ConnectionRequest,
}

// ═══════════════════════════════════════════════════════════════════════
// Schema Snapshots
// ═══════════════════════════════════════════════════════════════════════

/// Severity of a crawl warning. `Error`-level warnings are logged
/// distinctly but never abort a crawl.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    Warning,
    Error,
}

/// A non-fatal observation emitted while crawling or profiling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlWarning {
    pub level: WarningLevel,
    /// The feature the warning is about (e.g. `"virtual-table"`).
    pub feature: String,
    pub message: String,
}

/// A column (or document field) discovered during a crawl.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// A table (or collection) discovered during a crawl.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Structural metadata extracted from a source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaGraph {
    pub tables: Vec<TableSchema>,
}

/// Profiling statistics for one column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub column: String,
    /// Fraction of rows where the value is null, if computed.
    pub null_fraction: Option<f64>,
    pub distinct_count: Option<i64>,
    /// A few representative values, rendered as text.
    pub samples: Vec<String>,
}

/// Profiling statistics for one table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableProfile {
    pub table: String,
    pub row_count: i64,
    pub columns: Vec<ColumnProfile>,
}

/// Profiling statistics for a whole source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileReport {
    pub tables: Vec<TableProfile>,
}

/// The persisted output of a crawl: structure, statistics, and warnings.
/// Replaces any previous snapshot for the source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub schema: SchemaGraph,
    pub profile: ProfileReport,
    pub warnings: Vec<CrawlWarning>,
    pub crawled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for k in SourceKind::ALL {
            assert_eq!(SourceKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(SourceKind::parse("oracle"), None);
    }

    #[test]
    fn request_splits_secrets_per_kind() {
        let pg = ConnectionRequest::Postgres {
            host: "db1".into(),
            port: 5432,
            database: "app".into(),
            user: "svc".into(),
            password: Some("hunter2".into()),
        };
        assert_eq!(pg.secrets(), vec![(SecretKey::Password, "hunter2".into())]);

        let pg_no_pw = ConnectionRequest::Postgres {
            host: "db1".into(),
            port: 5432,
            database: "app".into(),
            user: "svc".into(),
            password: None,
        };
        assert!(pg_no_pw.secrets().is_empty());

        let mongo = ConnectionRequest::MongoDb {
            host: "docs".into(),
            port: 27017,
            database: "events".into(),
            uri: "mongodb://u:p@docs:27017/events".into(),
        };
        assert_eq!(
            mongo.secrets(),
            vec![(SecretKey::Uri, "mongodb://u:p@docs:27017/events".into())]
        );

        let file = ConnectionRequest::SqliteFile {
            path: "/data/metrics.db".into(),
        };
        assert!(file.secrets().is_empty());
    }

    #[test]
    fn spec_never_serializes_secrets() {
        let mongo = ConnectionRequest::MongoDb {
            host: "docs".into(),
            port: 27017,
            database: "events".into(),
            uri: "mongodb://u:p@docs:27017/events".into(),
        };
        let json = serde_json::to_string(&mongo.spec()).unwrap();
        assert!(!json.contains("mongodb://u:p@"));
        assert!(json.contains("\"kind\":\"mongodb\""));
    }

    #[test]
    fn spec_json_round_trip() {
        let spec = ConnectionSpec::Postgres {
            host: "db1".into(),
            port: 5432,
            database: "app".into(),
            user: "svc".into(),
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: ConnectionSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.kind(), SourceKind::Postgres);
    }
}
