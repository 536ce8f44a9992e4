//! Connection fingerprints for duplicate detection.
//!
//! A fingerprint is a SHA-256 over the kind tag and the non-secret
//! connection fields (host, port, database, or file path). Two requests
//! that would reach the same place hash identically regardless of the
//! source's name, description, or credentials.

use sha2::{Digest, Sha256};

use crate::models::ConnectionSpec;

/// Compute the connection fingerprint for a spec. Host names are
/// case-folded; user and credentials never participate.
pub fn fingerprint(spec: &ConnectionSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.kind().as_str().as_bytes());
    hasher.update([0]);

    match spec {
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
        } => {
            hasher.update(host.to_lowercase().as_bytes());
            hasher.update([0]);
            hasher.update(port.to_le_bytes());
            hasher.update([0]);
            hasher.update(database.as_bytes());
        }
        ConnectionSpec::SqliteFile { path } => {
            hasher.update(path.to_string_lossy().as_bytes());
        }
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(host: &str, port: u16, database: &str, user: &str) -> ConnectionSpec {
        ConnectionSpec::Postgres {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
        }
    }

    #[test]
    fn stable_across_non_connection_fields() {
        // Different user, same destination: still the same connection.
        assert_eq!(
            fingerprint(&pg("db1", 5432, "app", "alice")),
            fingerprint(&pg("db1", 5432, "app", "bob"))
        );
    }

    #[test]
    fn host_is_case_folded() {
        assert_eq!(
            fingerprint(&pg("DB1.internal", 5432, "app", "svc")),
            fingerprint(&pg("db1.internal", 5432, "app", "svc"))
        );
    }

    #[test]
    fn differs_per_destination() {
        let base = fingerprint(&pg("db1", 5432, "app", "svc"));
        assert_ne!(base, fingerprint(&pg("db2", 5432, "app", "svc")));
        assert_ne!(base, fingerprint(&pg("db1", 5433, "app", "svc")));
        assert_ne!(base, fingerprint(&pg("db1", 5432, "other", "svc")));
    }

    #[test]
    fn differs_per_kind() {
        let pg_fp = fingerprint(&pg("db1", 5432, "app", "svc"));
        let my_fp = fingerprint(&ConnectionSpec::MySql {
            host: "db1".into(),
            port: 5432,
            database: "app".into(),
            user: "svc".into(),
        });
        assert_ne!(pg_fp, my_fp);
    }

    #[test]
    fn file_paths_fingerprint_by_path() {
        let a = fingerprint(&ConnectionSpec::SqliteFile {
            path: "/data/a.db".into(),
        });
        let b = fingerprint(&ConnectionSpec::SqliteFile {
            path: "/data/b.db".into(),
        });
        assert_ne!(a, b);
    }
}
