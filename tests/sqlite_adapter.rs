//! Integration tests for the stock adapter factory against real SQLite
//! files on disk: schema extraction, profiling statistics, and the typed
//! failures for kinds whose clients are not part of this build.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;

use datadock::broadcast::{JobState, StatusEvent};
use datadock::config::Config;
use datadock::dock::Dock;
use datadock::models::{ConnectionRequest, CreateSourceRequest, WarningLevel};
use datadock::status::{ConnectionStatus, CrawlStatus};

async fn create_data_file(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
    )
    .execute(&pool)
    .await
    .unwrap();
    for (id, name, age) in [(1, "ada", Some(36)), (2, "grace", Some(85)), (3, "mo", None)] {
        sqlx::query("INSERT INTO people (id, name, age) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(age)
            .execute(&pool)
            .await
            .unwrap();
    }

    pool
}

fn sqlite_request(name: &str, path: &Path) -> CreateSourceRequest {
    CreateSourceRequest {
        name: name.into(),
        description: None,
        owners: vec![],
        tags: vec![],
        connection: ConnectionRequest::SqliteFile {
            path: path.to_path_buf(),
        },
    }
}

async fn wait_for_terminal_job(
    events: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
    source_id: &str,
) -> JobState {
    loop {
        match tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for job event")
            .expect("broadcast channel closed")
        {
            StatusEvent::Job {
                queue: "crawl",
                source_id: sid,
                state: state @ (JobState::Completed | JobState::Failed),
            } if sid == source_id => return state,
            _ => {}
        }
    }
}

#[tokio::test]
async fn sqlite_file_is_crawled_and_profiled() {
    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("people.db");
    let pool = create_data_file(&data_path).await;
    pool.close().await;

    let dock = Dock::open(Config::minimal(dir.path().join("catalog.sqlite")))
        .await
        .unwrap();
    let mut events = dock.subscribe();

    let outcome = dock
        .create_source(sqlite_request("people", &data_path))
        .await
        .unwrap();
    let state = wait_for_terminal_job(&mut events, &outcome.source_id).await;
    assert_eq!(state, JobState::Completed);

    let source = dock.find_source(&outcome.source_id).await.unwrap().unwrap();
    assert_eq!(source.crawl_status, CrawlStatus::Crawled);
    assert_eq!(source.connection_status, ConnectionStatus::Connected);

    let snapshot = dock
        .load_snapshot(&outcome.source_id)
        .await
        .unwrap()
        .expect("snapshot should exist");

    assert_eq!(snapshot.schema.tables.len(), 1);
    let table = &snapshot.schema.tables[0];
    assert_eq!(table.name, "people");
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "age"]);
    let name_col = &table.columns[1];
    assert_eq!(name_col.data_type, "TEXT");
    assert!(!name_col.nullable);

    let profile = &snapshot.profile.tables[0];
    assert_eq!(profile.row_count, 3);
    let age = profile
        .columns
        .iter()
        .find(|c| c.column == "age")
        .expect("age profile");
    assert_eq!(age.distinct_count, Some(2));
    let null_fraction = age.null_fraction.expect("null fraction computed");
    assert!((null_fraction - 1.0 / 3.0).abs() < 1e-9);

    let name = profile.columns.iter().find(|c| c.column == "name").unwrap();
    assert_eq!(name.null_fraction, Some(0.0));
    assert_eq!(name.distinct_count, Some(3));
    assert!(name.samples.contains(&"ada".to_string()));
}

#[tokio::test]
async fn virtual_tables_are_skipped_with_a_warning() {
    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("docs.db");
    let pool = create_data_file(&data_path).await;
    sqlx::query("CREATE VIRTUAL TABLE notes USING fts5(body)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let dock = Dock::open(Config::minimal(dir.path().join("catalog.sqlite")))
        .await
        .unwrap();
    let mut events = dock.subscribe();

    let outcome = dock
        .create_source(sqlite_request("docs", &data_path))
        .await
        .unwrap();
    let state = wait_for_terminal_job(&mut events, &outcome.source_id).await;
    assert_eq!(state, JobState::Completed);

    let snapshot = dock
        .load_snapshot(&outcome.source_id)
        .await
        .unwrap()
        .unwrap();

    // The real table survives; the virtual one is reported, not crawled.
    assert!(snapshot.schema.tables.iter().any(|t| t.name == "people"));
    assert!(!snapshot.schema.tables.iter().any(|t| t.name == "notes"));
    let warning = snapshot
        .warnings
        .iter()
        .find(|w| w.feature == "virtual-table")
        .expect("virtual table warning");
    assert_eq!(warning.level, WarningLevel::Error);
    assert!(warning.message.contains("notes"));
}

#[tokio::test]
async fn missing_file_fails_the_crawl_with_recorded_errors() {
    let dir = TempDir::new().unwrap();

    let dock = Dock::open(Config::minimal(dir.path().join("catalog.sqlite")))
        .await
        .unwrap();
    let mut events = dock.subscribe();

    let outcome = dock
        .create_source(sqlite_request("ghost", &dir.path().join("missing.db")))
        .await
        .unwrap();
    let state = wait_for_terminal_job(&mut events, &outcome.source_id).await;
    assert_eq!(state, JobState::Failed);

    let source = dock.find_source(&outcome.source_id).await.unwrap().unwrap();
    assert_eq!(source.crawl_status, CrawlStatus::Error);
    assert_eq!(source.connection_status, ConnectionStatus::Error);
    let last_error = source.last_error.expect("error recorded");
    assert_eq!(last_error.operation, "crawl");
    assert!(last_error.message.contains("not found"));
}

#[tokio::test]
async fn network_kinds_fail_with_a_missing_client_error() {
    let dir = TempDir::new().unwrap();

    let dock = Dock::open(Config::minimal(dir.path().join("catalog.sqlite")))
        .await
        .unwrap();
    let mut events = dock.subscribe();

    let outcome = dock
        .create_source(CreateSourceRequest {
            name: "orders".into(),
            description: None,
            owners: vec![],
            tags: vec![],
            connection: ConnectionRequest::Postgres {
                host: "db1".into(),
                port: 5432,
                database: "app".into(),
                user: "svc".into(),
                password: None,
            },
        })
        .await
        .unwrap();
    let state = wait_for_terminal_job(&mut events, &outcome.source_id).await;
    assert_eq!(state, JobState::Failed);

    let source = dock.find_source(&outcome.source_id).await.unwrap().unwrap();
    assert_eq!(source.connection_status, ConnectionStatus::Error);
    let last_error = source.last_error.expect("error recorded");
    assert!(last_error.message.contains("no postgres client"));
}
