//! # Datadock CLI (`dock`)
//!
//! The `dock` binary manages the source catalog: registering connection
//! definitions, checking reachability, and crawling schema metadata.
//!
//! ## Usage
//!
//! ```bash
//! dock --config ./config/dock.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dock init` | Create the SQLite catalog and run schema migrations |
//! | `dock add <kind>` | Register a new source (postgres, mysql, mongodb, sqlite) |
//! | `dock sources` | List all sources with live status labels |
//! | `dock show <id>` | Print one source, its snapshot, and crawl warnings |
//! | `dock check <id>` | Verify reachability of one source |
//! | `dock sweep` | Check every source, sequentially |
//! | `dock check-all` | Queue a check for every source |
//! | `dock crawl <id>` | Extract schema and profile metadata from one source |
//! | `dock crawl-all` | Queue a crawl for every source |
//! | `dock remove <id>` | Delete a source, its snapshot, and its secrets |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the catalog
//! dock init --config ./config/dock.toml
//!
//! # Register a local analytics file (crawled immediately)
//! dock add sqlite --name metrics --path /data/metrics.db
//!
//! # Register a PostgreSQL database
//! dock add postgres --name orders --host db1 --port 5432 \
//!     --database app --user svc --password hunter2
//!
//! # Check and re-crawl
//! dock check 3b2f…; dock crawl 3b2f…
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use datadock::broadcast::{JobState, StatusEvent};
use datadock::config;
use datadock::dock::Dock;
use datadock::models::{ConnectionRequest, CreateSourceRequest};
use datadock::sources;
use datadock::{db, migrate};

/// Datadock CLI — a local-first catalog for managed data sources.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dock.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dock",
    about = "Datadock — a local-first catalog for managed data sources",
    version,
    long_about = "Datadock registers connection definitions for PostgreSQL, MySQL, MongoDB, \
    and SQLite file sources, verifies their reachability, and crawls them for schema and \
    profiling metadata, all persisted in a single SQLite catalog."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dock.toml`. Database, event, and crawl
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/dock.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog schema.
    ///
    /// Creates the SQLite database file and all required tables (sources,
    /// secrets, schema_snapshots). Idempotent — running it multiple times
    /// is safe.
    Init,

    /// Register a new source.
    ///
    /// Validates the request, rejects duplicates of an already-registered
    /// connection, stores any credentials separately from the catalog row,
    /// and queues the first metadata crawl.
    Add {
        #[command(subcommand)]
        kind: AddKind,
    },

    /// List all sources with live status labels.
    Sources,

    /// Print one source in full.
    ///
    /// Shows the catalog record, the latest schema snapshot (tables,
    /// columns, row counts), and any crawl warnings.
    Show {
        /// Source id.
        id: String,
    },

    /// Verify reachability of one source.
    ///
    /// Walks the connection state machine: `checking` first, then exactly
    /// one of `connected` or `error`.
    Check {
        /// Source id.
        id: String,
    },

    /// Check every source, sequentially, in catalog order.
    ///
    /// One unreachable source never stops the sweep.
    Sweep,

    /// Queue a check for every source and wait for the queue to drain.
    ///
    /// Like `sweep`, but through the connectivity queue: sources already
    /// queued or checking are skipped.
    CheckAll,

    /// Extract schema and profile metadata from one source.
    ///
    /// Connects, health-checks, crawls structure, profiles columns, and
    /// replaces the stored snapshot. A failed crawl marks the source's
    /// connection as broken too.
    Crawl {
        /// Source id.
        id: String,
    },

    /// Queue a crawl for every source and wait for the queue to drain.
    ///
    /// Sources already queued or crawling are skipped (deduplicated by
    /// id); each queued crawl runs in FIFO order.
    CrawlAll,

    /// Delete a source, its snapshot, and its secrets.
    Remove {
        /// Source id.
        id: String,
    },
}

/// Source kinds accepted by `dock add`.
#[derive(Subcommand)]
enum AddKind {
    /// Register a PostgreSQL database.
    Postgres {
        #[command(flatten)]
        meta: SourceMeta,
        /// Server hostname.
        #[arg(long)]
        host: String,
        /// Server port.
        #[arg(long, default_value_t = 5432)]
        port: u16,
        /// Database name.
        #[arg(long)]
        database: String,
        /// Login role.
        #[arg(long)]
        user: String,
        /// Login password (omit for trust/peer authentication).
        #[arg(long)]
        password: Option<String>,
    },

    /// Register a MySQL database.
    Mysql {
        #[command(flatten)]
        meta: SourceMeta,
        /// Server hostname.
        #[arg(long)]
        host: String,
        /// Server port.
        #[arg(long, default_value_t = 3306)]
        port: u16,
        /// Database name.
        #[arg(long)]
        database: String,
        /// Login user.
        #[arg(long)]
        user: String,
        /// Login password (omit for password-less accounts).
        #[arg(long)]
        password: Option<String>,
    },

    /// Register a MongoDB database.
    Mongodb {
        #[command(flatten)]
        meta: SourceMeta,
        /// Server hostname.
        #[arg(long)]
        host: String,
        /// Server port.
        #[arg(long, default_value_t = 27017)]
        port: u16,
        /// Database name.
        #[arg(long)]
        database: String,
        /// Full connection URI including credentials. Stored only in the
        /// secret store, never in the catalog.
        #[arg(long)]
        uri: String,
    },

    /// Register a SQLite database file.
    Sqlite {
        #[command(flatten)]
        meta: SourceMeta,
        /// Path to the database file.
        #[arg(long)]
        path: PathBuf,
    },
}

/// Metadata flags shared by every `dock add` variant.
#[derive(clap::Args)]
struct SourceMeta {
    /// Display name for the source.
    #[arg(long)]
    name: String,

    /// Free-form description.
    #[arg(long)]
    description: Option<String>,

    /// Owner handle; repeat for multiple owners.
    #[arg(long = "owner")]
    owners: Vec<String>,

    /// Tag; repeat for multiple tags.
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl AddKind {
    fn into_request(self) -> CreateSourceRequest {
        let (meta, connection) = match self {
            AddKind::Postgres {
                meta,
                host,
                port,
                database,
                user,
                password,
            } => (
                meta,
                ConnectionRequest::Postgres {
                    host,
                    port,
                    database,
                    user,
                    password,
                },
            ),
            AddKind::Mysql {
                meta,
                host,
                port,
                database,
                user,
                password,
            } => (
                meta,
                ConnectionRequest::MySql {
                    host,
                    port,
                    database,
                    user,
                    password,
                },
            ),
            AddKind::Mongodb {
                meta,
                host,
                port,
                database,
                uri,
            } => (
                meta,
                ConnectionRequest::MongoDb {
                    host,
                    port,
                    database,
                    uri,
                },
            ),
            AddKind::Sqlite { meta, path } => (meta, ConnectionRequest::SqliteFile { path }),
        };

        CreateSourceRequest {
            name: meta.name,
            description: meta.description,
            owners: meta.owners,
            tags: meta.tags,
            connection,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&cfg.db.path).await?;
        migrate::run(&pool).await?;
        println!("Catalog initialized at {}.", cfg.db.path.display());
        return Ok(());
    }

    let dock = Dock::open(cfg).await?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),

        Commands::Add { kind } => {
            let mut events = dock.subscribe();
            let outcome = dock.create_source(kind.into_request()).await?;
            println!("Registered source {}.", outcome.source_id);

            if outcome.crawl_queued {
                println!("Crawling...");
                wait_for_job(&mut events, "crawl", &outcome.source_id).await;
            }
            if let Some(source) = dock.find_source(&outcome.source_id).await? {
                println!(
                    "connection: {}  crawl: {}",
                    source.connection_status.ui_label(),
                    source.crawl_status.ui_label()
                );
            }
        }

        Commands::Sources => {
            let list = dock.list_sources().await?;
            sources::print_sources(&list);
        }

        Commands::Show { id } => {
            let source = dock
                .find_source(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("source not found: {}", id))?;
            let snapshot = dock.load_snapshot(&id).await?;
            sources::print_source_detail(&source, snapshot.as_ref());
        }

        Commands::Check { id } => match dock.check_source(&id).await {
            Ok(report) => println!("{}: online ({})", report.source_id, report.checked_at),
            Err(e) => {
                println!("{}: offline — {}", id, e);
                std::process::exit(1);
            }
        },

        Commands::Sweep => {
            let report = dock.check_all().await?;
            println!(
                "Checked {} sources: {} online, {} offline.",
                report.checked, report.connected, report.failed
            );
        }

        Commands::Crawl { id } => match dock.crawl_source(&id).await {
            Ok(report) => println!(
                "{}: crawled {} tables ({} warnings).",
                report.source_id, report.tables, report.warnings
            ),
            Err(e) => {
                println!("{}: crawl failed — {}", id, e);
                std::process::exit(1);
            }
        },

        Commands::CheckAll => {
            let mut events = dock.subscribe();
            let queued = dock.enqueue_check_all().await?;
            println!("Queued {} checks.", queued);
            drain_queue(&mut events, "connectivity", queued).await;
        }

        Commands::CrawlAll => {
            let mut events = dock.subscribe();
            let queued = dock.enqueue_crawl_all().await?;
            println!("Queued {} crawls.", queued);
            drain_queue(&mut events, "crawl", queued).await;
        }

        Commands::Remove { id } => {
            dock.remove_source(&id).await?;
            println!("Removed source {}.", id);
        }
    }

    Ok(())
}

/// Print terminal job states from the named queue until `remaining` of
/// them have been seen.
async fn drain_queue(
    events: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
    queue: &str,
    mut remaining: usize,
) {
    while remaining > 0 {
        match events.recv().await {
            Ok(StatusEvent::Job {
                queue: q,
                source_id,
                state: state @ (JobState::Completed | JobState::Failed),
            }) if q == queue => {
                println!("  {}: {}", source_id, state.as_str());
                remaining -= 1;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

/// Block until the named queue reports a terminal state for `source_id`.
async fn wait_for_job(
    events: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
    queue: &str,
    source_id: &str,
) {
    loop {
        match events.recv().await {
            Ok(StatusEvent::Job {
                queue: q,
                source_id: sid,
                state: JobState::Completed | JobState::Failed,
            }) if q == queue && sid == source_id => return,
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
