//! # Datadock
//!
//! A local-first catalog core for managed data sources.
//!
//! Datadock registers connection definitions for a fixed set of source
//! kinds (PostgreSQL, MySQL, MongoDB, SQLite files), verifies their
//! reachability, and crawls them for schema and profiling metadata — all
//! persisted in a single SQLite catalog, with every status transition
//! observable through a broadcast channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────────────────┐   ┌──────────┐
//! │ Provision   │──▶│  Job Queues (dedup FIFO) │──▶│ Services  │
//! │ validate+fp │   │  connectivity / crawl    │   │ check/    │
//! └──────┬──────┘   └─────────────────────────┘   │ crawl     │
//!        │                                        └────┬─────┘
//!        ▼                                             ▼
//! ┌─────────────┐   ┌─────────────┐           ┌──────────────┐
//! │   SQLite     │◀──│  Catalog    │◀──────────│  Adapters    │
//! │ rows+secrets │   │ +snapshots  │           │ per kind     │
//! └─────────────┘   └─────────────┘           └──────────────┘
//!                          │
//!                          ▼
//!                   StatusBroadcaster ──▶ subscribers
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dock init                          # create the catalog database
//! dock add sqlite --name metrics --path /data/metrics.db
//! dock sources                       # list with live status labels
//! dock check <id>                    # verify one source
//! dock crawl <id>                    # extract schema + profile
//! dock show <id>                     # record, snapshot, warnings
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`status`] | Connection and crawl state machines |
//! | [`error`] | Service error taxonomy |
//! | [`fingerprint`] | Connection identity hashing |
//! | [`catalog`] | Source rows and schema snapshots |
//! | [`secrets`] | Credential storage |
//! | [`adapter`] | Per-kind adapter contract |
//! | [`adapter_sqlite`] | SQLite file adapter |
//! | [`provision`] | Source registration and rollback |
//! | [`connectivity`] | Health checks and sweeps |
//! | [`crawl`] | Metadata crawl pipeline |
//! | [`queue`] | Deduplicating FIFO job queues |
//! | [`broadcast`] | Status event fan-out |
//! | [`dock`] | Wired-up facade |
//! | [`sources`] | Terminal rendering for the CLI |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod adapter;
pub mod adapter_sqlite;
pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod crawl;
pub mod db;
pub mod dock;
pub mod error;
pub mod fingerprint;
pub mod migrate;
pub mod models;
pub mod provision;
pub mod queue;
pub mod secrets;
pub mod sources;
pub mod status;
