//! Pulse daemon - server side of the engagement telemetry pipeline.
//!
//! The daemon accepts activity samples over HTTP, reconciles them into
//! per-session windows (dedup, rate limiting, eviction), and folds
//! accepted credit into an append-only daily usage ledger:
//! - `config` - daemon configuration (listen address, token table)
//! - `ledger` - the `LedgerStore` contract and in-memory store
//! - `reconciler` - the session reconciliation actor
//! - `server` - the HTTP ingestion and reporting surface
//! - `cli` - daemon lifecycle (start/stop/status, pid file, signals)
//!
//! # Panic-Free Guarantees
//!
//! All production code follows the panic-free policy: no `.unwrap()`,
//! `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.

pub mod cli;
pub mod config;
pub mod ledger;
pub mod reconciler;
pub mod server;

pub use config::DaemonConfig;
pub use ledger::{LedgerError, LedgerStore, MemoryLedger};
pub use reconciler::{
    spawn_reconciler, IngestOutcome, ReconcilerCommand, ReconcilerError, ReconcilerHandle,
};
pub use server::HttpServer;
