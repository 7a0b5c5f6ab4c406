//! Pulse Core - Shared domain types for engagement telemetry
//!
//! This crate provides the domain types shared between the daemon
//! (pulsed) and the client-side activity monitor (pulse-monitor).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod day;
pub mod error;
pub mod ledger;
pub mod sample;

// Re-exports for convenience
pub use config::TelemetryConfig;
pub use day::DayKey;
pub use error::{DomainError, DomainResult};
pub use ledger::DailyUsage;
pub use sample::{ActivitySample, ReportReason, SessionId, UserId};
