//! Pulse Monitor - client-side engagement detection.
//!
//! This crate observes raw interaction signals, maintains an
//! Active/Idle state machine, and emits bounded activity reports to the
//! ingestion endpoint:
//! - `engine` - the pure state machine (injected clock, no I/O)
//! - `monitor` - the timer-driven task wrapping an engine
//! - `reporter` - report delivery (fire-and-forget HTTP)
//!
//! Reported active time is always a lower bound on true wall-clock
//! active time: idle gaps are never credited, every report is capped,
//! and a lost report costs at most one capped interval.
//!
//! # Panic-Free Guarantees
//!
//! All production code follows the panic-free policy: no `.unwrap()`,
//! `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.

pub mod cli;
pub mod engine;
pub mod monitor;
pub mod reporter;

pub use engine::{ActivityEngine, ActivityState, Flush, SignalKind};
pub use monitor::{ActivityMonitor, MonitorContext, SignalHandle};
pub use reporter::{HttpReporter, MonitorError, Reporter};
