//! Wire types for daemon communication.
//!
//! This crate defines the JSON bodies exchanged over the ingestion
//! endpoint and the reporting surface, plus the validation that turns a
//! raw client submission into a domain `ActivitySample`.

pub mod ingest;
pub mod message;

pub use ingest::{IngestError, SampleRequest};
pub use message::{ErrorResponse, HealthResponse, UsageDay, UsageRangeResponse, UsageResponse};
