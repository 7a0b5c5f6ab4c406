//! Reconciler actor commands, outcomes, and errors.
//!
//! Message types for communicating with the `ReconcilerActor`:
//! - `ReconcilerCommand` - commands sent to the actor
//! - `IngestOutcome` - what the reconciler decided about one sample
//! - `ReconcilerError` - errors crossing the actor boundary
//!
//! All types are designed for async message passing and follow the
//! panic-free policy.

use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{ActivitySample, DailyUsage, DayKey, UserId};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::ledger::LedgerError;

/// Commands sent to the reconciler actor.
///
/// Each query command carries a oneshot channel for the response,
/// enabling request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum ReconcilerCommand {
    /// Reconcile one activity sample into the ledger.
    ///
    /// Never fails from the caller's point of view: every decision
    /// (applied, duplicate, rate limited, rejected, dropped) is an
    /// `IngestOutcome`, not an error. The only error is the actor
    /// being gone.
    Ingest {
        sample: Box<ActivitySample>,
        /// Server receipt time; decides the day bucket and all window
        /// arithmetic.
        received_at: DateTime<Utc>,
        respond_to: oneshot::Sender<IngestOutcome>,
    },

    /// Read one day's usage for a user.
    GetUsage {
        key: DayKey,
        respond_to: oneshot::Sender<Result<Option<DailyUsage>, ReconcilerError>>,
    },

    /// Read an inclusive range of daily totals for a user.
    GetUsageRange {
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
        respond_to: oneshot::Sender<Result<Vec<(NaiveDate, DailyUsage)>, ReconcilerError>>,
    },

    /// Drop session windows that have been silent past the eviction
    /// timeout. Fire-and-forget, sent by the sweep task.
    EvictIdleWindows { now: DateTime<Utc> },
}

/// What the reconciler decided about one ingested sample.
///
/// Every variant maps to a success response on the wire; the pipeline
/// never signals clients to retry or back off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Credit was folded into the ledger.
    Applied {
        /// The user's new total for the receipt day.
        new_total: u64,
    },

    /// Sample accepted from an anonymous caller: the session window
    /// was maintained but no ledger entry exists to credit.
    AppliedAnonymous,

    /// Retransmission of the previous sample inside the coalescing
    /// window; already counted, ignored.
    Duplicate,

    /// Distinct sample arriving too soon after the previous one.
    /// Ignored to bound per-session ledger write rate.
    RateLimited,

    /// Sample failed validation (bad duration, over ceiling). Ignored.
    Rejected,

    /// Credit was lost: the ledger refused every write attempt.
    Dropped,
}

impl IngestOutcome {
    /// Short label for structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AppliedAnonymous => "applied-anonymous",
            Self::Duplicate => "duplicate",
            Self::RateLimited => "rate-limited",
            Self::Rejected => "rejected",
            Self::Dropped => "dropped",
        }
    }
}

/// Errors crossing the reconciler boundary.
#[derive(Debug, Clone, Error)]
pub enum ReconcilerError {
    /// The actor is gone; the daemon is shutting down.
    #[error("reconciler channel closed")]
    ChannelClosed,

    /// A read against the ledger store failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(IngestOutcome::Applied { new_total: 5 }.label(), "applied");
        assert_eq!(IngestOutcome::Duplicate.label(), "duplicate");
        assert_eq!(IngestOutcome::RateLimited.label(), "rate-limited");
        assert_eq!(IngestOutcome::Dropped.label(), "dropped");
    }

    #[test]
    fn test_error_display() {
        let err = ReconcilerError::ChannelClosed;
        assert_eq!(err.to_string(), "reconciler channel closed");

        let err = ReconcilerError::Ledger(LedgerError::Unavailable("disk".to_string()));
        assert_eq!(err.to_string(), "ledger error: ledger store unavailable: disk");
    }

    #[tokio::test]
    async fn test_command_oneshot_pattern() {
        let (tx, rx) = oneshot::channel::<IngestOutcome>();
        tokio::spawn(async move {
            tx.send(IngestOutcome::Duplicate).ok();
        });
        assert_eq!(rx.await.unwrap(), IngestOutcome::Duplicate);
    }
}
