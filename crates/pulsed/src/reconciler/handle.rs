//! Client-facing handle for the reconciler actor.

use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{ActivitySample, DailyUsage, DayKey, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::reconciler::commands::{IngestOutcome, ReconcilerCommand, ReconcilerError};

/// Handle for interacting with the reconciler.
///
/// Cheap to clone; every HTTP request handler gets one. All methods
/// return `ReconcilerError::ChannelClosed` once the daemon is shutting
/// down and the actor is gone.
#[derive(Clone)]
pub struct ReconcilerHandle {
    sender: mpsc::Sender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    pub fn new(sender: mpsc::Sender<ReconcilerCommand>) -> Self {
        Self { sender }
    }

    /// Reconciles one sample, stamped with the server receipt time.
    pub async fn ingest(
        &self,
        sample: ActivitySample,
        received_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, ReconcilerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Ingest {
                sample: Box::new(sample),
                received_at,
                respond_to: tx,
            })
            .await
            .map_err(|_| ReconcilerError::ChannelClosed)?;
        rx.await.map_err(|_| ReconcilerError::ChannelClosed)
    }

    /// Reads one day's usage for a user.
    pub async fn get_usage(&self, key: DayKey) -> Result<Option<DailyUsage>, ReconcilerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::GetUsage {
                key,
                respond_to: tx,
            })
            .await
            .map_err(|_| ReconcilerError::ChannelClosed)?;
        rx.await.map_err(|_| ReconcilerError::ChannelClosed)?
    }

    /// Reads an inclusive range of daily totals for a user.
    pub async fn get_usage_range(
        &self,
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, DailyUsage)>, ReconcilerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::GetUsageRange {
                user,
                from,
                to,
                respond_to: tx,
            })
            .await
            .map_err(|_| ReconcilerError::ChannelClosed)?;
        rx.await.map_err(|_| ReconcilerError::ChannelClosed)?
    }
}
