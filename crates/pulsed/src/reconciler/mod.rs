//! Session reconciliation using the actor pattern.
//!
//! The reconciler is the single decision point for every activity
//! sample the daemon receives. It receives commands via a tokio mpsc
//! channel and owns the canonical per-session dedup state:
//!
//! ```text
//! HTTP handler ──ReconcilerCommand──▶ ReconcilerActor ──▶ LedgerStore
//!                  (mpsc channel)      SessionWindow map     daily totals
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use pulse_core::TelemetryConfig;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::{ReconcilerActor, LEDGER_RETRIES, MAX_SESSION_WINDOWS};
pub use commands::{IngestOutcome, ReconcilerCommand, ReconcilerError};
pub use handle::ReconcilerHandle;

/// Command channel buffer size.
const COMMAND_BUFFER: usize = 256;

/// Spawns the reconciler actor and its eviction sweep task, returning
/// a handle for client use.
pub fn spawn_reconciler(
    ledger: Arc<dyn crate::ledger::LedgerStore>,
    config: TelemetryConfig,
    cancel: CancellationToken,
) -> ReconcilerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = ReconcilerActor::new(cmd_rx, ledger, config.clone());
    tokio::spawn(actor.run());

    spawn_eviction_task(cmd_tx.clone(), &config, cancel);

    ReconcilerHandle::new(cmd_tx)
}

/// Spawns a background task that periodically triggers window
/// eviction. Sweeps at a tenth of the eviction timeout (at least every
/// second) so a window outlives its deadline by a bounded slack.
fn spawn_eviction_task(
    sender: mpsc::Sender<ReconcilerCommand>,
    config: &TelemetryConfig,
    cancel: CancellationToken,
) {
    let sweep = Duration::from_secs((config.window_eviction_secs / 10).max(1));
    tokio::spawn(async move {
        let mut ticker = interval(sweep);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Eviction task stopping: shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let command = ReconcilerCommand::EvictIdleWindows {
                        now: chrono::Utc::now(),
                    };
                    if sender.send(command).await.is_err() {
                        debug!("Eviction task stopping: reconciler channel closed");
                        break;
                    }
                }
            }
        }
    });
}
