//! Timer-driven monitor task wrapping the engagement engine.
//!
//! The monitor owns two logical timers - the idle deadline and the
//! heartbeat - multiplexed with the signal channel in a single
//! `select!` loop. Nothing here blocks the caller: signals are pushed
//! through a bounded channel and report delivery is fire-and-forget.

use std::sync::Arc;

use pulse_core::{ActivitySample, SessionId, TelemetryConfig, UserId};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::engine::{ActivityEngine, Flush, SignalKind};
use crate::reporter::Reporter;

/// Buffer for coalesced interaction signals. Overflow drops signals,
/// which is coalescing at work, not data loss: one queued signal
/// already proves engagement.
const SIGNAL_BUFFER: usize = 64;

/// Idle-state timers are parked on a deadline far enough out to never
/// fire; signals or cancellation wake the loop first.
const PARKED: Duration = Duration::from_secs(86_400 * 365);

/// Static context attached to every sample this monitor emits.
#[derive(Debug, Clone, Default)]
pub struct MonitorContext {
    pub user_id: Option<UserId>,
    pub page: Option<String>,
    pub device: Option<String>,
}

/// Cheap-to-clone handle for feeding interaction signals to a monitor.
#[derive(Clone)]
pub struct SignalHandle {
    sender: mpsc::Sender<SignalKind>,
}

impl SignalHandle {
    /// Records one interaction signal. Non-blocking; a full buffer
    /// silently coalesces the signal away.
    pub fn touch(&self, kind: SignalKind) {
        let _ = self.sender.try_send(kind);
    }
}

/// One client session's activity monitor.
///
/// Generates its session id once at spawn; the id is immutable for the
/// monitor's life. `stop()` is idempotent and performs the best-effort
/// teardown flush; dropping the monitor without stopping cancels the
/// task so no timers leak across host teardowns.
pub struct ActivityMonitor {
    session_id: SessionId,
    signals: mpsc::Sender<SignalKind>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ActivityMonitor {
    /// Spawns the monitor task.
    pub fn spawn(
        config: TelemetryConfig,
        context: MonitorContext,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let session_id = SessionId::generate();
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_monitor(
            config,
            session_id.clone(),
            context,
            reporter,
            signal_rx,
            cancel.clone(),
        ));

        Self {
            session_id,
            signals: signal_tx,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Returns this monitor's session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns a handle for pushing interaction signals.
    pub fn handle(&self) -> SignalHandle {
        SignalHandle {
            sender: self.signals.clone(),
        }
    }

    /// Stops the monitor: clears both timers, attempts one final
    /// teardown flush, and waits for the task to finish. Safe to call
    /// any number of times.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The monitor event loop.
///
/// Recomputes both deadlines from engine state on every iteration, so
/// a state transition re-arms or parks the right timer without any
/// bookkeeping here.
async fn run_monitor(
    config: TelemetryConfig,
    session_id: SessionId,
    context: MonitorContext,
    reporter: Arc<dyn Reporter>,
    mut signals: mpsc::Receiver<SignalKind>,
    cancel: CancellationToken,
) {
    let mut engine = ActivityEngine::new(&config, Instant::now());
    debug!(session_id = %session_id.short(), "Activity monitor started");

    loop {
        let idle_at = engine.idle_deadline().unwrap_or_else(parked);
        let heartbeat_at = engine.heartbeat_deadline().unwrap_or_else(parked);

        tokio::select! {
            _ = cancel.cancelled() => {
                teardown_flush(&mut engine, &session_id, &context, reporter.as_ref());
                break;
            }

            signal = signals.recv() => {
                match signal {
                    Some(kind) => {
                        trace!(session_id = %session_id.short(), ?kind, "Interaction signal");
                        engine.on_signal(Instant::now());
                    }
                    None => {
                        // All handles dropped: host is gone.
                        teardown_flush(&mut engine, &session_id, &context, reporter.as_ref());
                        break;
                    }
                }
            }

            _ = sleep_until(idle_at) => {
                if let Some(flush) = engine.on_idle_deadline(Instant::now()) {
                    debug!(
                        session_id = %session_id.short(),
                        active_seconds = flush.active_seconds,
                        "Session went idle, flushing"
                    );
                    reporter.report(make_sample(&session_id, &context, flush));
                }
            }

            _ = sleep_until(heartbeat_at) => {
                if let Some(flush) = engine.on_heartbeat(Instant::now()) {
                    debug!(
                        session_id = %session_id.short(),
                        active_seconds = flush.active_seconds,
                        reason = %flush.reason,
                        "Heartbeat flush"
                    );
                    reporter.report(make_sample(&session_id, &context, flush));
                }
            }
        }
    }

    debug!(session_id = %session_id.short(), "Activity monitor stopped");
}

fn teardown_flush(
    engine: &mut ActivityEngine,
    session_id: &SessionId,
    context: &MonitorContext,
    reporter: &dyn Reporter,
) {
    if let Some(flush) = engine.on_teardown() {
        debug!(
            session_id = %session_id.short(),
            active_seconds = flush.active_seconds,
            "Teardown flush"
        );
        reporter.report_teardown(make_sample(session_id, context, flush));
    }
}

fn make_sample(session_id: &SessionId, context: &MonitorContext, flush: Flush) -> ActivitySample {
    ActivitySample::new(session_id.clone(), flush.reason, flush.active_seconds)
        .with_user(context.user_id.clone())
        .with_context(context.page.clone(), context.device.clone())
}

fn parked() -> Instant {
    Instant::now() + PARKED
}
