//! The reconciler actor - single owner of session window state.
//!
//! All samples flow through one actor task, so window updates and
//! ledger increments for a session are naturally serialized: no locks,
//! no torn read-modify-write between dedup check and ledger fold.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_core::{ActivitySample, DayKey, ReportReason, SessionId, TelemetryConfig};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::ledger::LedgerStore;
use crate::reconciler::commands::{IngestOutcome, ReconcilerCommand};

/// Maximum session windows held at once. At capacity, the stalest
/// window is evicted to admit a new session.
pub const MAX_SESSION_WINDOWS: usize = 10_000;

/// Ledger write attempts per sample before the credit is dropped.
pub const LEDGER_RETRIES: u32 = 3;

/// Backoff before the first retry; doubles per attempt.
const RETRY_BASE: Duration = Duration::from_millis(50);

/// Server-side dedup state for one session.
///
/// A window only remembers the last accepted sample; the coalescing
/// check never needs more history than that.
#[derive(Debug, Clone)]
struct SessionWindow {
    last_accepted_at: DateTime<Utc>,
    last_active_seconds: u32,
    last_reason: ReportReason,
}

/// The reconciler actor.
pub struct ReconcilerActor {
    receiver: mpsc::Receiver<ReconcilerCommand>,
    ledger: Arc<dyn LedgerStore>,
    config: TelemetryConfig,
    windows: HashMap<SessionId, SessionWindow>,
}

impl ReconcilerActor {
    pub fn new(
        receiver: mpsc::Receiver<ReconcilerCommand>,
        ledger: Arc<dyn LedgerStore>,
        config: TelemetryConfig,
    ) -> Self {
        Self {
            receiver,
            ledger,
            config,
            windows: HashMap::new(),
        }
    }

    /// Main actor loop. Runs until all command senders are dropped.
    pub async fn run(mut self) {
        info!("Reconciler actor started");
        while let Some(command) = self.receiver.recv().await {
            self.handle_command(command).await;
        }
        info!("Reconciler actor stopped");
    }

    async fn handle_command(&mut self, command: ReconcilerCommand) {
        match command {
            ReconcilerCommand::Ingest {
                sample,
                received_at,
                respond_to,
            } => {
                let outcome = self.ingest(*sample, received_at).await;
                let _ = respond_to.send(outcome);
            }
            ReconcilerCommand::GetUsage { key, respond_to } => {
                let result = self.ledger.get(&key).map_err(Into::into);
                let _ = respond_to.send(result);
            }
            ReconcilerCommand::GetUsageRange {
                user,
                from,
                to,
                respond_to,
            } => {
                let result = self.ledger.get_range(&user, from, to).map_err(Into::into);
                let _ = respond_to.send(result);
            }
            ReconcilerCommand::EvictIdleWindows { now } => {
                self.evict_idle_windows(now);
            }
        }
    }

    /// Reconciles one sample.
    ///
    /// Decision order matters: validation, then the coalescing check
    /// against the session window, then capacity, then the ledger fold.
    /// A duplicate never refreshes the window timestamp - otherwise a
    /// retry storm could keep a dead session's window alive forever.
    async fn ingest(&mut self, sample: ActivitySample, received_at: DateTime<Utc>) -> IngestOutcome {
        let session = sample.session_id.short().to_string();

        if sample.session_id.is_empty() || !sample.within_ceiling(self.config.report_ceiling_secs) {
            debug!(
                session_id = %session,
                active_seconds = sample.active_seconds,
                "Sample rejected"
            );
            return IngestOutcome::Rejected;
        }

        if let Some(window) = self.windows.get(&sample.session_id) {
            let elapsed = received_at - window.last_accepted_at;
            if elapsed <= chrono::Duration::from_std(self.config.coalesce_window())
                .unwrap_or_else(|_| chrono::Duration::seconds(2))
                && elapsed >= chrono::Duration::zero()
            {
                let identical = window.last_active_seconds == sample.active_seconds
                    && window.last_reason == sample.reason;
                if identical {
                    debug!(session_id = %session, "Duplicate sample coalesced");
                    return IngestOutcome::Duplicate;
                }
                if !sample.reason.is_teardown() {
                    debug!(session_id = %session, "Sample rate limited");
                    return IngestOutcome::RateLimited;
                }
                // Teardown is the session's last word; let it through.
            }
        } else if self.windows.len() >= MAX_SESSION_WINDOWS {
            self.evict_stalest();
        }

        self.windows.insert(
            sample.session_id.clone(),
            SessionWindow {
                last_accepted_at: received_at,
                last_active_seconds: sample.active_seconds,
                last_reason: sample.reason,
            },
        );

        let Some(user) = sample.user_id.clone() else {
            debug!(session_id = %session, "Anonymous sample accepted, no ledger credit");
            return IngestOutcome::AppliedAnonymous;
        };

        let key = DayKey::for_receipt(user, received_at);
        let mut backoff = RETRY_BASE;
        for attempt in 1..=LEDGER_RETRIES {
            match self
                .ledger
                .increment(&key, sample.active_seconds, received_at)
            {
                Ok(new_total) => {
                    debug!(
                        session_id = %session,
                        day_key = %key,
                        delta = sample.active_seconds,
                        new_total,
                        reason = %sample.reason,
                        "Credit applied"
                    );
                    return IngestOutcome::Applied { new_total };
                }
                Err(err) if attempt < LEDGER_RETRIES => {
                    warn!(
                        session_id = %session,
                        attempt,
                        error = %err,
                        "Ledger increment failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => {
                    warn!(
                        session_id = %session,
                        day_key = %key,
                        delta = sample.active_seconds,
                        error = %err,
                        "Ledger increment failed after retries, dropping credit"
                    );
                    return IngestOutcome::Dropped;
                }
            }
        }

        // Unreachable with LEDGER_RETRIES >= 1; keeps the loop total.
        IngestOutcome::Dropped
    }

    /// Drops windows silent past the eviction timeout.
    fn evict_idle_windows(&mut self, now: DateTime<Utc>) {
        let timeout = chrono::Duration::from_std(self.config.window_eviction())
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now - window.last_accepted_at <= timeout);
        let evicted = before - self.windows.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.windows.len(), "Evicted idle session windows");
        }
    }

    /// Removes the window with the oldest acceptance timestamp.
    fn evict_stalest(&mut self) {
        let stalest = self
            .windows
            .iter()
            .min_by_key(|(_, window)| window.last_accepted_at)
            .map(|(id, _)| id.clone());
        if let Some(id) = stalest {
            self.windows.remove(&id);
            warn!(
                session_id = %id.short(),
                capacity = MAX_SESSION_WINDOWS,
                "Window capacity reached, evicted stalest session"
            );
        }
    }

    #[cfg(test)]
    fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, MemoryLedger};
    use chrono::{NaiveDate, TimeZone};
    use pulse_core::{DailyUsage, UserId};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn actor_with(ledger: Arc<dyn LedgerStore>) -> ReconcilerActor {
        let (_tx, rx) = mpsc::channel(1);
        ReconcilerActor::new(rx, ledger, TelemetryConfig::default())
    }

    fn sample(session: &str, user: Option<&str>, seconds: u32, reason: ReportReason) -> ActivitySample {
        ActivitySample::new(SessionId::new(session), reason, seconds)
            .with_user(user.map(UserId::new))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    /// Fails the first `failures` increments, then delegates.
    struct FlakyLedger {
        inner: MemoryLedger,
        failures: AtomicU32,
    }

    impl FlakyLedger {
        fn failing(failures: u32) -> Self {
            Self {
                inner: MemoryLedger::new(),
                failures: AtomicU32::new(failures),
            }
        }
    }

    impl LedgerStore for FlakyLedger {
        fn increment(
            &self,
            key: &DayKey,
            delta_seconds: u32,
            now: DateTime<Utc>,
        ) -> Result<u64, LedgerError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LedgerError::Unavailable("induced".to_string()));
            }
            self.inner.increment(key, delta_seconds, now)
        }

        fn get(&self, key: &DayKey) -> Result<Option<DailyUsage>, LedgerError> {
            self.inner.get(key)
        }

        fn get_range(
            &self,
            user: &UserId,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<(NaiveDate, DailyUsage)>, LedgerError> {
            self.inner.get_range(user, from, to)
        }
    }

    #[tokio::test]
    async fn test_applies_credit_and_returns_new_total() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 60 });

        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 45, ReportReason::Periodic), at(10))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 105 });
    }

    #[tokio::test]
    async fn test_duplicate_within_window_is_coalesced() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;

        // Identical retransmission 1s later.
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(1))
            .await;
        assert_eq!(outcome, IngestOutcome::Duplicate);

        // Same payload outside the window is a fresh report.
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(5))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 120 });
    }

    #[tokio::test]
    async fn test_duplicate_does_not_refresh_window() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;

        // Retries at 1s and 2s are both duplicates of the t0 accept;
        // the second is only a duplicate because t0 never moved.
        for t in [1, 2] {
            let outcome = actor
                .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(t))
                .await;
            assert_eq!(outcome, IngestOutcome::Duplicate);
        }
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(3))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 120 });
    }

    #[tokio::test]
    async fn test_distinct_sample_inside_window_is_rate_limited() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 30, ReportReason::Periodic), at(1))
            .await;
        assert_eq!(outcome, IngestOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_teardown_bypasses_rate_limit() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut actor = actor_with(ledger.clone());
        actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;

        // Closing-tab flush lands 1s after the heartbeat.
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 12, ReportReason::Teardown), at(1))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 72 });
    }

    #[tokio::test]
    async fn test_teardown_retransmission_still_coalesces() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        actor
            .ingest(sample("s-1", Some("u-1"), 12, ReportReason::Teardown), at(0))
            .await;
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 12, ReportReason::Teardown), at(1))
            .await;
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_rejects_over_ceiling_and_empty_session() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 61, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::Rejected);

        let outcome = actor
            .ingest(sample("", Some("u-1"), 10, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::Rejected);
        assert_eq!(actor.window_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_sample_maintains_window_without_credit() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut actor = actor_with(ledger.clone());

        let outcome = actor
            .ingest(sample("s-1", None, 60, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::AppliedAnonymous);

        // The window still deduplicates the retransmission.
        let outcome = actor
            .ingest(sample("s-1", None, 60, ReportReason::Periodic), at(1))
            .await;
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_ledger_retry_recovers_transient_failure() {
        let mut actor = actor_with(Arc::new(FlakyLedger::failing(2)));
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 60 });
    }

    #[tokio::test]
    async fn test_ledger_exhaustion_drops_credit() {
        let ledger = Arc::new(FlakyLedger::failing(LEDGER_RETRIES));
        let mut actor = actor_with(ledger.clone());
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;
        assert_eq!(outcome, IngestOutcome::Dropped);

        // The ledger has recovered; the next sample lands and the
        // dropped credit stays dropped.
        let outcome = actor
            .ingest(sample("s-1", Some("u-1"), 30, ReportReason::Periodic), at(10))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 30 });
    }

    #[tokio::test]
    async fn test_idle_window_eviction() {
        let mut actor = actor_with(Arc::new(MemoryLedger::new()));
        actor
            .ingest(sample("s-old", Some("u-1"), 60, ReportReason::Periodic), at(0))
            .await;
        actor
            .ingest(sample("s-new", Some("u-1"), 60, ReportReason::Periodic), at(500))
            .await;

        // At t700 the old window has been silent 700s (> 600), the new
        // one 200s.
        actor.evict_idle_windows(at(700));
        assert_eq!(actor.window_count(), 1);

        // Post-eviction, an identical retransmission for the evicted
        // session is treated as fresh.
        let outcome = actor
            .ingest(sample("s-old", Some("u-1"), 60, ReportReason::Periodic), at(701))
            .await;
        assert_eq!(outcome, IngestOutcome::Applied { new_total: 180 });
    }

    #[tokio::test]
    async fn test_capacity_evicts_stalest() {
        let (_tx, rx) = mpsc::channel(1);
        let mut actor =
            ReconcilerActor::new(rx, Arc::new(MemoryLedger::new()), TelemetryConfig::default());

        // Fill to capacity with spaced acceptance times.
        for i in 0..MAX_SESSION_WINDOWS {
            actor.windows.insert(
                SessionId::new(format!("s-{i}")),
                SessionWindow {
                    last_accepted_at: at(i as i64),
                    last_active_seconds: 10,
                    last_reason: ReportReason::Periodic,
                },
            );
        }

        let outcome = actor
            .ingest(
                sample("s-fresh", Some("u-1"), 10, ReportReason::Periodic),
                at(MAX_SESSION_WINDOWS as i64 + 10),
            )
            .await;
        assert!(matches!(outcome, IngestOutcome::Applied { .. }));
        assert_eq!(actor.window_count(), MAX_SESSION_WINDOWS);
        assert!(!actor.windows.contains_key(&SessionId::new("s-0")));
        assert!(actor.windows.contains_key(&SessionId::new("s-fresh")));
    }
}
