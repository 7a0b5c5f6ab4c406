//! Active/Idle engagement state machine.
//!
//! The engine is pure: every operation takes the current instant as an
//! argument and performs no I/O, so the full transition table is
//! testable without sleeping.
//!
//! # Credit rule
//!
//! Active time is credited from `credited_until` (the start of the
//! uncredited span) to the **last observed signal**. Time after the
//! last signal is provisional and is only credited once another signal
//! arrives before the idle deadline. Two properties fall out
//! structurally:
//! - reported time never exceeds true wall-clock active time, and
//! - an idle gap is never part of a credited span (on resume the span
//!   restarts at the resume instant).

use pulse_core::{ReportReason, TelemetryConfig};
use std::time::Duration;
use tokio::time::Instant;

/// The two states of the engagement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// Interaction seen recently; time is accruing.
    Active,

    /// No interaction for at least the idle threshold.
    Idle,
}

/// Kinds of raw interaction signals.
///
/// Any one of these is evidence of engagement. The kind is context for
/// trace logging only; it does not affect crediting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Pointer,
    Key,
    Click,
    Scroll,
    Touch,
}

impl SignalKind {
    /// Parses a signal word as emitted by host adapters.
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "pointer" => Some(Self::Pointer),
            "key" => Some(Self::Key),
            "click" => Some(Self::Click),
            "scroll" => Some(Self::Scroll),
            "touch" => Some(Self::Touch),
            _ => None,
        }
    }
}

/// One flush produced by the engine: a capped, non-zero credit ready to
/// become an `ActivitySample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    pub active_seconds: u32,
    pub reason: ReportReason,
}

/// The engagement state machine for one session.
pub struct ActivityEngine {
    idle_threshold: Duration,
    heartbeat: Duration,
    ceiling_secs: u32,

    state: ActivityState,
    /// Start of the span not yet credited to any report.
    credited_until: Instant,
    /// Most recent interaction signal.
    last_signal: Instant,
    /// Next periodic emission while Active.
    next_heartbeat: Instant,
    /// The current active span began with an idle-to-active resume.
    resumed: bool,
    torn_down: bool,
}

impl ActivityEngine {
    /// Creates an engine in the `Active` state (a session that starts
    /// is assumed engaged; credit still requires signals).
    pub fn new(config: &TelemetryConfig, now: Instant) -> Self {
        Self {
            idle_threshold: config.idle_threshold(),
            heartbeat: config.heartbeat(),
            ceiling_secs: config.report_ceiling_secs,
            state: ActivityState::Active,
            credited_until: now,
            last_signal: now,
            next_heartbeat: now + config.heartbeat(),
            resumed: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active && !self.torn_down
    }

    /// Records one coalesced interaction signal.
    ///
    /// `Idle -> Active` restarts the creditable span at `now`, so the
    /// idle gap is excluded by construction. Never emits a report.
    pub fn on_signal(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        match self.state {
            ActivityState::Active => {
                self.last_signal = now;
            }
            ActivityState::Idle => {
                self.state = ActivityState::Active;
                self.credited_until = now;
                self.last_signal = now;
                self.next_heartbeat = now + self.heartbeat;
                self.resumed = true;
            }
        }
    }

    /// Deadline at which the session flips to Idle, if armed.
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.is_active().then(|| self.last_signal + self.idle_threshold)
    }

    /// Next heartbeat emission, if armed.
    pub fn heartbeat_deadline(&self) -> Option<Instant> {
        self.is_active().then(|| self.next_heartbeat)
    }

    /// Fires the idle transition once its deadline has passed.
    ///
    /// Flushes the credit accumulated up to the last signal - the
    /// silent stretch between last signal and detection is exactly what
    /// must not be counted.
    pub fn on_idle_deadline(&mut self, now: Instant) -> Option<Flush> {
        let deadline = self.idle_deadline()?;
        if now < deadline {
            return None;
        }
        self.state = ActivityState::Idle;
        self.take_credit()
    }

    /// Fires a periodic emission and re-arms the heartbeat.
    pub fn on_heartbeat(&mut self, now: Instant) -> Option<Flush> {
        if !self.is_active() {
            return None;
        }
        self.next_heartbeat = now + self.heartbeat;
        self.take_credit()
    }

    /// Final flush on session teardown. Idempotent: the first call
    /// yields any residual credit, later calls yield nothing.
    pub fn on_teardown(&mut self) -> Option<Flush> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;
        if self.state != ActivityState::Active {
            return None;
        }
        let flush = self.take_credit()?;
        Some(Flush {
            reason: ReportReason::Teardown,
            ..flush
        })
    }

    /// Consumes the creditable span and resets the accumulator.
    ///
    /// The credit is capped at the per-report ceiling and the
    /// accumulator resets to zero either way; sub-second remainder and
    /// over-ceiling excess are dropped (bounded undercount, never an
    /// overcount). Zero-credit flushes are suppressed.
    fn take_credit(&mut self) -> Option<Flush> {
        let span = self.last_signal.saturating_duration_since(self.credited_until);
        self.credited_until = self.last_signal;

        let seconds = span.as_secs().min(u64::from(self.ceiling_secs)) as u32;
        if seconds == 0 {
            return None;
        }

        let reason = if self.resumed {
            ReportReason::ResumeFromIdle
        } else {
            ReportReason::Periodic
        };
        self.resumed = false;

        Some(Flush {
            active_seconds: seconds,
            reason,
        })
    }
}
