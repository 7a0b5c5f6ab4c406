//! Telemetry tuning knobs shared by monitor and daemon.

use crate::error::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default idle threshold: no interaction for this long flips a
/// session from Active to Idle.
pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 300;

/// Default heartbeat: periodic report emission interval while Active.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 60;

/// Default per-report ceiling: maximum active seconds a single sample
/// may carry. Bounds the damage of any one bad report.
pub const DEFAULT_REPORT_CEILING_SECS: u32 = 60;

/// Default duplicate-coalescing window: a retried sample landing this
/// close to its original is collapsed.
pub const DEFAULT_COALESCE_WINDOW_SECS: u64 = 2;

/// Default session-window eviction: server-side dedup state for a
/// session is dropped after this much inactivity.
pub const DEFAULT_WINDOW_EVICTION_SECS: u64 = 600;

/// The five tunables of the telemetry pipeline.
///
/// Every field has a compiled-in default, so a missing or partial
/// config file degrades gracefully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Seconds without interaction before a session is considered idle.
    pub idle_threshold_secs: u64,

    /// Seconds between periodic report emissions while active.
    pub heartbeat_secs: u64,

    /// Maximum active seconds a single report may carry.
    pub report_ceiling_secs: u32,

    /// Seconds within which an identical retried sample is collapsed.
    pub coalesce_window_secs: u64,

    /// Seconds of server-side silence before a session window is
    /// evicted.
    pub window_eviction_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: DEFAULT_IDLE_THRESHOLD_SECS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            report_ceiling_secs: DEFAULT_REPORT_CEILING_SECS,
            coalesce_window_secs: DEFAULT_COALESCE_WINDOW_SECS,
            window_eviction_secs: DEFAULT_WINDOW_EVICTION_SECS,
        }
    }
}

impl TelemetryConfig {
    /// Validates that every tunable is usable (non-zero).
    pub fn validate(&self) -> DomainResult<()> {
        let fields = [
            ("idle_threshold_secs", self.idle_threshold_secs),
            ("heartbeat_secs", self.heartbeat_secs),
            ("report_ceiling_secs", u64::from(self.report_ceiling_secs)),
            ("coalesce_window_secs", self.coalesce_window_secs),
            ("window_eviction_secs", self.window_eviction_secs),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(DomainError::InvalidConfig {
                    field: field.to_string(),
                    reason: "must be non-zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_secs(self.coalesce_window_secs)
    }

    pub fn window_eviction(&self) -> Duration {
        Duration::from_secs(self.window_eviction_secs)
    }
}
