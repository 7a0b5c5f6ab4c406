//! Activity sample domain entities and value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Unique identifier for one client session (one tab/process lifetime).
///
/// Wraps an opaque string, normally a UUID generated once when the
/// activity monitor starts. Immutable for the life of that monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a SessionId from a string.
    ///
    /// Note: This does not validate the format. The monitor generates
    /// the id, so we trust its shape; the server treats it as opaque.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh session id for a new monitor.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 8 characters).
    ///
    /// Useful for compact log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }

    /// Returns true if the id is empty (malformed client input).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of an authenticated user.
///
/// Resolved server-side from the caller's bearer token, never taken
/// from the request body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Report Reason
// ============================================================================

/// Why a sample was emitted.
///
/// Drives reconciler handling: `teardown` samples bypass request-rate
/// limiting (a burst of closing tabs must not be throttled away) but
/// are still validated and deduplicated like everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportReason {
    /// Steady-state heartbeat emission while active.
    Periodic,

    /// First report covering an active span that began with an
    /// idle-to-active transition.
    ResumeFromIdle,

    /// Best-effort final flush on session teardown.
    Teardown,
}

impl ReportReason {
    /// Returns the wire/display label for this reason.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::ResumeFromIdle => "resume-from-idle",
            Self::Teardown => "teardown",
        }
    }

    /// Returns true for teardown samples, which skip rate limiting.
    #[must_use]
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Teardown)
    }
}

impl fmt::Display for ReportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Activity Sample
// ============================================================================

/// One client-emitted measurement of active duration for a session.
///
/// The monitor is the only component that fabricates samples. Every
/// sample is bounded by the per-report ceiling, so no single report can
/// move the aggregate by an unbounded amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    /// Opaque per-tab/process session identifier.
    pub session_id: SessionId,

    /// Authenticated user, if known. Anonymous samples carry `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Active duration being reported, in whole seconds.
    pub active_seconds: u32,

    /// Client-side generation timestamp. Diagnostics only - never used
    /// for ordering or day attribution (client clocks are not trusted).
    pub observed_at: DateTime<Utc>,

    /// Free-form page context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Free-form device context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Why this sample was emitted.
    pub reason: ReportReason,
}

impl ActivitySample {
    /// Creates a sample with the required fields; context is optional.
    pub fn new(session_id: SessionId, reason: ReportReason, active_seconds: u32) -> Self {
        Self {
            session_id,
            user_id: None,
            active_seconds,
            observed_at: Utc::now(),
            page: None,
            device: None,
            reason,
        }
    }

    /// Attaches the authenticated user.
    #[must_use]
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Attaches free-form page/device context.
    #[must_use]
    pub fn with_context(mut self, page: Option<String>, device: Option<String>) -> Self {
        self.page = page;
        self.device = device;
        self
    }

    /// Returns true if this sample respects the per-report ceiling.
    pub fn within_ceiling(&self, ceiling_secs: u32) -> bool {
        self.active_seconds <= ceiling_secs
    }
}
