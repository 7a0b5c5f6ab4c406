//! Parsing and validation of raw activity submissions.
//!
//! A submission that fails validation is a malformed client, not a
//! fatal error: the caller is answered with success either way, and the
//! rejection only shows up in server logs.

use chrono::{DateTime, Utc};
use pulse_core::{ActivitySample, ReportReason, SessionId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw JSON body of a `POST /api/v1/activity` request.
///
/// `active_seconds` is deserialized as a signed integer so a negative
/// submission reaches validation instead of failing opaquely in serde.
/// The authenticated user is never part of the body - it is resolved
/// from the bearer token server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRequest {
    pub session_id: String,
    pub active_seconds: i64,
    pub reason: ReportReason,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl SampleRequest {
    /// Builds the wire form of a monitor-produced sample.
    pub fn from_sample(sample: &ActivitySample) -> Self {
        Self {
            session_id: sample.session_id.as_str().to_string(),
            active_seconds: i64::from(sample.active_seconds),
            reason: sample.reason,
            observed_at: Some(sample.observed_at),
            page: sample.page.clone(),
            device: sample.device.clone(),
        }
    }

    /// Validates the submission and produces a domain sample.
    ///
    /// `received_at` is the server receipt time; it backfills a missing
    /// `observed_at` so every stored sample carries a timestamp.
    pub fn into_sample(
        self,
        ceiling_secs: u32,
        user: Option<UserId>,
        received_at: DateTime<Utc>,
    ) -> Result<ActivitySample, IngestError> {
        if self.session_id.trim().is_empty() {
            return Err(IngestError::MissingField("sessionId"));
        }
        if self.active_seconds < 0 {
            return Err(IngestError::NegativeDuration {
                active_seconds: self.active_seconds,
            });
        }
        if self.active_seconds > i64::from(ceiling_secs) {
            return Err(IngestError::ExceedsCeiling {
                active_seconds: self.active_seconds,
                ceiling: ceiling_secs,
            });
        }

        // Range-checked above, so the narrowing cannot truncate.
        let active_seconds = self.active_seconds as u32;

        Ok(ActivitySample {
            session_id: SessionId::new(self.session_id),
            user_id: user,
            active_seconds,
            observed_at: self.observed_at.unwrap_or(received_at),
            page: self.page,
            device: self.device,
            reason: self.reason,
        })
    }
}

/// Validation failures for raw submissions.
///
/// None of these ever surface to the client; they drive the
/// success-no-op response and a debug log line.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("negative active_seconds: {active_seconds}")]
    NegativeDuration { active_seconds: i64 },

    #[error("active_seconds {active_seconds} exceeds ceiling {ceiling}")]
    ExceedsCeiling { active_seconds: i64, ceiling: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(active_seconds: i64) -> SampleRequest {
        SampleRequest {
            session_id: "tab-1".to_string(),
            active_seconds,
            reason: ReportReason::Periodic,
            observed_at: None,
            page: None,
            device: None,
        }
    }

    #[test]
    fn test_valid_submission() {
        let sample = raw(42)
            .into_sample(60, Some(UserId::new("u-1")), Utc::now())
            .unwrap();
        assert_eq!(sample.active_seconds, 42);
        assert_eq!(sample.user_id, Some(UserId::new("u-1")));
    }

    #[test]
    fn test_negative_rejected() {
        let err = raw(-5).into_sample(60, None, Utc::now()).unwrap_err();
        assert!(matches!(err, IngestError::NegativeDuration { .. }));
    }

    #[test]
    fn test_ceiling_rejected() {
        let err = raw(500).into_sample(60, None, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::ExceedsCeiling { ceiling: 60, .. }
        ));
    }

    #[test]
    fn test_empty_session_id_rejected() {
        let mut request = raw(10);
        request.session_id = "  ".to_string();
        let err = request.into_sample(60, None, Utc::now()).unwrap_err();
        assert!(matches!(err, IngestError::MissingField("sessionId")));
    }

    #[test]
    fn test_missing_observed_at_backfilled_with_receipt_time() {
        let received = Utc::now();
        let sample = raw(1).into_sample(60, None, received).unwrap();
        assert_eq!(sample.observed_at, received);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let json = serde_json::to_string(&raw(10)).unwrap();
        assert!(json.contains("\"sessionId\""));
        assert!(json.contains("\"activeSeconds\""));
        assert!(json.contains("\"reason\":\"periodic\""));
    }

    #[test]
    fn test_round_trip_through_sample() {
        let sample = ActivitySample::new(SessionId::new("tab-9"), ReportReason::Teardown, 45)
            .with_context(Some("/dashboard".to_string()), Some("desktop".to_string()));
        let wire = SampleRequest::from_sample(&sample);
        let parsed = wire.into_sample(60, None, Utc::now()).unwrap();
        assert_eq!(parsed.active_seconds, 45);
        assert_eq!(parsed.reason, ReportReason::Teardown);
        assert_eq!(parsed.page.as_deref(), Some("/dashboard"));
    }
}
