//! Response bodies for the reporting surface.

use chrono::NaiveDate;
use pulse_core::DailyUsage;
use serde::{Deserialize, Serialize};

/// One day's total for the authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub day: NaiveDate,
    pub total_active_seconds: u64,
    pub sample_count: u64,
}

impl UsageResponse {
    /// Builds the response for a day, treating an absent ledger entry
    /// as zero usage rather than an error.
    pub fn from_entry(day: NaiveDate, entry: Option<&DailyUsage>) -> Self {
        match entry {
            Some(usage) => Self {
                day,
                total_active_seconds: usage.total_active_seconds,
                sample_count: usage.sample_count,
            },
            None => Self {
                day,
                total_active_seconds: 0,
                sample_count: 0,
            },
        }
    }
}

/// One row of a range query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDay {
    pub day: NaiveDate,
    pub total_active_seconds: u64,
}

/// Inclusive range of daily totals. Days with no recorded usage are
/// omitted rather than zero-filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRangeResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<UsageDay>,
}

/// Body of error responses on the reporting surface (the ingestion
/// endpoint never returns one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_usage_response_zero_fills_absent_entry() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let response = UsageResponse::from_entry(day, None);
        assert_eq!(response.total_active_seconds, 0);
        assert_eq!(response.sample_count, 0);
    }

    #[test]
    fn test_usage_response_from_entry() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let mut usage = DailyUsage::empty(Utc::now());
        usage.apply(150, Utc::now());

        let response = UsageResponse::from_entry(day, Some(&usage));
        assert_eq!(response.total_active_seconds, 150);
        assert_eq!(response.sample_count, 1);
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let json = serde_json::to_string(&UsageResponse::from_entry(day, None)).unwrap();
        assert!(json.contains("\"day\":\"2026-08-24\""));
        assert!(json.contains("\"totalActiveSeconds\":0"));
        assert!(json.contains("\"sampleCount\":0"));
    }
}
