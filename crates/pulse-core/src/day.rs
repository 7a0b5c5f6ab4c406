//! Day bucketing for ledger attribution.

use crate::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key for one user's ledger entry on one calendar day.
///
/// The day is always derived from the **server's receipt time**, never
/// from the client-supplied `observed_at`. This sidesteps client clock
/// skew entirely: a sample counts toward the day the server saw it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub user: UserId,
    pub day: NaiveDate,
}

impl DayKey {
    pub fn new(user: UserId, day: NaiveDate) -> Self {
        Self { user, day }
    }

    /// Buckets a sample received at `received_at` (server clock).
    pub fn for_receipt(user: UserId, received_at: DateTime<Utc>) -> Self {
        Self {
            user,
            day: received_at.date_naive(),
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.day.format("%Y-%m-%d"))
    }
}
