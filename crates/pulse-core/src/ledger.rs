//! Daily usage ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate record for one `(user, day)` bucket.
///
/// `total_active_seconds` is monotonically non-decreasing: only
/// accepted samples increase it, and nothing in this subsystem ever
/// decreases or deletes an entry (retention is an external concern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Running total of accepted active seconds.
    pub total_active_seconds: u64,

    /// Number of samples folded into the total. Bookkeeping only.
    pub sample_count: u64,

    /// When the entry was last touched. Bookkeeping only.
    pub last_updated_at: DateTime<Utc>,
}

impl DailyUsage {
    /// Creates an empty entry, stamped with its creation time.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_active_seconds: 0,
            sample_count: 0,
            last_updated_at: now,
        }
    }

    /// Folds one accepted sample into the entry and returns the new
    /// total. The delta has already been validated against the
    /// per-report ceiling, so a single call moves the total by at most
    /// that much.
    pub fn apply(&mut self, delta_seconds: u32, now: DateTime<Utc>) -> u64 {
        self.total_active_seconds += u64::from(delta_seconds);
        self.sample_count += 1;
        self.last_updated_at = now;
        self.total_active_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_accumulates() {
        let now = Utc::now();
        let mut usage = DailyUsage::empty(now);

        assert_eq!(usage.apply(60, now), 60);
        assert_eq!(usage.apply(45, now), 105);
        assert_eq!(usage.sample_count, 2);
    }

    #[test]
    fn test_totals_never_decrease() {
        let now = Utc::now();
        let mut usage = DailyUsage::empty(now);
        let mut last = 0;
        for delta in [0, 60, 1, 0, 59] {
            let total = usage.apply(delta, now);
            assert!(total >= last);
            last = total;
        }
        assert_eq!(last, 120);
    }
}
