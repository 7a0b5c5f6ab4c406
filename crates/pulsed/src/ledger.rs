//! The daily usage ledger.
//!
//! `LedgerStore` is the persistence seam of the daemon: the reconciler
//! only ever talks to this trait, so a durable backend slots in without
//! touching reconciliation. Ledger entries are append-only in spirit -
//! increments only, no decrement or reset operation exists.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{DailyUsage, DayKey, UserId};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The backend could not complete the operation. The reconciler
    /// treats this as transient and retries.
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("ledger store poisoned")]
    Poisoned,
}

/// Storage contract for daily usage totals.
///
/// Implementations must make `increment` atomic per key: concurrent
/// increments to the same `DayKey` never lose an update. Methods are
/// synchronous; the reconciler actor serializes calls, so a blocking
/// in-process store is fine and an async backend would wrap itself in
/// its own runtime handle.
pub trait LedgerStore: Send + Sync {
    /// Atomically adds `delta_seconds` to the key's total and bumps its
    /// sample count. Returns the new total.
    fn increment(
        &self,
        key: &DayKey,
        delta_seconds: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError>;

    /// Reads one entry, `None` if the key has no recorded usage.
    fn get(&self, key: &DayKey) -> Result<Option<DailyUsage>, LedgerError>;

    /// Reads all entries for `user` with `from <= day <= to`, ordered
    /// by day ascending. Days with no usage are absent.
    fn get_range(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, DailyUsage)>, LedgerError>;
}

/// In-memory ledger. Totals do not survive a daemon restart, which the
/// pipeline tolerates: clients keep reporting and the ledger refills.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<DayKey, DailyUsage>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn increment(
        &self,
        key: &DayKey,
        delta_seconds: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let mut entries = self.entries.write().map_err(|_| LedgerError::Poisoned)?;
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| DailyUsage::empty(now));
        Ok(entry.apply(delta_seconds, now))
    }

    fn get(&self, key: &DayKey) -> Result<Option<DailyUsage>, LedgerError> {
        let entries = self.entries.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn get_range(
        &self,
        user: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, DailyUsage)>, LedgerError> {
        let entries = self.entries.read().map_err(|_| LedgerError::Poisoned)?;
        let mut days: Vec<(NaiveDate, DailyUsage)> = entries
            .iter()
            .filter(|(key, _)| key.user == *user && key.day >= from && key.day <= to)
            .map(|(key, usage)| (key.day, usage.clone()))
            .collect();
        days.sort_by_key(|(day, _)| *day);
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(user: &str, y: i32, m: u32, d: u32) -> DayKey {
        DayKey::new(
            UserId::new(user),
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        )
    }

    #[test]
    fn test_increment_accumulates() {
        let ledger = MemoryLedger::new();
        let key = key("u-1", 2026, 8, 24);
        let now = Utc::now();

        assert_eq!(ledger.increment(&key, 60, now).unwrap(), 60);
        assert_eq!(ledger.increment(&key, 45, now).unwrap(), 105);

        let usage = ledger.get(&key).unwrap().unwrap();
        assert_eq!(usage.total_active_seconds, 105);
        assert_eq!(usage.sample_count, 2);
    }

    #[test]
    fn test_keys_are_isolated() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        ledger.increment(&key("u-1", 2026, 8, 24), 60, now).unwrap();
        ledger.increment(&key("u-2", 2026, 8, 24), 30, now).unwrap();
        ledger.increment(&key("u-1", 2026, 8, 25), 10, now).unwrap();

        assert_eq!(
            ledger
                .get(&key("u-1", 2026, 8, 24))
                .unwrap()
                .unwrap()
                .total_active_seconds,
            60
        );
        assert!(ledger.get(&key("u-2", 2026, 8, 25)).unwrap().is_none());
    }

    #[test]
    fn test_get_range_sorted_and_filtered() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        ledger.increment(&key("u-1", 2026, 8, 23), 10, now).unwrap();
        ledger.increment(&key("u-1", 2026, 8, 21), 20, now).unwrap();
        ledger.increment(&key("u-1", 2026, 8, 25), 30, now).unwrap();
        ledger.increment(&key("u-2", 2026, 8, 22), 99, now).unwrap();

        let from = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let days = ledger.get_range(&UserId::new("u-1"), from, to).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].0, from);
        assert_eq!(days[0].1.total_active_seconds, 20);
        assert_eq!(days[1].1.total_active_seconds, 10);
    }

    #[test]
    fn test_concurrent_increments_lose_nothing() {
        let ledger = Arc::new(MemoryLedger::new());
        let key = key("u-1", 2026, 8, 24);
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let key = key.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    ledger.increment(&key, 1, now).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let usage = ledger.get(&key).unwrap().unwrap();
        assert_eq!(usage.total_active_seconds, 800);
        assert_eq!(usage.sample_count, 800);
    }
}
