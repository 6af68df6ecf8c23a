//! Cache entries and their lifecycle metadata.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Lifecycle state of an entry.
///
/// Failed loads are discarded rather than kept in an error state; see
/// [`CacheStats::load_failures`](super::CacheStats::load_failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// A loader is running; the value is not available yet.
    Loading,
    Ready,
}

/// A cached value plus the metadata eviction decisions are based on.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: Option<V>,
    status: EntryStatus,
    max_age: Duration,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    size_bytes: u64,
    /// Insertion order, breaks ties between equal `created_at` instants.
    created_seq: u64,
    /// Access order, breaks ties between equal `last_accessed` instants.
    accessed_seq: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn loading(now: Instant, seq: u64) -> Self {
        Self {
            value: None,
            status: EntryStatus::Loading,
            max_age: Duration::ZERO,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes: 0,
            created_seq: seq,
            accessed_seq: seq,
        }
    }

    pub(crate) fn ready(value: V, max_age: Duration, size_bytes: u64, now: Instant, seq: u64) -> Self {
        Self {
            value: Some(value),
            status: EntryStatus::Ready,
            max_age,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            created_seq: seq,
            accessed_seq: seq,
        }
    }

    /// Record a successful read.
    pub(crate) fn access(&mut self, now: Instant, seq: u64) {
        self.last_accessed = now;
        self.accessed_seq = seq;
        self.access_count += 1;
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub(crate) fn into_value(self) -> Option<V> {
        self.value
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == EntryStatus::Ready
    }

    /// Zero means the entry never expires.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Ready entries older than their `max_age` are expired.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.is_ready() && !self.max_age.is_zero() && self.age(now) > self.max_age
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub(crate) fn fifo_rank(&self) -> (Instant, u64) {
        (self.created_at, self.created_seq)
    }

    pub(crate) fn lru_rank(&self) -> (Instant, u64) {
        (self.last_accessed, self.accessed_seq)
    }

    pub(crate) fn lfu_rank(&self) -> (u64, Instant, u64) {
        (self.access_count, self.last_accessed, self.accessed_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_updates_stats() {
        let start = Instant::now();
        let mut entry = CacheEntry::ready("v", Duration::ZERO, 1, start, 0);
        assert_eq!(entry.access_count(), 0);

        let later = start + Duration::from_millis(5);
        entry.access(later, 1);
        entry.access(later, 2);
        assert_eq!(entry.access_count(), 2);
        assert_eq!(entry.last_accessed(), later);
        assert_eq!(entry.created_at(), start);
    }

    #[test]
    fn test_expiry() {
        let start = Instant::now();
        let entry = CacheEntry::ready(1, Duration::from_millis(50), 1, start, 0);
        assert!(!entry.is_expired_at(start + Duration::from_millis(50)));
        assert!(entry.is_expired_at(start + Duration::from_millis(51)));

        let forever = CacheEntry::ready(1, Duration::ZERO, 1, start, 0);
        assert!(!forever.is_expired_at(start + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_loading_entries_never_expire() {
        let start = Instant::now();
        let entry: CacheEntry<u8> = CacheEntry::loading(start, 0);
        assert_eq!(entry.status(), EntryStatus::Loading);
        assert!(entry.value().is_none());
        assert!(!entry.is_expired_at(start + Duration::from_secs(60)));
    }
}
