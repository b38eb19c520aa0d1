//! Staleness metadata carried by collection reads.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use tally_core::{Record, RecordId, Timestamp};

/// Result of a collection read.
///
/// The records are shared and immutable; callers that need to reshape
/// them copy out.
#[derive(Debug, Clone)]
pub struct CollectionRead {
    records: Arc<[Record]>,
    cached_at: Option<Timestamp>,
    is_stale: bool,
    was_cache_hit: bool,
}

impl CollectionRead {
    /// Nothing cached yet.
    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            cached_at: None,
            is_stale: false,
            was_cache_hit: false,
        }
    }

    pub fn from_cache(records: Arc<[Record]>, cached_at: Timestamp, is_stale: bool) -> Self {
        Self {
            records,
            cached_at: Some(cached_at),
            is_stale,
            was_cache_hit: true,
        }
    }

    pub fn from_fetch(records: Arc<[Record]>) -> Self {
        Self {
            records,
            cached_at: Some(Utc::now()),
            is_stale: false,
            was_cache_hit: false,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn shared_records(&self) -> Arc<[Record]> {
        Arc::clone(&self.records)
    }

    pub fn find(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `None` when the scope has never been populated.
    pub fn cached_at(&self) -> Option<Timestamp> {
        self.cached_at
    }

    /// Populated at some point (possibly stale).
    pub fn is_populated(&self) -> bool {
        self.cached_at.is_some()
    }

    /// Older than the staleness horizon: a hint, not an answer.
    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn staleness(&self) -> Duration {
        match self.cached_at {
            Some(cached_at) => Utc::now()
                .signed_duration_since(cached_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Arc<[Record]> {
        let list: Vec<Record> = vec![
            Record::from_value(json!({"id": "a"})).unwrap(),
            Record::from_value(json!({"id": "b"})).unwrap(),
        ];
        Arc::from(list)
    }

    #[test]
    fn test_empty_read_is_unpopulated() {
        let read = CollectionRead::empty();
        assert!(read.is_empty());
        assert!(!read.is_populated());
        assert!(!read.was_cache_hit());
        assert_eq!(read.staleness(), Duration::ZERO);
    }

    #[test]
    fn test_cache_read_staleness() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let read = CollectionRead::from_cache(records(), past, true);

        assert!(read.was_cache_hit());
        assert!(read.is_stale());
        let staleness = read.staleness();
        assert!(staleness >= Duration::from_secs(4));
        assert!(staleness <= Duration::from_secs(10));
    }

    #[test]
    fn test_find_by_id() {
        let read = CollectionRead::from_fetch(records());
        assert_eq!(read.len(), 2);
        assert!(read.find(&RecordId::new("b")).is_some());
        assert!(read.find(&RecordId::new("z")).is_none());
    }
}
