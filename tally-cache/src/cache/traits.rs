//! Fetcher trait and cache statistics.

use async_trait::async_trait;
use tally_core::{Record, ResourceKind, TallyResult, TenantId};

/// Source of whole collections, usually the HTTP gateway client.
///
/// Implementations return the full collection for a scope in backend
/// order. Errors are passed through to cache callers.
#[async_trait]
pub trait CollectionFetcher: Send + Sync + 'static {
    async fn fetch_collection(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
    ) -> TallyResult<Vec<Record>>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that had to fetch or found nothing.
    pub misses: u64,
    /// Collection fetches actually issued.
    pub fetches: u64,
    /// Populated scopes.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
