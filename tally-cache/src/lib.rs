//! Tally Cache - Resource Collection Cache
//!
//! Caches list-shaped backend resources per `(kind, tenant)` scope and
//! indexes every cached record by id. Staleness is explicit on every read.

pub mod cache;

pub use cache::{
    CacheConfig, CacheError, CacheResult, CacheStats, CollectionFetcher, CollectionRead,
    RecordKey, ResourceCache, ScopeKey,
};
