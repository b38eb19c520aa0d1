//! Resource cache with explicit staleness and single-flight population.
//!
//! # Population
//!
//! A collection and the per-id entries derived from it are written under
//! one lock, so a reader never sees a collection whose records are not
//! also reachable through [`RecordKey`].
//!
//! # Staleness
//!
//! Entries older than [`CacheConfig::staleness_horizon`] are still served
//! by [`ResourceCache::get_collection`] but flagged stale, and
//! [`ResourceCache::get_one`] refetches instead of trusting them.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResourceCache::new(client, CacheConfig::default());
//! cache.prefetch(ResourceKind::Item, &tenant);
//!
//! // Later, from a detail view
//! match cache.get_one(ResourceKind::Item, &tenant, &item_id).await? {
//!     Some(item) => render(item),
//!     None => not_found(),
//! }
//!
//! // After a mutation
//! cache.invalidate(ResourceKind::Item, &tenant);
//! ```

pub mod error;
pub mod freshness;
pub mod keys;
pub mod resource_cache;
pub mod traits;

pub use error::{CacheError, CacheResult};
pub use freshness::CollectionRead;
pub use keys::{RecordKey, ScopeKey};
pub use resource_cache::{CacheConfig, ResourceCache};
pub use traits::{CacheStats, CollectionFetcher};
