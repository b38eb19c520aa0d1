//! Collection cache with single-flight fetches and stale-response guards.
//!
//! Every `(kind, tenant)` scope has an epoch that [`ResourceCache::invalidate`]
//! bumps. A fetch remembers the epoch it started under and only installs its
//! result if the epoch is unchanged, so a response that was in flight
//! across an invalidation never repopulates the cache. Installs also carry
//! a generation number; an older generation never replaces a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tally_core::{Record, RecordId, ResourceKind, TenantId, Timestamp};
use tracing::{debug, warn};

use super::error::{CacheError, CacheResult};
use super::freshness::CollectionRead;
use super::keys::{RecordKey, ScopeKey};
use super::traits::{CacheStats, CollectionFetcher};

type SharedFetch = Shared<BoxFuture<'static, CacheResult<Arc<[Record]>>>>;

/// Configuration for the resource cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which a collection is served only as a hint.
    pub staleness_horizon: Duration,
    /// Whether `get_collection` kicks off a refresh for missing or stale scopes.
    pub background_refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_horizon: Duration::from_secs(60),
            background_refresh: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staleness_horizon(mut self, horizon: Duration) -> Self {
        self.staleness_horizon = horizon;
        self
    }

    pub fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.background_refresh = enabled;
        self
    }
}

struct CollectionEntry {
    records: Arc<[Record]>,
    cached_at: Timestamp,
    generation: u64,
}

struct InFlight {
    generation: u64,
    epoch: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    collections: HashMap<ScopeKey, CollectionEntry>,
    records: HashMap<RecordKey, Record>,
    epochs: HashMap<ScopeKey, u64>,
    in_flight: HashMap<ScopeKey, InFlight>,
    last_generation: u64,
}

impl CacheState {
    fn epoch(&self, scope: &ScopeKey) -> u64 {
        self.epochs.get(scope).copied().unwrap_or(0)
    }

    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    fn drop_scope(&mut self, scope: &ScopeKey) {
        self.collections.remove(scope);
        self.records.retain(|key, _| key.scope() != scope);
    }

    /// Replace a scope's collection and per-id entries in one step.
    fn install(&mut self, scope: &ScopeKey, records: Arc<[Record]>, generation: u64) -> bool {
        if let Some(existing) = self.collections.get(scope) {
            if existing.generation > generation {
                return false;
            }
        }
        self.drop_scope(scope);
        for record in records.iter() {
            self.records
                .insert(scope.record(record.id().clone()), record.clone());
        }
        self.collections.insert(
            scope.clone(),
            CollectionEntry {
                records,
                cached_at: Utc::now(),
                generation,
            },
        );
        true
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

struct Inner<F> {
    fetcher: F,
    config: CacheConfig,
    state: Mutex<CacheState>,
    counters: Counters,
}

impl<F: CollectionFetcher> Inner<F> {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, entry: &CollectionEntry) -> bool {
        let age = Utc::now()
            .signed_duration_since(entry.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age > self.config.staleness_horizon
    }

    async fn run_fetch(
        &self,
        scope: ScopeKey,
        generation: u64,
        epoch: u64,
    ) -> CacheResult<Arc<[Record]>> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(%scope, generation, "fetching collection");
        let result = self
            .fetcher
            .fetch_collection(scope.kind(), scope.tenant())
            .await;

        let mut state = self.lock();
        if state
            .in_flight
            .get(&scope)
            .is_some_and(|flight| flight.generation == generation)
        {
            state.in_flight.remove(&scope);
        }

        match result {
            Ok(records) => {
                let records: Arc<[Record]> = Arc::from(records);
                if state.epoch(&scope) != epoch {
                    debug!(%scope, "scope invalidated while fetching; result not cached");
                } else if !state.install(&scope, Arc::clone(&records), generation) {
                    debug!(%scope, "newer collection already cached; result not cached");
                }
                Ok(records)
            }
            Err(source) => {
                warn!(%scope, error = %source, "collection fetch failed");
                Err(CacheError::Fetch {
                    scope: scope.to_string(),
                    source,
                })
            }
        }
    }
}

/// Per-scope collection cache.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct ResourceCache<F: CollectionFetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: CollectionFetcher> Clone for ResourceCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: CollectionFetcher> ResourceCache<F> {
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                config,
                state: Mutex::new(CacheState::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn with_defaults(fetcher: F) -> Self {
        Self::new(fetcher, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Start populating a scope in the background.
    ///
    /// Never blocks. A scope that is already fresh is left alone, and a
    /// fetch already in flight is reused. Failures are logged only.
    pub fn prefetch(&self, kind: ResourceKind, tenant: &TenantId) {
        let scope = ScopeKey::new(kind, tenant.clone());
        {
            let state = self.inner.lock();
            if let Some(entry) = state.collections.get(&scope) {
                if !self.inner.is_stale(entry) {
                    debug!(%scope, "prefetch skipped; collection is fresh");
                    return;
                }
            }
        }
        self.spawn_fetch(scope);
    }

    /// Whatever is cached for the scope, right now.
    ///
    /// Returns an empty read when nothing is cached and a stale-flagged
    /// read when the entry is past the horizon. Either case schedules a
    /// background refresh if enabled.
    pub fn get_collection(&self, kind: ResourceKind, tenant: &TenantId) -> CollectionRead {
        let scope = ScopeKey::new(kind, tenant.clone());
        let (read, needs_refresh) = {
            let state = self.inner.lock();
            match state.collections.get(&scope) {
                Some(entry) => {
                    let stale = self.inner.is_stale(entry);
                    let read =
                        CollectionRead::from_cache(Arc::clone(&entry.records), entry.cached_at, stale);
                    (read, stale)
                }
                None => (CollectionRead::empty(), true),
            }
        };

        if needs_refresh {
            self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
            if self.inner.config.background_refresh {
                self.spawn_fetch(scope);
            }
        } else {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        read
    }

    /// Fresh collection for the scope, fetching if needed.
    ///
    /// Unlike [`ResourceCache::get_collection`], a failed fetch is returned
    /// to the caller instead of an empty list.
    pub async fn load_collection(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
    ) -> CacheResult<CollectionRead> {
        let scope = ScopeKey::new(kind, tenant.clone());
        {
            let state = self.inner.lock();
            if let Some(entry) = state.collections.get(&scope) {
                if !self.inner.is_stale(entry) {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(CollectionRead::from_cache(
                        Arc::clone(&entry.records),
                        entry.cached_at,
                        false,
                    ));
                }
            }
        }
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        let records = self.start_fetch(scope).await?;
        Ok(CollectionRead::from_fetch(records))
    }

    /// Look up one record, falling back to a full collection fetch.
    ///
    /// Returns `Ok(None)` when the freshly fetched collection does not
    /// contain the id, and `Err` when the fetch itself failed.
    pub async fn get_one(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        record_id: &RecordId,
    ) -> CacheResult<Option<Record>> {
        let scope = ScopeKey::new(kind, tenant.clone());
        {
            let state = self.inner.lock();
            if let Some(entry) = state.collections.get(&scope) {
                if !self.inner.is_stale(entry) {
                    if let Some(record) = state.records.get(&scope.record(record_id.clone())) {
                        self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(Some(record.clone()));
                    }
                }
            }
        }
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        let records = self.start_fetch(scope).await?;
        Ok(records.iter().find(|r| r.id() == record_id).cloned())
    }

    /// Install a collection obtained elsewhere.
    ///
    /// Supersedes any fetch for the scope that is still in flight.
    pub fn populate(&self, kind: ResourceKind, tenant: &TenantId, records: Vec<Record>) {
        let scope = ScopeKey::new(kind, tenant.clone());
        let mut state = self.inner.lock();
        let generation = state.next_generation();
        state.install(&scope, Arc::from(records), generation);
        debug!(%scope, generation, "collection populated");
    }

    /// Drop a scope's collection and per-id entries.
    ///
    /// Mutations call this before returning to their caller. Fetches that
    /// started earlier can still answer their own waiters but will not
    /// repopulate the scope, and later reads never join them.
    pub fn invalidate(&self, kind: ResourceKind, tenant: &TenantId) {
        let scope = ScopeKey::new(kind, tenant.clone());
        let mut state = self.inner.lock();
        Self::invalidate_locked(&mut state, &scope);
        debug!(%scope, "collection invalidated");
    }

    /// Invalidate every resource kind for a tenant.
    pub fn invalidate_tenant(&self, tenant: &TenantId) {
        let mut state = self.inner.lock();
        for kind in ResourceKind::ALL {
            Self::invalidate_locked(&mut state, &ScopeKey::new(kind, tenant.clone()));
        }
        debug!(%tenant, "tenant invalidated");
    }

    /// Invalidate every scope of every tenant.
    ///
    /// Fetches still in flight answer their own waiters but never land.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        let mut scopes: Vec<ScopeKey> = state.collections.keys().cloned().collect();
        scopes.extend(state.in_flight.keys().cloned());
        scopes.extend(state.epochs.keys().cloned());
        scopes.sort();
        scopes.dedup();
        for scope in &scopes {
            Self::invalidate_locked(&mut state, scope);
        }
        state.records.clear();
        debug!(scopes = scopes.len(), "cache cleared");
    }

    fn invalidate_locked(state: &mut CacheState, scope: &ScopeKey) {
        *state.epochs.entry(scope.clone()).or_insert(0) += 1;
        state.drop_scope(scope);
        state.in_flight.remove(scope);
    }

    /// True while a collection fetch for the scope is outstanding.
    pub fn is_fetching(&self, kind: ResourceKind, tenant: &TenantId) -> bool {
        let scope = ScopeKey::new(kind, tenant.clone());
        self.inner.lock().in_flight.contains_key(&scope)
    }

    pub fn stats(&self) -> CacheStats {
        let entry_count = self.inner.lock().collections.len() as u64;
        CacheStats {
            hits: self.inner.counters.hits.load(Ordering::Relaxed),
            misses: self.inner.counters.misses.load(Ordering::Relaxed),
            fetches: self.inner.counters.fetches.load(Ordering::Relaxed),
            entry_count,
        }
    }

    /// Return the outstanding fetch for the scope, or start one.
    fn start_fetch(&self, scope: ScopeKey) -> SharedFetch {
        let mut state = self.inner.lock();
        let epoch = state.epoch(&scope);
        if let Some(existing) = state.in_flight.get(&scope) {
            if existing.epoch == epoch {
                return existing.future.clone();
            }
        }

        let generation = state.next_generation();
        let inner = Arc::clone(&self.inner);
        let key = scope.clone();
        let future = async move { inner.run_fetch(key, generation, epoch).await }
            .boxed()
            .shared();
        state.in_flight.insert(
            scope,
            InFlight {
                generation,
                epoch,
                future: future.clone(),
            },
        );
        future
    }

    fn spawn_fetch(&self, scope: ScopeKey) {
        let future = self.start_fetch(scope.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = future.await {
                        warn!(%scope, error = %err, "background fetch failed");
                    }
                });
            }
            Err(_) => warn!(%scope, "no async runtime; background fetch not started"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tally_core::{TallyError, TallyResult};

    struct StaticFetcher {
        calls: AtomicUsize,
        ids: Vec<&'static str>,
    }

    impl StaticFetcher {
        fn new(ids: Vec<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ids,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CollectionFetcher for StaticFetcher {
        async fn fetch_collection(
            &self,
            _kind: ResourceKind,
            _tenant: &TenantId,
        ) -> TallyResult<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ids
                .iter()
                .map(|id| Record::from_value(json!({ "id": id })))
                .collect()
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl CollectionFetcher for FailingFetcher {
        async fn fetch_collection(
            &self,
            _kind: ResourceKind,
            _tenant: &TenantId,
        ) -> TallyResult<Vec<Record>> {
            Err(TallyError::Transport {
                reason: "connection refused".to_string(),
            })
        }
    }

    fn tenant() -> TenantId {
        TenantId::new("biz-1")
    }

    #[tokio::test]
    async fn test_get_one_fetches_then_serves_from_cache() {
        let cache = ResourceCache::with_defaults(StaticFetcher::new(vec!["a", "b"]));

        let first = cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("a"))
            .await
            .unwrap();
        assert_eq!(first.map(|r| r.id().clone()), Some(RecordId::new("a")));

        let second = cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("b"))
            .await
            .unwrap();
        assert!(second.is_some());
        assert_eq!(cache.fetcher().calls(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_get_one_missing_id_is_none() {
        let cache = ResourceCache::with_defaults(StaticFetcher::new(vec!["a"]));
        let result = cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("zzz"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_is_propagated() {
        let cache = ResourceCache::with_defaults(FailingFetcher);
        let err = cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.source_error(),
            TallyError::Transport { .. }
        ));
        assert!(cache
            .load_collection(ResourceKind::Item, &tenant())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched_by_get_one() {
        let config = CacheConfig::new()
            .with_staleness_horizon(Duration::ZERO)
            .with_background_refresh(false);
        let cache = ResourceCache::new(StaticFetcher::new(vec!["a"]), config);

        cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("a"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache
            .get_one(ResourceKind::Item, &tenant(), &RecordId::new("a"))
            .await
            .unwrap();
        assert_eq!(cache.fetcher().calls(), 2);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let read = cache.get_collection(ResourceKind::Item, &tenant());
        assert!(read.is_stale());
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn test_populate_and_invalidate_without_runtime() {
        let config = CacheConfig::new().with_background_refresh(false);
        let cache = ResourceCache::new(StaticFetcher::new(vec![]), config);
        let records = vec![
            Record::from_value(json!({"id": "x"})).unwrap(),
            Record::from_value(json!({"id": "y"})).unwrap(),
        ];

        cache.populate(ResourceKind::Client, &tenant(), records);
        let read = cache.get_collection(ResourceKind::Client, &tenant());
        assert_eq!(read.len(), 2);
        assert!(read.was_cache_hit());

        cache.invalidate(ResourceKind::Client, &tenant());
        let read = cache.get_collection(ResourceKind::Client, &tenant());
        assert!(read.is_empty());
        assert!(!read.is_populated());
        assert_eq!(cache.fetcher().calls(), 0);
    }

    #[test]
    fn test_invalidate_tenant_leaves_other_tenants() {
        let config = CacheConfig::new().with_background_refresh(false);
        let cache = ResourceCache::new(StaticFetcher::new(vec![]), config);
        let other = TenantId::new("biz-2");
        let one = || vec![Record::from_value(json!({"id": 1})).unwrap()];

        cache.populate(ResourceKind::Item, &tenant(), one());
        cache.populate(ResourceKind::Invoice, &tenant(), one());
        cache.populate(ResourceKind::Item, &other, one());

        cache.invalidate_tenant(&tenant());
        assert!(cache.get_collection(ResourceKind::Item, &tenant()).is_empty());
        assert!(cache.get_collection(ResourceKind::Invoice, &tenant()).is_empty());
        assert_eq!(cache.get_collection(ResourceKind::Item, &other).len(), 1);
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_staleness_horizon(Duration::from_secs(120))
            .with_background_refresh(false);
        assert_eq!(config.staleness_horizon, Duration::from_secs(120));
        assert!(!config.background_refresh);
    }
}
