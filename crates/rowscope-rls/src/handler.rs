//! Policy collaborator seam.
//!
//! The interceptor asks a [`DataScopeHandler`] for the current permission
//! code and the resolved [`DataScope`]. How scopes are resolved (role tables,
//! organization trees, ...) is up to the implementation.
//!
//! [`CachedDataScopeHandler`] layers a bounded, expiring policy cache over
//! any handler. Only resolved scopes are cached, never rewritten SQL: the
//! same statement can carry different variable bindings on every call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use rowscope_core::{CacheConfig, DataScope, UserId};
use serde::Serialize;

/// Resolves data scopes for the current request.
pub trait DataScopeHandler: Send + Sync {
    /// Permission code of the current request, if it has one.
    fn permission_code(&self) -> Option<String>;

    /// The user the current request runs as.
    fn current_user_id(&self) -> Option<UserId>;

    /// Resolve the scope for `permission_code`.
    ///
    /// `Ok(None)` means no policy is configured for the code.
    fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>>;
}

impl<H: DataScopeHandler + ?Sized> DataScopeHandler for Arc<H> {
    fn permission_code(&self) -> Option<String> {
        (**self).permission_code()
    }

    fn current_user_id(&self) -> Option<UserId> {
        (**self).current_user_id()
    }

    fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>> {
        (**self).data_scope(permission_code)
    }
}

/// Handler with a fixed identity and a fixed permission → scope table.
#[derive(Debug, Clone, Default)]
pub struct FixedScopeHandler {
    permission_code: Option<String>,
    user_id: Option<UserId>,
    scopes: HashMap<String, DataScope>,
}

impl FixedScopeHandler {
    pub fn new(permission_code: impl Into<String>, user_id: UserId) -> Self {
        Self {
            permission_code: Some(permission_code.into()),
            user_id: Some(user_id),
            scopes: HashMap::new(),
        }
    }

    /// A handler for requests that carry no permission code.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Register `scope` under its own permission code.
    pub fn with_scope(mut self, scope: DataScope) -> Self {
        self.scopes.insert(scope.permission_code.clone(), scope);
        self
    }
}

impl DataScopeHandler for FixedScopeHandler {
    fn permission_code(&self) -> Option<String> {
        self.permission_code.clone()
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.user_id
    }

    fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>> {
        Ok(self.scopes.get(permission_code).cloned())
    }
}

type CacheKey = (UserId, String);

/// Default time a resolved scope stays cached.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached scopes.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Caches resolved scopes per (user, permission code).
///
/// Entries expire after a fixed time-to-live and the cache is bounded in
/// size. Requests without a current user bypass the cache. "No policy
/// configured" is not cached, so a newly configured policy takes effect on
/// the next call.
///
/// Invalidation bumps a generation counter. A lookup that started resolving
/// before an invalidation drops the entry it inserted, so a stale scope never
/// outlives the invalidation that should have removed it.
pub struct CachedDataScopeHandler<H> {
    inner: H,
    cache: Cache<CacheKey, DataScope>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<H: DataScopeHandler> CachedDataScopeHandler<H> {
    pub fn new(inner: H) -> Self {
        Self::with_limits(inner, DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    /// Build a cache with the TTL and capacity from configuration.
    pub fn from_config(inner: H, config: &CacheConfig) -> Self {
        Self::with_limits(inner, config.ttl(), config.max_capacity)
    }

    pub fn with_limits(inner: H, ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Drop every cached scope of `user_id`. Call when the user's roles change.
    pub fn invalidate_user(&self, user_id: UserId) {
        self.invalidate_matching(|(user, _)| *user == user_id);
        tracing::debug!(user_id, "Invalidated data scope cache for user");
    }

    /// Drop every cached scope for `permission_code`. Call when its rules change.
    pub fn invalidate_permission(&self, permission_code: &str) {
        self.invalidate_matching(|(_, code)| code == permission_code);
        tracing::debug!(permission_code, "Invalidated data scope cache for permission");
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        tracing::debug!("Invalidated all data scope cache entries");
    }

    fn invalidate_matching(&self, matches: impl Fn(&CacheKey) -> bool) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for (key, _) in self.cache.iter() {
            if matches(&key) {
                self.cache.invalidate(&*key);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        // Eviction and invalidation are applied lazily.
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}

impl<H: DataScopeHandler> DataScopeHandler for CachedDataScopeHandler<H> {
    fn permission_code(&self) -> Option<String> {
        self.inner.permission_code()
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.inner.current_user_id()
    }

    fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>> {
        let Some(user_id) = self.inner.current_user_id() else {
            return self.inner.data_scope(permission_code);
        };
        let key = (user_id, permission_code.to_string());

        if let Some(scope) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(scope));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::SeqCst);
        let resolved = self.inner.data_scope(permission_code)?;
        if let Some(scope) = &resolved {
            self.cache.insert(key.clone(), scope.clone());
            // Invalidations bump the generation before they remove entries,
            // so either they see this insert or this check sees them.
            if self.generation.load(Ordering::SeqCst) != generation {
                self.cache.invalidate(&key);
                tracing::debug!(
                    user_id,
                    permission_code,
                    "Data scope cache invalidated while resolving, dropping entry"
                );
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowscope_core::DataScopeType;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    /// Counts how often the inner handler is asked.
    struct CountingHandler {
        user_id: UserId,
        calls: AtomicUsize,
    }

    impl DataScopeHandler for CountingHandler {
        fn permission_code(&self) -> Option<String> {
            Some("order:list".to_string())
        }

        fn current_user_id(&self) -> Option<UserId> {
            Some(self.user_id)
        }

        fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if permission_code == "unconfigured" {
                return Ok(None);
            }
            Ok(Some(DataScope::new(
                DataScopeType::SelfOnly,
                self.user_id,
                permission_code,
            )))
        }
    }

    fn cached() -> CachedDataScopeHandler<CountingHandler> {
        CachedDataScopeHandler::new(CountingHandler {
            user_id: 7,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let handler = cached();
        handler.data_scope("order:list").unwrap();
        handler.data_scope("order:list").unwrap();

        assert_eq!(handler.inner().calls.load(Ordering::SeqCst), 1);
        let stats = handler.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_missing_policy_not_cached() {
        let handler = cached();
        assert!(handler.data_scope("unconfigured").unwrap().is_none());
        assert!(handler.data_scope("unconfigured").unwrap().is_none());
        assert_eq!(handler.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(handler.stats().entries, 0);
    }

    #[test]
    fn test_invalidation() {
        let handler = cached();
        handler.data_scope("order:list").unwrap();
        handler.data_scope("order:export").unwrap();
        assert_eq!(handler.stats().entries, 2);

        handler.invalidate_permission("order:list");
        assert_eq!(handler.stats().entries, 1);

        handler.invalidate_user(8);
        assert_eq!(handler.stats().entries, 1);
        handler.invalidate_user(7);
        assert_eq!(handler.stats().entries, 0);

        handler.data_scope("order:list").unwrap();
        handler.invalidate_all();
        assert_eq!(handler.stats().entries, 0);
    }

    #[test]
    fn test_concurrent_lookups() {
        let handler = Arc::new(cached());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let handler = Arc::clone(&handler);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let scope = handler.data_scope("order:list").unwrap().unwrap();
                        assert_eq!(scope.current_user_id, 7);
                        if i == 0 {
                            handler.invalidate_permission("order:list");
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let stats = handler.stats();
        assert_eq!(stats.hits + stats.misses, 400);
    }

    /// Resolves from a mutable policy table. The first lookup parks between
    /// reading the table and returning until the test releases it.
    struct SlowPolicyStore {
        scope_type: Mutex<DataScopeType>,
        park_first: AtomicBool,
        gate: Barrier,
    }

    impl DataScopeHandler for SlowPolicyStore {
        fn permission_code(&self) -> Option<String> {
            Some("order:list".to_string())
        }

        fn current_user_id(&self) -> Option<UserId> {
            Some(7)
        }

        fn data_scope(&self, permission_code: &str) -> anyhow::Result<Option<DataScope>> {
            let scope_type = *self.scope_type.lock().unwrap();
            if self.park_first.swap(false, Ordering::SeqCst) {
                self.gate.wait();
                self.gate.wait();
            }
            Ok(Some(DataScope::new(scope_type, 7, permission_code)))
        }
    }

    #[test]
    fn test_invalidation_during_resolve_is_not_lost() {
        let handler = Arc::new(CachedDataScopeHandler::new(SlowPolicyStore {
            scope_type: Mutex::new(DataScopeType::All),
            park_first: AtomicBool::new(true),
            gate: Barrier::new(2),
        }));

        let resolving = {
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler.data_scope("order:list").unwrap().unwrap())
        };

        // The lookup has read the old policy and is parked.
        handler.inner().gate.wait();
        *handler.inner().scope_type.lock().unwrap() = DataScopeType::SelfOnly;
        handler.invalidate_user(7);
        handler.inner().gate.wait();

        assert_eq!(resolving.join().unwrap().scope_type, DataScopeType::All);
        let scope = handler.data_scope("order:list").unwrap().unwrap();
        assert_eq!(scope.scope_type, DataScopeType::SelfOnly);
    }

    #[test]
    fn test_capacity_bounds_entries() {
        let handler = CachedDataScopeHandler::with_limits(
            CountingHandler {
                user_id: 7,
                calls: AtomicUsize::new(0),
            },
            DEFAULT_CACHE_TTL,
            2,
        );
        for i in 0..20 {
            handler.data_scope(&format!("perm:{}", i)).unwrap();
        }
        assert!(handler.stats().entries <= 2);
    }

    #[test]
    fn test_entries_expire() {
        let handler = CachedDataScopeHandler::with_limits(
            CountingHandler {
                user_id: 7,
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(50),
            DEFAULT_CACHE_CAPACITY,
        );
        handler.data_scope("order:list").unwrap();
        thread::sleep(Duration::from_millis(120));
        handler.data_scope("order:list").unwrap();
        assert_eq!(handler.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            max_capacity: 1,
            ..CacheConfig::default()
        };
        let handler = CachedDataScopeHandler::from_config(
            CountingHandler {
                user_id: 7,
                calls: AtomicUsize::new(0),
            },
            &config,
        );
        handler.data_scope("a").unwrap();
        handler.data_scope("b").unwrap();
        handler.data_scope("c").unwrap();
        assert!(handler.stats().entries <= 1);
    }

    #[test]
    fn test_fixed_handler() {
        let handler = FixedScopeHandler::new("order:list", 3)
            .with_scope(DataScope::new(DataScopeType::All, 3, "order:list"));
        assert_eq!(handler.permission_code().as_deref(), Some("order:list"));
        assert!(handler.data_scope("order:list").unwrap().is_some());
        assert!(handler.data_scope("other").unwrap().is_none());
        assert!(FixedScopeHandler::anonymous().permission_code().is_none());
    }
}
