//! Sharded request-scoped attribute store.
//!
//! [`RequestStore`] is the public surface: every operation resolves the
//! request's [`Databag`] through the [`ShardSelector`] and takes that shard's
//! read or write lock for a single map operation.
//!
//! ```
//! use reqscope_core::{RequestId, RequestStore};
//!
//! let store = RequestStore::new();
//! let id = RequestId::mint();
//!
//! store.set(id, "user", "alice".to_string());
//! assert_eq!(store.get::<String>(id, "user").as_deref().map(String::as_str), Some("alice"));
//!
//! store.clear(id);
//! assert!(store.get_all_ok(id).is_none());
//! ```

use std::any::Any;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::attribute::{AttributeKey, AttributeMap, AttributeValue};
use crate::clock::{ClockSource, SystemClock};
use crate::databag::Databag;
use crate::error::StoreError;
use crate::identity::RequestId;
use crate::shard::{ShardSelector, DEFAULT_SHARD_COUNT};

static GLOBAL: OnceLock<Arc<RequestStore>> = OnceLock::new();

/// Request-scoped attribute storage partitioned over independently locked shards.
pub struct RequestStore {
    bags: Box<[Databag]>,
    selector: ShardSelector,
    clock: Arc<dyn ClockSource>,
}

impl RequestStore {
    /// Creates a store with [`DEFAULT_SHARD_COUNT`] shards and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ShardSelector::default(), Arc::new(SystemClock))
    }

    /// Creates a store with `shard_count` shards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidShardCount`] if `shard_count` is zero.
    pub fn with_shards(shard_count: usize) -> Result<Self, StoreError> {
        Ok(Self::build(ShardSelector::new(shard_count)?, Arc::new(SystemClock)))
    }

    /// Creates a store with `shard_count` shards timestamped by `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidShardCount`] if `shard_count` is zero.
    pub fn with_clock(
        shard_count: usize,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self, StoreError> {
        Ok(Self::build(ShardSelector::new(shard_count)?, clock))
    }

    fn build(selector: ShardSelector, clock: Arc<dyn ClockSource>) -> Self {
        let bags = (0..selector.count()).map(|_| Databag::new()).collect();
        Self {
            bags,
            selector,
            clock,
        }
    }

    /// The process-wide store, created on first use with default settings.
    ///
    /// Returned as an `Arc` so it can be handed to components that hold an
    /// owned store handle, such as the server's lifecycle middleware.
    pub fn global() -> &'static Arc<RequestStore> {
        GLOBAL.get_or_init(|| Arc::new(RequestStore::new()))
    }

    fn bag(&self, id: RequestId) -> &Databag {
        &self.bags[self.selector.select(id)]
    }

    // -- Attribute operations ------------------------------------------------

    /// Stores `value` under `key` for the request, replacing any previous value.
    ///
    /// The first write for a request registers it and records its creation time.
    pub fn set<V: Any + Send + Sync>(&self, id: RequestId, key: impl Into<AttributeKey>, value: V) {
        self.set_value(id, key, AttributeValue::new(value));
    }

    /// Stores an already type-erased value.
    pub fn set_value(&self, id: RequestId, key: impl Into<AttributeKey>, value: AttributeValue) {
        let key = key.into();
        let now = self.clock.now_secs();
        self.bag(id).write(id, now, |table| {
            table.insert(key, value);
        });
    }

    /// Returns the value under `key` as a `T`.
    ///
    /// `None` covers an unregistered request, an unset key, and a value of a
    /// different type alike. Use [`get_ok`](Self::get_ok) to tell them apart.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, id: RequestId, key: &str) -> Option<Arc<T>> {
        self.get_ok(id, key)?.downcast::<T>()
    }

    /// Returns the raw stored value; `Some` exactly when the key is present.
    #[must_use]
    pub fn get_ok(&self, id: RequestId, key: &str) -> Option<AttributeValue> {
        self.bag(id)
            .read(id, |table| table.and_then(|t| t.get(key)).cloned())
    }

    /// Returns an independent copy of every attribute for the request.
    ///
    /// Empty when the request is not registered. Values are shared with the
    /// store; only the map is copied.
    #[must_use]
    pub fn get_all(&self, id: RequestId) -> AttributeMap {
        self.get_all_ok(id).unwrap_or_default()
    }

    /// Like [`get_all`](Self::get_all), but `None` when the request is not
    /// registered. A registered request with no remaining keys yields
    /// `Some` of an empty map.
    #[must_use]
    pub fn get_all_ok(&self, id: RequestId) -> Option<AttributeMap> {
        self.bag(id).read(id, |table| table.cloned())
    }

    /// Removes a single key. No-op for an absent key or unregistered request.
    ///
    /// The request stays registered even when its last key is removed.
    pub fn delete(&self, id: RequestId, key: &str) {
        self.bag(id).modify(id, |table| {
            table.remove(key);
        });
    }

    /// Drops every attribute and the creation timestamp for the request.
    ///
    /// Idempotent. Returns whether the request was registered.
    pub fn clear(&self, id: RequestId) -> bool {
        self.bag(id).remove(id)
    }

    // -- Introspection -------------------------------------------------------

    /// Whether the request currently has an attribute table.
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.bag(id).read(id, |table| table.is_some())
    }

    /// Creation second of the request's table, if registered.
    #[must_use]
    pub fn created_at(&self, id: RequestId) -> Option<i64> {
        self.bag(id).created_at(id)
    }

    /// Number of registered requests across all shards.
    ///
    /// Shards are counted one at a time, so the total is approximate while
    /// other threads are writing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bags.iter().map(Databag::len).sum()
    }

    /// Whether no request is registered in any shard.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bags.iter().all(Databag::is_empty)
    }

    /// Total shard count.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.selector.count()
    }

    /// Shard index the request's table lives in.
    #[must_use]
    pub fn shard_of(&self, id: RequestId) -> usize {
        self.selector.select(id)
    }

    // -- Staleness sweeping --------------------------------------------------

    /// Removes tables created more than `max_age_secs` ago from every shard.
    ///
    /// A non-positive `max_age_secs` removes everything. Returns the number of
    /// requests removed. Any removal means some request escaped the lifecycle
    /// wrapper, so nonzero counts are logged as warnings.
    pub fn purge(&self, max_age_secs: i64) -> usize {
        let cutoff = self.cutoff(max_age_secs);
        self.bags
            .iter()
            .enumerate()
            .map(|(index, bag)| Self::purge_bag(index, bag, cutoff))
            .sum()
    }

    /// Like [`purge`](Self::purge), restricted to one shard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShardOutOfRange`] if `index` is not a valid shard.
    pub fn purge_shard(&self, index: usize, max_age_secs: i64) -> Result<usize, StoreError> {
        let bag = self.bags.get(index).ok_or(StoreError::ShardOutOfRange {
            index,
            count: self.bags.len(),
        })?;
        Ok(Self::purge_bag(index, bag, self.cutoff(max_age_secs)))
    }

    fn cutoff(&self, max_age_secs: i64) -> Option<i64> {
        (max_age_secs > 0).then(|| self.clock.now_secs().saturating_sub(max_age_secs))
    }

    fn purge_bag(index: usize, bag: &Databag, cutoff: Option<i64>) -> usize {
        let purged = bag.purge(cutoff);
        if purged > 0 {
            warn!(
                shard = index,
                purged = purged,
                "purged stale request attributes; a request was not cleared after completion"
            );
        }
        purged
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestStore")
            .field("shard_count", &self.selector.count())
            .field("registered", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_subscriber::layer::{self, Layer, SubscriberExt};

    use super::*;
    use crate::clock::ManualClock;

    const USER: AttributeKey = AttributeKey::from_static("user");
    const ROLE: AttributeKey = AttributeKey::from_static("role");

    fn string(store: &RequestStore, id: RequestId, key: &str) -> Option<String> {
        store.get::<String>(id, key).map(|s| (*s).clone())
    }

    // ---- Absent requests ----

    #[test]
    fn fresh_request_reads_absent() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        assert!(store.get_all_ok(id).is_none());
        assert!(store.get_ok(id, "anything").is_none());
        assert!(store.get::<String>(id, "anything").is_none());
        assert!(store.get_all(id).is_empty());
        assert!(!store.contains(id));
    }

    // ---- Set / get ----

    #[test]
    fn set_then_get_ok() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, USER, "alice".to_string());

        let value = store.get_ok(id, &USER).expect("present");
        assert_eq!(value.downcast_ref::<String>().unwrap(), "alice");

        let all = store.get_all_ok(id).expect("registered");
        assert_eq!(all.len(), 1);
        assert_eq!(all["user"].downcast_ref::<String>().unwrap(), "alice");
    }

    #[test]
    fn overwrite_returns_latest() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "k", 1_u32);
        store.set(id, "k", 2_u32);
        assert_eq!(store.get::<u32>(id, "k").as_deref(), Some(&2));
        assert_eq!(store.get_all(id).len(), 1);
    }

    #[test]
    fn get_ok_distinguishes_unit_value_from_absent() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "marker", ());
        store.set(id, "maybe", Option::<u8>::None);

        assert!(store.get_ok(id, "marker").is_some());
        assert!(store.get_ok(id, "maybe").is_some());
        assert!(store.get_ok(id, "missing").is_none());
    }

    #[test]
    fn get_with_wrong_type_is_none_but_present() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "n", 5_i64);
        assert!(store.get::<i32>(id, "n").is_none());
        assert!(store.get_ok(id, "n").is_some());
    }

    #[test]
    fn set_value_keeps_shared_handle() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        let value = AttributeValue::new(vec![1, 2, 3]);
        store.set_value(id, "v", value.clone());
        assert!(store.get_ok(id, "v").unwrap().ptr_eq(&value));
    }

    // ---- Delete ----

    #[test]
    fn delete_removes_key() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "k", 1_u8);
        store.delete(id, "k");
        assert!(store.get_ok(id, "k").is_none());
    }

    #[test]
    fn delete_last_key_keeps_request_registered() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "k", 1_u8);
        store.delete(id, "k");
        let all = store.get_all_ok(id).expect("still registered");
        assert!(all.is_empty());
    }

    #[test]
    fn delete_absent_is_noop() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.delete(id, "never-set");
        assert!(!store.contains(id), "delete must not register a request");

        store.set(id, "k", 1_u8);
        store.delete(id, "other");
        assert!(store.get_ok(id, "k").is_some());
    }

    // ---- Clear ----

    #[test]
    fn clear_drops_everything() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "a", 1_u8);
        store.set(id, "b", 2_u8);
        assert!(store.clear(id));
        assert!(store.get_all_ok(id).is_none());
        assert!(store.created_at(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_unregistered_is_noop() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        assert!(!store.clear(id));
        assert!(!store.clear(id));
    }

    #[test]
    fn set_after_clear_starts_fresh_table() {
        let clock = Arc::new(ManualClock::new(100));
        let store = RequestStore::with_clock(4, clock.clone()).unwrap();
        let id = RequestId::mint();
        store.set(id, "old", 1_u8);
        store.clear(id);

        clock.set(200);
        store.set(id, "new", 2_u8);
        assert!(store.get_ok(id, "old").is_none());
        assert_eq!(store.created_at(id), Some(200));
    }

    // ---- Isolation and snapshots ----

    #[test]
    fn distinct_requests_are_independent() {
        let store = RequestStore::new();
        let r1 = RequestId::mint();
        let r2 = RequestId::mint();
        store.set(r1, "k", "v1".to_string());
        assert!(store.get_ok(r2, "k").is_none());

        store.set(r2, "k", "v2".to_string());
        store.clear(r1);
        assert_eq!(string(&store, r2, "k").as_deref(), Some("v2"));
    }

    #[test]
    fn get_all_is_a_snapshot() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, "k", 1_u32);

        let mut snapshot = store.get_all(id);
        snapshot.insert(AttributeKey::new("injected"), AttributeValue::new(0_u8));
        snapshot.remove("k");
        assert!(store.get_ok(id, "injected").is_none());
        assert_eq!(store.get::<u32>(id, "k").as_deref(), Some(&1));

        let before = store.get_all(id);
        store.set(id, "k", 3_u32);
        assert_eq!(before["k"].downcast_ref::<u32>(), Some(&1));
    }

    // ---- End to end ----

    #[test]
    fn user_role_scenario() {
        let store = RequestStore::new();
        let id = RequestId::mint();
        store.set(id, USER, "alice".to_string());
        store.set(id, ROLE, "admin".to_string());

        let all: HashMap<String, String> = store
            .get_all(id)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.downcast_ref::<String>().unwrap().clone()))
            .collect();
        let expected: HashMap<String, String> = [
            ("user".to_string(), "alice".to_string()),
            ("role".to_string(), "admin".to_string()),
        ]
        .into();
        assert_eq!(all, expected);

        store.clear(id);
        assert!(store.get_all_ok(id).is_none());
    }

    // ---- Construction ----

    #[test]
    fn zero_shards_rejected() {
        assert!(matches!(
            RequestStore::with_shards(0),
            Err(StoreError::InvalidShardCount { count: 0 })
        ));
    }

    #[test]
    fn shard_of_matches_count() {
        let store = RequestStore::with_shards(3).unwrap();
        assert_eq!(store.shard_count(), 3);
        for _ in 0..50 {
            assert!(store.shard_of(RequestId::mint()) < 3);
        }
    }

    #[test]
    fn global_is_a_singleton() {
        assert!(Arc::ptr_eq(RequestStore::global(), RequestStore::global()));
        assert_eq!(RequestStore::global().shard_count(), DEFAULT_SHARD_COUNT);
    }

    // ---- Purge ----

    fn aged_store() -> (Arc<ManualClock>, RequestStore, RequestId, RequestId) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = RequestStore::with_clock(8, clock.clone()).unwrap();
        let old = RequestId::mint();
        store.set(old, "k", 1_u8);
        clock.advance(100);
        let young = RequestId::mint();
        store.set(young, "k", 2_u8);
        (clock, store, old, young)
    }

    #[test]
    fn purge_removes_only_stale() {
        let (clock, store, old, young) = aged_store();
        clock.advance(30);
        // now = 1130; cutoff = 1070; old created at 1000, young at 1100
        assert_eq!(store.purge(60), 1);
        assert!(!store.contains(old));
        assert!(store.contains(young));
    }

    #[test]
    fn purge_at_exact_age_keeps_entry() {
        let (_clock, store, old, _young) = aged_store();
        // now = 1100; cutoff = 1000; old created at 1000 is not older than cutoff
        assert_eq!(store.purge(100), 0);
        assert!(store.contains(old));
    }

    #[test]
    fn purge_non_positive_removes_all() {
        let (_clock, store, _old, _young) = aged_store();
        assert_eq!(store.purge(0), 2);
        assert!(store.is_empty());

        let (_clock, store, _old, _young) = aged_store();
        assert_eq!(store.purge(-5), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_shard_targets_one_shard() {
        let (_clock, store, old, young) = aged_store();
        let shard = store.shard_of(old);
        let expected = if store.shard_of(young) == shard { 2 } else { 1 };
        assert_eq!(store.purge_shard(shard, 0).unwrap(), expected);
        assert!(!store.contains(old));
    }

    /// Counts `WARN` events emitted on the current thread.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings<R>(f: impl FnOnce() -> R) -> (R, usize) {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, warnings.load(Ordering::SeqCst))
    }

    #[test]
    fn purge_warns_once_per_shard_with_removals() {
        let (_clock, store, old, young) = aged_store();
        let shards_touched = if store.shard_of(old) == store.shard_of(young) { 1 } else { 2 };

        let (purged, warnings) = count_warnings(|| store.purge(0));
        assert_eq!(purged, 2);
        assert_eq!(warnings, shards_touched);
    }

    #[test]
    fn purge_without_removals_is_silent() {
        let (_clock, store, _old, _young) = aged_store();

        let (purged, warnings) = count_warnings(|| store.purge(3_600));
        assert_eq!(purged, 0);
        assert_eq!(warnings, 0);

        let (purged, warnings) = count_warnings(|| store.purge_shard(0, 3_600).unwrap());
        assert_eq!(purged, 0);
        assert_eq!(warnings, 0);
    }

    #[test]
    fn purge_shard_out_of_range() {
        let store = RequestStore::with_shards(2).unwrap();
        assert_eq!(
            store.purge_shard(2, 0),
            Err(StoreError::ShardOutOfRange { index: 2, count: 2 })
        );
    }

    // ---- Concurrency ----

    #[test]
    fn concurrent_disjoint_requests_lose_no_updates() {
        let store = RequestStore::with_shards(16).unwrap();
        let threads = 8;
        let per_thread = 200;

        std::thread::scope(|s| {
            for t in 0..threads {
                let store = &store;
                s.spawn(move || {
                    for i in 0..per_thread {
                        let id = RequestId::mint();
                        store.set(id, "thread", t);
                        store.set(id, "iter", i);
                        store.set(id, "scratch", 0_u8);
                        store.delete(id, "scratch");

                        assert_eq!(store.get::<usize>(id, "thread").as_deref(), Some(&t));
                        assert_eq!(store.get::<usize>(id, "iter").as_deref(), Some(&i));
                        assert!(store.get_ok(id, "scratch").is_none());
                        assert_eq!(store.get_all(id).len(), 2);

                        store.clear(id);
                        assert!(store.get_all_ok(id).is_none());
                    }
                });
            }
        });

        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_on_one_request() {
        let store = RequestStore::with_shards(4).unwrap();
        let id = RequestId::mint();

        std::thread::scope(|s| {
            for t in 0..8_usize {
                let store = &store;
                s.spawn(move || {
                    for i in 0..100_usize {
                        store.set(id, format!("t{t}-{i}"), i);
                        let _ = store.get_all(id);
                    }
                });
            }
        });

        assert_eq!(store.get_all(id).len(), 800);
        assert_eq!(store.len(), 1);
    }
}
