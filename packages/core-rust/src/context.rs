//! Free functions over the process-wide [`RequestStore`].
//!
//! Components that cannot be handed a store reference (deeply nested
//! middleware, library code) reach the shared instance through these
//! wrappers. Each call is exactly the same-named method on
//! [`RequestStore::global`].

use std::any::Any;
use std::sync::Arc;

use crate::attribute::{AttributeKey, AttributeMap, AttributeValue};
use crate::identity::RequestId;
use crate::store::RequestStore;

/// Stores `value` under `key` for the request.
pub fn set<V: Any + Send + Sync>(id: RequestId, key: impl Into<AttributeKey>, value: V) {
    RequestStore::global().set(id, key, value);
}

/// Returns the value under `key` as a `T`, or `None`.
#[must_use]
pub fn get<T: Any + Send + Sync>(id: RequestId, key: &str) -> Option<Arc<T>> {
    RequestStore::global().get(id, key)
}

/// Returns the raw stored value; `Some` exactly when the key is present.
#[must_use]
pub fn get_ok(id: RequestId, key: &str) -> Option<AttributeValue> {
    RequestStore::global().get_ok(id, key)
}

/// Returns a copy of every attribute for the request; empty when unregistered.
#[must_use]
pub fn get_all(id: RequestId) -> AttributeMap {
    RequestStore::global().get_all(id)
}

/// Returns a copy of every attribute, or `None` when the request is not registered.
#[must_use]
pub fn get_all_ok(id: RequestId) -> Option<AttributeMap> {
    RequestStore::global().get_all_ok(id)
}

/// Removes a single key.
pub fn delete(id: RequestId, key: &str) {
    RequestStore::global().delete(id, key);
}

/// Drops every attribute for the request.
pub fn clear(id: RequestId) -> bool {
    RequestStore::global().clear(id)
}

/// Removes tables older than `max_age_secs` from the global store.
pub fn purge(max_age_secs: i64) -> usize {
    RequestStore::global().purge(max_age_secs)
}
