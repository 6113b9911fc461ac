//! A single independently locked shard of request attribute tables.
//!
//! Each [`Databag`] owns two maps behind one `parking_lot::RwLock`: the
//! attribute tables themselves and the second at which each table was
//! created. Both maps are only ever touched together under the write lock,
//! so an identity is present in one exactly when it is present in the other.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::attribute::AttributeMap;
use crate::identity::RequestId;

#[derive(Debug, Default)]
struct BagTables {
    data: HashMap<RequestId, AttributeMap>,
    created: HashMap<RequestId, i64>,
}

impl BagTables {
    fn remove(&mut self, id: RequestId) -> bool {
        self.created.remove(&id);
        self.data.remove(&id).is_some()
    }
}

/// One shard: attribute tables and creation timestamps for the requests
/// hashed to it.
#[derive(Debug, Default)]
pub struct Databag {
    tables: RwLock<BagTables>,
}

impl Databag {
    /// Creates an empty shard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the request's table under the shared lock.
    ///
    /// `f` receives `None` when the request has no table.
    pub fn read<R>(&self, id: RequestId, f: impl FnOnce(Option<&AttributeMap>) -> R) -> R {
        let tables = self.tables.read();
        f(tables.data.get(&id))
    }

    /// Runs `f` against the request's table under the exclusive lock,
    /// creating the table and stamping it with `now_secs` if it is absent.
    pub fn write<R>(&self, id: RequestId, now_secs: i64, f: impl FnOnce(&mut AttributeMap) -> R) -> R {
        let mut tables = self.tables.write();
        let BagTables { data, created } = &mut *tables;
        let table = data.entry(id).or_insert_with(|| {
            created.insert(id, now_secs);
            AttributeMap::new()
        });
        f(table)
    }

    /// Runs `f` against an existing table under the exclusive lock.
    ///
    /// Never creates a table; returns `None` without calling `f` when the
    /// request is not registered.
    pub fn modify<R>(&self, id: RequestId, f: impl FnOnce(&mut AttributeMap) -> R) -> Option<R> {
        let mut tables = self.tables.write();
        tables.data.get_mut(&id).map(f)
    }

    /// Drops the request's table and timestamp. Returns whether a table existed.
    pub fn remove(&self, id: RequestId) -> bool {
        self.tables.write().remove(id)
    }

    /// Creation second of the request's table, if registered.
    #[must_use]
    pub fn created_at(&self, id: RequestId) -> Option<i64> {
        self.tables.read().created.get(&id).copied()
    }

    /// Number of registered requests in this shard.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().data.len()
    }

    /// Whether no request is registered in this shard.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().data.is_empty()
    }

    /// Removes tables created strictly before `cutoff_secs`, or every table
    /// when `cutoff_secs` is `None`. Returns the number removed.
    pub fn purge(&self, cutoff_secs: Option<i64>) -> usize {
        let mut tables = self.tables.write();
        let Some(cutoff) = cutoff_secs else {
            let count = tables.data.len();
            tables.data.clear();
            tables.created.clear();
            return count;
        };

        let stale: Vec<RequestId> = tables
            .created
            .iter()
            .filter(|&(_, &created)| created < cutoff)
            .map(|(&id, _)| id)
            .collect();
        for &id in &stale {
            tables.remove(id);
        }
        stale.len()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let tables = self.tables.read();
        tables.data.len() == tables.created.len()
            && tables.data.keys().all(|id| tables.created.contains_key(id))
    }
}
