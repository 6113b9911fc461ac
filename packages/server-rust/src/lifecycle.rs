//! Guaranteed cleanup of request attribute tables.
//!
//! Every surface here rests on [`ClearGuard`]: an RAII guard that clears the
//! request's attributes when dropped. Drop runs on normal return, on early
//! return, and during panic unwinding, so a handler that fails still leaves
//! nothing behind in the store.

use std::sync::Arc;

use reqscope_core::{RequestId, RequestStore};
use tracing::trace;

/// RAII guard that clears one request's attributes when dropped.
#[derive(Debug)]
#[must_use = "the request is cleared as soon as the guard is dropped"]
pub struct ClearGuard {
    store: Arc<RequestStore>,
    id: RequestId,
}

impl ClearGuard {
    /// Arms a guard for `id`.
    pub fn new(store: Arc<RequestStore>, id: RequestId) -> Self {
        Self { store, id }
    }

    /// The guarded request.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The store the guard clears from.
    #[must_use]
    pub fn store(&self) -> &Arc<RequestStore> {
        &self.store
    }
}

impl Drop for ClearGuard {
    fn drop(&mut self) {
        let was_registered = self.store.clear(self.id);
        trace!(request_id = %self.id, was_registered, "request attributes cleared");
    }
}

/// Wraps `handler` so the request's attributes are cleared after every call.
///
/// The returned handler behaves exactly like `handler`, including
/// propagating its panics, but the attribute table for the id it was called
/// with is gone by the time it returns or unwinds.
pub fn clear_handler<F, R>(store: Arc<RequestStore>, handler: F) -> impl Fn(RequestId) -> R
where
    F: Fn(RequestId) -> R,
{
    move |id| {
        let _guard = ClearGuard::new(Arc::clone(&store), id);
        handler(id)
    }
}

/// Runs `f` under a freshly minted request id, clearing it afterwards.
pub fn scoped<F, R>(store: &Arc<RequestStore>, f: F) -> R
where
    F: FnOnce(RequestId) -> R,
{
    let guard = ClearGuard::new(Arc::clone(store), RequestId::mint());
    f(guard.id())
}
