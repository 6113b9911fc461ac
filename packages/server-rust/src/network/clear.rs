//! Tower middleware that scopes request attributes to one HTTP request.
//!
//! [`ClearLayer`] mints a [`RequestId`] for every request, stores it and a
//! [`RequestScope`] in the request extensions, and keeps a [`ClearGuard`]
//! alive inside the response future. The guard drops when the future
//! completes, fails, panics, or is itself dropped (timeout, client
//! disconnect), so attributes never outlive the request that created them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Request;
use reqscope_core::{RequestId, RequestStore};
use tower::{Layer, Service};

use super::extract::RequestScope;
use crate::lifecycle::ClearGuard;

// ---------------------------------------------------------------------------
// ClearLayer
// ---------------------------------------------------------------------------

/// Tower layer that assigns a [`RequestId`] and clears its attributes when
/// the request finishes.
#[derive(Debug, Clone)]
pub struct ClearLayer {
    store: Arc<RequestStore>,
}

impl ClearLayer {
    /// Create a layer clearing from `store`.
    #[must_use]
    pub fn new(store: Arc<RequestStore>) -> Self {
        Self { store }
    }

    /// Create a layer over the process-wide store.
    #[must_use]
    pub fn global() -> Self {
        Self::new(Arc::clone(RequestStore::global()))
    }
}

impl<S> Layer<S> for ClearLayer {
    type Service = ClearService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClearService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

// ---------------------------------------------------------------------------
// ClearService
// ---------------------------------------------------------------------------

/// Service wrapper that owns the request's attribute lifetime.
#[derive(Debug, Clone)]
pub struct ClearService<S> {
    inner: S,
    store: Arc<RequestStore>,
}

impl<S, B> Service<Request<B>> for ClearService<S>
where
    S: Service<Request<B>> + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let id = RequestId::mint();
        req.extensions_mut().insert(id);
        req.extensions_mut()
            .insert(RequestScope::new(id, Arc::clone(&self.store)));

        // Armed before the inner call so a panic while building the inner
        // future still clears.
        let guard = ClearGuard::new(Arc::clone(&self.store), id);
        let fut = self.inner.call(req);
        Box::pin(async move {
            let result = fut.await;
            drop(guard);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
