//! Axum extractor giving handlers access to their request's attributes.

use std::any::Any;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqscope_core::{AttributeKey, AttributeMap, AttributeValue, RequestId, RequestStore};

/// Handle to the current request's attribute table.
///
/// Inserted into the request extensions by
/// [`ClearLayer`](super::clear::ClearLayer); every method is the same-named
/// [`RequestStore`] operation with the request id filled in.
#[derive(Debug, Clone)]
pub struct RequestScope {
    id: RequestId,
    store: Arc<RequestStore>,
}

impl RequestScope {
    pub(crate) fn new(id: RequestId, store: Arc<RequestStore>) -> Self {
        Self { id, store }
    }

    /// The current request's id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The store backing this scope.
    #[must_use]
    pub fn store(&self) -> &Arc<RequestStore> {
        &self.store
    }

    /// Stores `value` under `key` for this request.
    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<AttributeKey>, value: V) {
        self.store.set(self.id, key, value);
    }

    /// Stores an already type-erased value under `key`.
    pub fn set_value(&self, key: impl Into<AttributeKey>, value: AttributeValue) {
        self.store.set_value(self.id, key, value);
    }

    /// Returns the value under `key` as a `T`, if present with that type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.store.get(self.id, key)
    }

    /// Returns the raw value under `key`; `Some` exactly when it is set.
    #[must_use]
    pub fn get_ok(&self, key: &str) -> Option<AttributeValue> {
        self.store.get_ok(self.id, key)
    }

    /// Returns a copy of every attribute, empty if none were set.
    #[must_use]
    pub fn get_all(&self) -> AttributeMap {
        self.store.get_all(self.id)
    }

    /// Returns a copy of every attribute, `None` if the request never stored any.
    #[must_use]
    pub fn get_all_ok(&self) -> Option<AttributeMap> {
        self.store.get_all_ok(self.id)
    }

    /// Removes a single key.
    pub fn delete(&self, key: &str) {
        self.store.delete(self.id, key);
    }

    /// Clears the request early. The lifecycle layer clears again on
    /// completion, which is a no-op.
    pub fn clear(&self) -> bool {
        self.store.clear(self.id)
    }
}

/// Rejection returned when a handler asks for a [`RequestScope`] on a route
/// the lifecycle layer does not cover.
#[derive(Debug, thiserror::Error)]
pub enum ScopeRejection {
    #[error("request scope missing: ClearLayer is not installed on this route")]
    MissingScope,
}

impl IntoResponse for ScopeRejection {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = ScopeRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestScope>()
            .cloned()
            .ok_or(ScopeRejection::MissingScope)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn extracts_inserted_scope() {
        let store = Arc::new(RequestStore::new());
        let id = RequestId::mint();
        let mut req = Request::new(());
        req.extensions_mut()
            .insert(RequestScope::new(id, Arc::clone(&store)));
        let (mut parts, ()) = req.into_parts();

        let scope = RequestScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(scope.id(), id);

        scope.set("user", "alice".to_string());
        assert_eq!(store.get::<String>(id, "user").as_deref().map(String::as_str), Some("alice"));
        assert!(scope.get_ok("user").is_some());
        assert_eq!(scope.get_all().len(), 1);

        scope.delete("user");
        assert!(scope.get_all_ok().is_some_and(|m| m.is_empty()));
        assert!(scope.clear());
        assert!(scope.get_all_ok().is_none());
    }

    #[tokio::test]
    async fn missing_scope_is_rejected() {
        let (mut parts, ()) = Request::new(()).into_parts();
        let err = RequestScope::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ScopeRejection::MissingScope));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
