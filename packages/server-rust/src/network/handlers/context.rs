//! Identity middleware and the `/context` endpoint.
//!
//! [`attach_identity`] copies caller identity headers into the request's
//! attributes before the handler runs; [`context_handler`] reads them back
//! without any parameter threading between the two.

use std::collections::BTreeMap;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use reqscope_core::AttributeKey;
use serde_json::json;

use crate::network::extract::RequestScope;

/// Attribute holding the caller's user name (`x-user` header).
pub const USER: AttributeKey = AttributeKey::from_static("user");

/// Attribute holding the caller's role (`x-role` header).
pub const ROLE: AttributeKey = AttributeKey::from_static("role");

const IDENTITY_HEADERS: [(&str, AttributeKey); 2] = [("x-user", USER), ("x-role", ROLE)];

/// Stores the `x-user` and `x-role` headers as request attributes.
///
/// Headers that are absent or not valid UTF-8 are skipped.
pub async fn attach_identity(scope: RequestScope, req: Request, next: Next) -> Response {
    for (header, key) in IDENTITY_HEADERS {
        if let Some(value) = req.headers().get(header).and_then(|v| v.to_str().ok()) {
            scope.set(key, value.to_owned());
        }
    }
    next.run(req).await
}

/// Returns the current request id and every `String` attribute it holds.
pub async fn context_handler(scope: RequestScope) -> Json<serde_json::Value> {
    let attributes: BTreeMap<String, String> = scope
        .get_all()
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .downcast_ref::<String>()
                .map(|s| (key.as_str().to_owned(), s.clone()))
        })
        .collect();

    Json(json!({
        "request_id": scope.id().to_string(),
        "attributes": attributes,
    }))
}
