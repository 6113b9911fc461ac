//! `reqscope` Core -- sharded request-scoped attribute storage.
//!
//! Middleware and handlers attach values to an in-flight request through a
//! [`RequestStore`] keyed by the request's [`RequestId`], instead of
//! threading them through every function signature. Tables are created on
//! first write and must be cleared when the request completes; the server
//! crate provides the wrappers that guarantee it.

pub mod attribute;
pub mod clock;
pub mod context;
pub mod databag;
pub mod error;
pub mod hash;
pub mod identity;
pub mod shard;
pub mod store;

pub use attribute::{AttributeKey, AttributeMap, AttributeValue};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use databag::Databag;
pub use error::StoreError;
pub use identity::RequestId;
pub use shard::{ShardSelector, DEFAULT_SHARD_COUNT};
pub use store::RequestStore;
