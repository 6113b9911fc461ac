//! Opaque per-request identity tokens.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide source for [`RequestId::mint`]. Starts at 1 so that 0 never
/// names a live request.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one in-flight request.
///
/// Minted once when the request enters the server and attached to it for its
/// whole lifetime. Minted ids are never reused within a process, so a stale
/// id can never alias a later request's attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Mints a fresh identity from the process-wide counter.
    #[must_use]
    pub fn mint() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps an externally chosen token.
    ///
    /// The caller is responsible for uniqueness among in-flight requests;
    /// mixing raw ids with minted ones can collide.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}
