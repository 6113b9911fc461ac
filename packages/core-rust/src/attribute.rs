//! Attribute keys and type-erased attribute values.
//!
//! Keys are plain names. Components agree out-of-band on which key carries
//! which value type, usually by exporting a sentinel constant:
//!
//! ```
//! use reqscope_core::AttributeKey;
//!
//! pub const CURRENT_USER: AttributeKey = AttributeKey::from_static("auth.user");
//! assert_eq!(CURRENT_USER.as_str(), "auth.user");
//! ```

use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Per-request mapping from key to stored value.
pub type AttributeMap = HashMap<AttributeKey, AttributeValue>;

// ---------------------------------------------------------------------------
// AttributeKey
// ---------------------------------------------------------------------------

/// Opaque name under which a request attribute is stored.
///
/// Hashes and compares exactly like the underlying `str`, so maps keyed by
/// `AttributeKey` can be queried with a plain `&str`, and a key constant can
/// be passed wherever a `&str` lookup key is expected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey(Cow<'static, str>);

impl AttributeKey {
    /// Builds a key from a static name. Usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Builds a key from an owned or borrowed name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for AttributeKey {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AttributeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for AttributeKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for AttributeKey {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AttributeValue
// ---------------------------------------------------------------------------

/// Shared, type-erased attribute value.
///
/// Cloning is a reference-count bump: the store and every snapshot handed
/// out by `get_all` point at the same underlying value.
#[derive(Clone)]
pub struct AttributeValue(Arc<dyn Any + Send + Sync>);

impl AttributeValue {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wraps an already shared value without another allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Returns `true` if the stored value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().is::<T>()
    }

    /// Borrows the stored value as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().downcast_ref::<T>()
    }

    /// Returns a shared handle to the stored value as a `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Returns `true` if both handles point at the same stored value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeValue").field(&"..").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: AttributeKey = AttributeKey::from_static("pkg.sentinel");

    #[test]
    fn static_and_owned_keys_compare_equal() {
        let owned = AttributeKey::from("pkg.sentinel".to_string());
        assert_eq!(SENTINEL, owned);
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = AttributeMap::new();
        map.insert(SENTINEL, AttributeValue::new(5_u32));
        assert!(map.contains_key("pkg.sentinel"));
        assert!(!map.contains_key("pkg.other"));
    }

    #[test]
    fn key_display_is_name() {
        assert_eq!(AttributeKey::new("a.b").to_string(), "a.b");
    }

    #[test]
    fn downcast_matching_type() {
        let value = AttributeValue::new("alice".to_string());
        assert!(value.is::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("alice"));
        assert_eq!(value.downcast::<String>().as_deref(), Some(&"alice".to_string()));
    }

    #[test]
    fn downcast_wrong_type_is_none() {
        let value = AttributeValue::new(42_i64);
        assert!(!value.is::<i32>());
        assert!(value.downcast_ref::<i32>().is_none());
        assert!(value.downcast::<String>().is_none());
    }

    #[test]
    fn clones_share_the_value() {
        let value = AttributeValue::new(vec![1, 2, 3]);
        let copy = value.clone();
        assert!(value.ptr_eq(&copy));
        assert!(!value.ptr_eq(&AttributeValue::new(vec![1, 2, 3])));
    }

    #[test]
    fn from_arc_keeps_identity() {
        let shared = Arc::new(7_u8);
        let value = AttributeValue::from_arc(Arc::clone(&shared));
        let back = value.downcast::<u8>().unwrap();
        assert!(Arc::ptr_eq(&shared, &back));
    }
}
