use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Read access to the persisted key/value store holding privacy settings.
///
/// Implementations must return the latest stored value on every call. A missing key resolves to
/// the given default.
pub trait ConsentStore: Send + Sync {
    /// Returns the string stored under `key`, or `default` if there is none.
    fn get_string(&self, key: &str, default: &str) -> String;
}

impl<S> ConsentStore for Arc<S>
where
    S: ConsentStore + ?Sized,
{
    fn get_string(&self, key: &str, default: &str) -> String {
        (**self).get_string(key, default)
    }
}

impl<S> ConsentStore for &S
where
    S: ConsentStore + ?Sized,
{
    fn get_string(&self, key: &str, default: &str) -> String {
        (**self).get_string(key, default)
    }
}

/// An in-process [`ConsentStore`] that can be updated at runtime.
#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryConsentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl ConsentStore for MemoryConsentStore {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .get(key)
            .map_or_else(|| default.to_owned(), String::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_returns_default() {
        let store = MemoryConsentStore::new();
        assert_eq!(store.get_string("key", "fallback"), "fallback");
    }

    #[test]
    fn test_set_and_remove() {
        let store = MemoryConsentStore::new();
        store.set("key", "value");
        assert_eq!(store.get_string("key", ""), "value");

        assert_eq!(store.remove("key").as_deref(), Some("value"));
        assert_eq!(store.get_string("key", ""), "");
    }

    #[test]
    fn test_shared_store_sees_updates() {
        let store = Arc::new(MemoryConsentStore::new());
        let reader: Arc<dyn ConsentStore> = store.clone();

        store.set("key", "1");
        assert_eq!(reader.get_string("key", ""), "1");
        store.set("key", "0");
        assert_eq!(reader.get_string("key", ""), "0");
    }
}
