//! Process-local secret storage for tests and storeless platforms.

use super::{SecretStore, SecretStoreError};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory [`SecretStore`].
///
/// Holds secrets in a mutex-guarded map for the lifetime of the process.
/// Nothing is persisted; this exists for tests and for environments where
/// no platform store is available.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SecretStore for MemorySecretStore {
    fn set(&self, id: &str, secret: &SecretString) -> Result<(), SecretStoreError> {
        self.lock()
            .insert(id.to_owned(), secret.expose_secret().to_owned());
        Ok(())
    }

    fn get(&self, id: &str) -> Option<SecretString> {
        self.lock().get(id).cloned().map(SecretString::from)
    }

    fn delete(&self, id: &str) {
        self.lock().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    #[test]
    fn test_get_absent_is_none() {
        let store = MemorySecretStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let store = MemorySecretStore::new();
        store.set("id-1", &secret("hunter2")).unwrap();

        let fetched = store.get("id-1").unwrap();
        assert_eq!(fetched.expose_secret(), "hunter2");
    }

    #[test]
    fn test_set_twice_keeps_latest() {
        let store = MemorySecretStore::new();
        store.set("id-1", &secret("first")).unwrap();
        store.set("id-1", &secret("second")).unwrap();

        let fetched = store.get("id-1").unwrap();
        assert_eq!(fetched.expose_secret(), "second");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemorySecretStore::new();
        store.set("id-1", &secret("value")).unwrap();

        store.delete("id-1");
        assert!(store.get("id-1").is_none());

        // Deleting again must not panic or error.
        store.delete("id-1");
    }
}
