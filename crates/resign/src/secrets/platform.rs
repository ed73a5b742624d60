//! Secret storage backed by the operating system credential store.

use super::{SecretStore, SecretStoreError};
use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// [`SecretStore`] backed by the platform credential store via the
/// `keyring` crate.
///
/// Entries are scoped by a service name so multiple deployments on the same
/// machine do not collide. Secrets stay on the local device and are only
/// readable while the user session is unlocked; both properties come from
/// the underlying platform store.
pub struct PlatformSecretStore {
    service: String,
}

impl PlatformSecretStore {
    /// Creates a store scoped to `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, id: &str) -> Result<Entry, SecretStoreError> {
        Entry::new(&self.service, id).map_err(|e| SecretStoreError::new(e.to_string()))
    }
}

impl SecretStore for PlatformSecretStore {
    fn set(&self, id: &str, secret: &SecretString) -> Result<(), SecretStoreError> {
        // keyring's set_password updates an existing entry in place, which
        // gives the overwrite-not-duplicate contract for free.
        self.entry(id)?
            .set_password(secret.expose_secret())
            .map_err(|e| SecretStoreError::new(e.to_string()))
    }

    fn get(&self, id: &str) -> Option<SecretString> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(id, status = %e.status, "secret store entry unavailable");
                return None;
            }
        };

        match entry.get_password() {
            Ok(password) => Some(SecretString::from(password)),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                debug!(id, error = %e, "secret lookup failed");
                None
            }
        }
    }

    fn delete(&self, id: &str) {
        if let Ok(entry) = self.entry(id) {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => debug!(id, error = %e, "secret delete failed"),
            }
        }
    }
}
