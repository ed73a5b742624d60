//! Secret storage for credential passwords.
//!
//! Passwords are never written into credential records when a secure
//! backend is available. The [`SecretStore`] trait is the seam between the
//! credential store and whatever holds the actual bytes:
//!
//! - [`PlatformSecretStore`] - the operating system credential store
//!   (keychain on macOS, credential manager on Windows, kernel keyring on
//!   Linux). Device-local, readable only while the session is unlocked.
//! - [`MemorySecretStore`] - process-local map for tests and for platforms
//!   without a usable native store.
//!
//! Absence of a secret is a normal condition reported as `None`; only
//! backend rejections surface as [`SecretStoreError`].

mod memory;
mod platform;

pub use memory::MemorySecretStore;
pub use platform::PlatformSecretStore;

use secrecy::SecretString;
use thiserror::Error;

/// A secret store backend rejected an operation.
///
/// `status` carries the backend's own diagnostic (an OS status string, a
/// keyring error message). Lookup misses never produce this error.
#[derive(Debug, Error)]
#[error("Secret store failure: {status}")]
pub struct SecretStoreError {
    /// Backend diagnostic for the rejected operation.
    pub status: String,
}

impl SecretStoreError {
    pub(crate) fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Storage for one secret string per credential id.
///
/// Implementations must be safe to call concurrently for distinct ids.
/// Concurrent writes to the same id resolve last-write-wins.
pub trait SecretStore: Send + Sync {
    /// Stores `secret` under `id`, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`SecretStoreError`] if the backend rejects the write.
    fn set(&self, id: &str, secret: &SecretString) -> Result<(), SecretStoreError>;

    /// Returns the secret stored under `id`, or `None` if there is none.
    ///
    /// Backend failures are treated as absence; they are logged, not
    /// surfaced, so a flaky backend degrades to "no stored secret".
    fn get(&self, id: &str) -> Option<SecretString>;

    /// Removes the secret stored under `id`.
    ///
    /// Best-effort: deleting an id that has no secret is not an error, and
    /// backend failures are swallowed.
    fn delete(&self, id: &str);
}
