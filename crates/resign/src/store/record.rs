//! Credential record type.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A stored signing identity: certificate key, provisioning profile, and the
/// metadata tracked alongside them.
///
/// Records are owned exclusively by [`CredentialStore`](super::CredentialStore)
/// and persisted as `record.json` inside the credential's own directory. The
/// `revoked` flag only ever transitions `false` to `true`; nothing in this
/// system clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningCredential {
    /// Stable unique identifier; also the directory name and the secret key.
    pub id: String,
    /// When the credential was added to the store.
    pub created_at: SystemTime,
    /// Optional display label.
    pub nickname: Option<String>,
    /// Whether this credential is the store's default. At most one record
    /// carries this flag; the store clears the previous default on write.
    pub is_default: bool,
    /// `PPQCheck` flag copied from the provisioning profile at import time.
    pub ppq_check: bool,
    /// Profile expiration, when the profile declared one.
    pub expiration: Option<SystemTime>,
    /// Whether the issuing authority has revoked the certificate.
    pub revoked: bool,
    /// Degraded fallback secret, populated only when the secret store
    /// rejected the write at add time. Cleared by
    /// [`CredentialStore::migrate_inline_secrets`](super::CredentialStore::migrate_inline_secrets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) inline_secret: Option<String>,
}

impl SigningCredential {
    /// Whether a degraded inline secret is still pending migration.
    pub fn has_inline_secret(&self) -> bool {
        self.inline_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }
}

/// Parameters for [`CredentialStore::add`](super::CredentialStore::add).
pub struct NewCredential {
    /// Unique identifier; the caller picks it (importers use a UUIDv4).
    pub id: String,
    /// Key password, if the key has one. Empty secrets are treated as absent.
    pub secret: Option<secrecy::SecretString>,
    /// Optional display label.
    pub nickname: Option<String>,
    /// `PPQCheck` flag from the decoded profile.
    pub ppq_check: bool,
    /// Profile expiration.
    pub expiration: Option<SystemTime>,
    /// Make this credential the store default.
    pub is_default: bool,
}
