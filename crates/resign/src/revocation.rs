//! Certificate revocation checking.
//!
//! [`RevocationChecker`] asks an external [`RevocationAuthority`] whether a
//! credential's certificate is still valid and applies a `Revoked` verdict to
//! the record through the store's single serialized writer. Inconclusive
//! results never touch the record: a credential is only ever marked revoked
//! on positive evidence (fail-open).

use crate::profile::ProvisioningProfile;
use crate::store::CredentialStore;
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Verdict of one revocation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// The authority confirmed the certificate is still valid.
    Valid,
    /// The authority confirmed the certificate was revoked.
    Revoked,
    /// No verdict could be obtained; the record is left unchanged.
    Unknown,
}

/// External authority that knows whether a certificate has been revoked.
///
/// Implementations receive the credential's profile and key paths plus the
/// resolved key password; what they actually present to the authority is up
/// to them.
#[async_trait]
pub trait RevocationAuthority: Send + Sync {
    /// Asks the authority for a verdict.
    ///
    /// # Errors
    ///
    /// Errors are treated by the checker as an inconclusive result.
    async fn check(
        &self,
        profile: &Path,
        key: &Path,
        key_password: Option<&SecretString>,
    ) -> Result<RevocationStatus>;
}

/// Runs revocation checks for credentials in a [`CredentialStore`].
pub struct RevocationChecker {
    store: Arc<CredentialStore>,
    authority: Arc<dyn RevocationAuthority>,
}

impl RevocationChecker {
    /// Creates a checker over `store` backed by `authority`.
    pub fn new(store: Arc<CredentialStore>, authority: Arc<dyn RevocationAuthority>) -> Self {
        Self { store, authority }
    }

    /// Checks the credential `id`.
    ///
    /// Already-revoked records are not re-checked (the flag is one-way).
    /// Missing credential files or authority failures produce
    /// [`RevocationStatus::Unknown`] and leave the record untouched; a
    /// `Revoked` verdict is applied through the store's write lock so
    /// concurrent checks for the same credential cannot interleave their
    /// writes.
    pub async fn check(&self, id: &str) -> RevocationStatus {
        let Some(record) = self.store.get(id) else {
            return RevocationStatus::Unknown;
        };
        if record.revoked {
            return RevocationStatus::Revoked;
        }

        let (Some(profile), Some(key)) = (self.store.profile_path(id), self.store.key_path(id))
        else {
            debug!(id, "credential files missing, skipping revocation check");
            return RevocationStatus::Unknown;
        };
        let password = self.store.password(id);

        match self.authority.check(&profile, &key, password.as_ref()).await {
            Ok(RevocationStatus::Revoked) => {
                if let Err(e) = self.store.mark_revoked(id) {
                    warn!(id, error = %e, "failed to persist revocation");
                }
                RevocationStatus::Revoked
            }
            Ok(status) => status,
            Err(e) => {
                warn!(id, error = %e, "revocation check inconclusive");
                RevocationStatus::Unknown
            }
        }
    }
}

/// [`RevocationAuthority`] that POSTs the profile's identity to an HTTP
/// endpoint as JSON and reads a `{"status": "valid" | "revoked"}` reply.
/// Any other status string maps to [`RevocationStatus::Unknown`].
pub struct HttpRevocationAuthority {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRevocationAuthority {
    /// Creates an authority posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RevocationAuthority for HttpRevocationAuthority {
    async fn check(
        &self,
        profile: &Path,
        _key: &Path,
        _key_password: Option<&SecretString>,
    ) -> Result<RevocationStatus> {
        let decoded = ProvisioningProfile::decode(profile).ok_or_else(|| {
            Error::CredentialInvalid(format!("profile failed to decode: {}", profile.display()))
        })?;

        let expires_at = decoded
            .expiration_date
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        let body = serde_json::json!({
            "team_identifier": decoded.team_identifier(),
            "profile_uuid": decoded.uuid,
            "expires_at": expires_at,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Authority(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Authority(format!(
                "authority returned {}",
                response.status()
            )));
        }

        let verdict: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Authority(e.to_string()))?;

        Ok(match verdict.get("status").and_then(|v| v.as_str()) {
            Some("valid") => RevocationStatus::Valid,
            Some("revoked") => RevocationStatus::Revoked,
            _ => RevocationStatus::Unknown,
        })
    }
}
