//! Credential import.
//!
//! Copies a key/profile pair into the store's directory layout and adds the
//! record, after verifying the profile actually decodes.

use super::{CredentialStore, NewCredential, SigningCredential};
use crate::profile::ProvisioningProfile;
use crate::{Error, Result};
use secrecy::SecretString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Builder that imports a key and provisioning profile as a new credential.
///
/// # Examples
///
/// ```no_run
/// use resign::store::{CredentialImporter, CredentialStore};
/// use resign::secrets::MemorySecretStore;
/// use std::sync::Arc;
///
/// let store = CredentialStore::open("Certificates", Arc::new(MemorySecretStore::new()))?;
/// let credential = CredentialImporter::new("dev.p12", "dev.mobileprovision")
///     .nickname("Development")
///     .default(true)
///     .import(&store)?;
/// println!("imported {}", credential.id);
/// # Ok::<(), resign::Error>(())
/// ```
pub struct CredentialImporter {
    key: PathBuf,
    profile: PathBuf,
    password: Option<SecretString>,
    nickname: Option<String>,
    is_default: bool,
}

impl CredentialImporter {
    /// Starts an import of `key` (`.p12`) and `profile` (`.mobileprovision`).
    pub fn new(key: impl Into<PathBuf>, profile: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            profile: profile.into(),
            password: None,
            nickname: None,
            is_default: false,
        }
    }

    /// Key password, if the key has one.
    #[must_use]
    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Display label for the credential.
    #[must_use]
    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Make the imported credential the store default.
    #[must_use]
    pub fn default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Runs the import: decode the profile, copy both files into the
    /// credential's directory, apply file protection, add the record.
    ///
    /// # Errors
    ///
    /// - [`Error::CredentialInvalid`] if the profile does not decode.
    /// - [`Error::Copy`] if either file cannot be copied into place.
    /// - Persistence errors from [`CredentialStore::add`].
    pub fn import(self, store: &CredentialStore) -> Result<SigningCredential> {
        let profile = ProvisioningProfile::decode(&self.profile).ok_or_else(|| {
            Error::CredentialInvalid(format!(
                "provisioning profile failed to decode: {}",
                self.profile.display()
            ))
        })?;

        let id = Uuid::new_v4().to_string();
        let dir = store.credential_dir(&id);
        fs::create_dir_all(&dir)?;

        let key_dest = copy_into(&self.key, &dir)?;
        let profile_dest = copy_into(&self.profile, &dir)?;
        apply_protection(&dir, &key_dest, &profile_dest);

        let record = store.add(NewCredential {
            id: id.clone(),
            secret: self.password,
            nickname: self.nickname,
            ppq_check: profile.ppq_check,
            expiration: profile.expiration_date,
            is_default: self.is_default,
        })?;

        info!(id = %id, "imported credential");
        Ok(record)
    }
}

fn copy_into(source: &Path, dir: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::Copy(format!("no file name: {}", source.display())))?;
    let dest = dir.join(name);
    fs::copy(source, &dest)
        .map_err(|e| Error::Copy(format!("{} -> {}: {e}", source.display(), dest.display())))?;
    Ok(dest)
}

/// Best-effort "complete" file protection: restrict the directory and both
/// files to the owning user. Failures are ignored, matching the original
/// best-effort attribute set.
fn apply_protection(dir: &Path, key: &Path, profile: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        let _ = fs::set_permissions(key, fs::Permissions::from_mode(0o600));
        let _ = fs::set_permissions(profile, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = (dir, key, profile);
    }
}
