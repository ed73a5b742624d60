//! Credential storage.
//!
//! [`CredentialStore`] owns the signing credential records and their on-disk
//! directories (`<certificatesRoot>/<id>/{key, profile, record.json}`), and
//! delegates secret storage to a [`SecretStore`]. Every mutation runs under a
//! single write lock and persists the affected record before releasing it, so
//! readers never observe a torn record and concurrent revocation checks
//! cannot interleave their writes.
//!
//! The store is constructed explicitly and threaded through call sites; there
//! is no process-wide instance.

mod import;
mod record;

pub use import::CredentialImporter;
pub use record::{NewCredential, SigningCredential};

use crate::profile::ProvisioningProfile;
use crate::secrets::SecretStore;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Outcome counts for one [`CredentialStore::migrate_inline_secrets`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Inline secrets moved into the secret store and cleared.
    pub migrated: usize,
    /// Inline secrets left in place because the secret store rejected them.
    pub failed: usize,
}

/// Store of signing credentials rooted at a certificates directory.
pub struct CredentialStore {
    root: PathBuf,
    secrets: Arc<dyn SecretStore>,
    records: RwLock<HashMap<String, SigningCredential>>,
}

impl CredentialStore {
    /// Opens (or creates) a store rooted at `certificates_root`.
    ///
    /// Existing credential directories are scanned and their records loaded;
    /// a directory with a missing or malformed `record.json` is logged and
    /// skipped rather than failing the whole open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root directory cannot be created or read.
    pub fn open(
        certificates_root: impl Into<PathBuf>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let root = certificates_root.into();
        fs::create_dir_all(&root)?;

        let mut records = HashMap::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }

            let record_path = entry.path().join(RECORD_FILE);
            match fs::read(&record_path)
                .map_err(Error::Io)
                .and_then(|data| serde_json::from_slice::<SigningCredential>(&data).map_err(Error::Json))
            {
                Ok(record) => {
                    records.insert(record.id.clone(), record);
                }
                Err(e) => {
                    warn!(dir = %entry.path().display(), error = %e, "skipping unreadable credential record");
                }
            }
        }

        debug!(root = %root.display(), count = records.len(), "opened credential store");

        Ok(Self {
            root,
            secrets,
            records: RwLock::new(records),
        })
    }

    /// The certificates root this store owns.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory owned by the credential `id`.
    pub fn credential_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Adds a credential record.
    ///
    /// The secret, when present and non-empty, is handed to the secret store.
    /// If that write fails the secret is retained inline on the record as a
    /// degraded fallback (warn-logged, not fatal) so the credential stays
    /// usable until the next successful migration pass.
    ///
    /// When `is_default` is set, the previous default is cleared within the
    /// same write transaction; at most one record carries the flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] if the record cannot be
    /// persisted.
    pub fn add(&self, new: NewCredential) -> Result<SigningCredential> {
        let mut records = self.write_records();

        let mut inline_secret = None;
        if let Some(secret) = &new.secret {
            if !secret.expose_secret().is_empty() {
                if let Err(e) = self.secrets.set(&new.id, secret) {
                    warn!(id = %new.id, status = %e.status, "secret store rejected write, keeping inline fallback");
                    inline_secret = Some(secret.expose_secret().to_owned());
                }
            }
        }

        if new.is_default {
            self.clear_default(&mut records)?;
        }

        let record = SigningCredential {
            id: new.id,
            created_at: SystemTime::now(),
            nickname: new.nickname,
            is_default: new.is_default,
            ppq_check: new.ppq_check,
            expiration: new.expiration,
            revoked: false,
            inline_secret,
        };

        self.persist(&record)?;
        records.insert(record.id.clone(), record.clone());
        info!(id = %record.id, "added credential");
        Ok(record)
    }

    /// Deletes the credential `id`: its directory, its secret, its record.
    ///
    /// The directory removal tolerates a missing directory and the secret
    /// delete is best-effort; the whole delete happens under one write lock
    /// so no partial-delete state is observable. Deleting an unknown id is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory exists but cannot be removed.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.write_records();

        let dir = self.credential_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        self.secrets.delete(id);

        if records.remove(id).is_some() {
            info!(id, "deleted credential");
        }
        Ok(())
    }

    /// Resolves the key password for `id`: the secret store's value when
    /// present, else the inline fallback, else `None`.
    pub fn password(&self, id: &str) -> Option<SecretString> {
        if let Some(secret) = self.secrets.get(id) {
            return Some(secret);
        }

        self.read_records()
            .get(id)
            .and_then(|record| record.inline_secret.clone())
            .map(SecretString::from)
    }

    /// Returns the credential `id`, if present.
    pub fn get(&self, id: &str) -> Option<SigningCredential> {
        self.read_records().get(id).cloned()
    }

    /// All credentials, newest first.
    pub fn all(&self) -> Vec<SigningCredential> {
        let records = self.read_records();
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// The store's default credential, if one is flagged.
    pub fn default_credential(&self) -> Option<SigningCredential> {
        self.read_records()
            .values()
            .find(|record| record.is_default)
            .cloned()
    }

    /// Flags `id` as the default, clearing the previous default in the same
    /// write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialInvalid`] for an unknown id, or a
    /// persistence error.
    pub fn set_default(&self, id: &str) -> Result<()> {
        let mut records = self.write_records();

        if !records.contains_key(id) {
            return Err(Error::CredentialInvalid(format!("no credential {id}")));
        }

        self.clear_default(&mut records)?;

        if let Some(record) = records.get_mut(id) {
            record.is_default = true;
            let snapshot = record.clone();
            self.persist(&snapshot)?;
        }
        Ok(())
    }

    /// Moves legacy inline secrets into the secret store.
    ///
    /// Idempotent startup pass: every record with a non-empty inline secret
    /// attempts a secret-store write; on success the inline field is cleared
    /// and persisted, on failure it is left untouched and the pass continues
    /// with the next record. The batch never aborts.
    pub fn migrate_inline_secrets(&self) -> MigrationStats {
        let mut records = self.write_records();
        let mut stats = MigrationStats::default();

        for record in records.values_mut() {
            let Some(secret) = record.inline_secret.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };

            let secret = SecretString::from(secret.to_owned());
            match self.secrets.set(&record.id, &secret) {
                Ok(()) => {
                    record.inline_secret = None;
                    if let Err(e) = self.persist(record) {
                        warn!(id = %record.id, error = %e, "migrated secret but failed to persist record");
                    }
                    stats.migrated += 1;
                    info!(id = %record.id, "migrated inline secret to secret store");
                }
                Err(e) => {
                    warn!(id = %record.id, status = %e.status, "inline secret migration failed, left in place");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Best-effort wipe of every stored secret. Inline fallbacks are not
    /// touched; records remain usable through them.
    pub fn delete_all_secrets(&self) {
        for record in self.read_records().values() {
            self.secrets.delete(&record.id);
        }
    }

    /// Path to the credential's key file: the first `.p12` in its directory.
    pub fn key_path(&self, id: &str) -> Option<PathBuf> {
        self.find_file(id, "p12")
    }

    /// Path to the credential's provisioning profile: the first
    /// `.mobileprovision` in its directory.
    pub fn profile_path(&self, id: &str) -> Option<PathBuf> {
        self.find_file(id, "mobileprovision")
    }

    /// Decodes the credential's provisioning profile.
    ///
    /// `None` when the profile file is missing or fails to decode; callers
    /// treat that as "credential invalid".
    pub fn decoded_profile(&self, id: &str) -> Option<ProvisioningProfile> {
        ProvisioningProfile::decode(self.profile_path(id)?)
    }

    /// Marks `id` revoked. One-way: an already-revoked record is left alone,
    /// and nothing ever clears the flag.
    ///
    /// This is the single serialized writer the revocation checker applies
    /// its verdict through.
    pub(crate) fn mark_revoked(&self, id: &str) -> Result<()> {
        let mut records = self.write_records();

        let Some(record) = records.get_mut(id) else {
            return Ok(());
        };
        if record.revoked {
            return Ok(());
        }

        record.revoked = true;
        let snapshot = record.clone();
        self.persist(&snapshot)?;
        warn!(id, "credential marked revoked");
        Ok(())
    }

    fn clear_default(&self, records: &mut HashMap<String, SigningCredential>) -> Result<()> {
        for record in records.values_mut() {
            if record.is_default {
                record.is_default = false;
                let snapshot = record.clone();
                self.persist(&snapshot)?;
            }
        }
        Ok(())
    }

    fn find_file(&self, id: &str, extension: &str) -> Option<PathBuf> {
        let dir = self.credential_dir(id);
        for entry in fs::read_dir(dir).ok()? {
            let path = entry.ok()?.path();
            if path.extension().is_some_and(|ext| ext == extension) {
                return Some(path);
            }
        }
        None
    }

    fn persist(&self, record: &SigningCredential) -> Result<()> {
        let dir = self.credential_dir(&record.id);
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_vec_pretty(record)?;
        fs::write(dir.join(RECORD_FILE), data)?;
        Ok(())
    }

    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<String, SigningCredential>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<String, SigningCredential>> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

const RECORD_FILE: &str = "record.json";
