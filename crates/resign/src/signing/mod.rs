//! Signing orchestration.
//!
//! [`Resigner`] sequences the steps applied to one app bundle: optional
//! dylib disinjection, then either credentialed signing or ad-hoc signing.
//! The cryptographic work itself lives behind the [`Signer`] boundary; this
//! module only resolves paths, passwords, and options.
//!
//! The orchestrator is state-free and never retries. A failed step leaves
//! the bundle in an unspecified intermediate state; the caller re-runs the
//! whole sequence from a clean copy.

mod options;
mod tool;

pub use options::SigningOptions;
pub use tool::{ToolSigner, PASSWORD_ENV};

use crate::store::CredentialStore;
use crate::{Error, Result};
use plist::Value;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One invocation of the external signer.
pub struct SignRequest {
    /// The `.app` bundle to sign.
    pub app_path: PathBuf,
    /// Provisioning profile to embed, absent for ad-hoc signing.
    pub profile_path: Option<PathBuf>,
    /// PKCS#12 key file, absent for ad-hoc signing.
    pub key_path: Option<PathBuf>,
    /// Key password, when the key has one.
    pub key_password: Option<SecretString>,
    /// Custom entitlements to apply.
    pub entitlements_path: Option<PathBuf>,
    /// Strip the embedded profile from the output.
    pub remove_profile: bool,
    /// Sign without an identity.
    pub adhoc: bool,
}

/// External signer boundary.
///
/// The cryptographic code-signing primitive is out of scope here; it is
/// invoked with file paths and a password. [`ToolSigner`] adapts an external
/// binary; tests substitute their own implementations.
pub trait Signer: Send + Sync {
    /// Signs the bundle described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] with the tool's diagnostics on failure.
    fn sign(&self, request: &SignRequest) -> Result<()>;

    /// Strips the named injected libraries from `executable`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] with the tool's diagnostics on failure.
    fn remove_dylibs(&self, executable: &Path, names: &[String]) -> Result<()>;
}

/// Sequences the signing steps for one app bundle.
pub struct Resigner {
    app_path: PathBuf,
    options: SigningOptions,
    store: Arc<CredentialStore>,
    credential_id: Option<String>,
}

impl Resigner {
    /// Creates a resigner for the bundle at `app_path`.
    ///
    /// `credential_id` names the credential used by [`Resigner::sign`];
    /// leave it `None` for ad-hoc-only flows.
    pub fn new(
        app_path: impl Into<PathBuf>,
        options: SigningOptions,
        store: Arc<CredentialStore>,
        credential_id: Option<String>,
    ) -> Self {
        Self {
            app_path: app_path.into(),
            options,
            store,
            credential_id,
        }
    }

    /// Strips configured injected libraries from the bundle's main
    /// executable. No-op when the configured list is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] when the signer rejects the removal, or an
    /// I/O error if the executable cannot be located.
    pub fn disinject(&self, signer: &dyn Signer) -> Result<()> {
        if self.options.disinjection_files.is_empty() {
            return Ok(());
        }

        let executable = self.main_executable()?;
        debug!(executable = %executable.display(), count = self.options.disinjection_files.len(), "removing injected dylibs");
        signer.remove_dylibs(&executable, &self.options.disinjection_files)
    }

    /// Signs the bundle with the attached credential.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredential`] when no credential id was attached.
    /// - [`Error::Signer`] when the external signer fails.
    pub fn sign(&self, signer: &dyn Signer) -> Result<()> {
        let id = self.credential_id.as_deref().ok_or(Error::MissingCredential)?;

        let request = SignRequest {
            app_path: self.app_path.clone(),
            profile_path: self.store.profile_path(id),
            key_path: self.store.key_path(id),
            key_password: self.store.password(id),
            entitlements_path: self.options.entitlements_file.clone(),
            remove_profile: !self.options.remove_provisioning,
            adhoc: false,
        };
        signer.sign(&request)
    }

    /// Ad-hoc signs the bundle; no credential required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] when the external signer fails.
    pub fn adhoc_sign(&self, signer: &dyn Signer) -> Result<()> {
        let request = SignRequest {
            app_path: self.app_path.clone(),
            profile_path: None,
            key_path: None,
            key_password: None,
            entitlements_path: self.options.entitlements_file.clone(),
            remove_profile: !self.options.remove_provisioning,
            adhoc: true,
        };
        signer.sign(&request)
    }

    /// Path to the bundle's main executable: `CFBundleExecutable` from
    /// `Info.plist`, falling back to the bundle's file stem.
    fn main_executable(&self) -> Result<PathBuf> {
        let name = read_executable_name(&self.app_path)
            .or_else(|| {
                self.app_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .ok_or_else(|| {
                Error::Signer(format!(
                    "cannot determine main executable for {}",
                    self.app_path.display()
                ))
            })?;
        Ok(self.app_path.join(name))
    }
}

fn read_executable_name(app_path: &Path) -> Option<String> {
    let info = Value::from_file(app_path.join("Info.plist")).ok()?;
    info.as_dictionary()?
        .get("CFBundleExecutable")?
        .as_string()
        .map(str::to_owned)
}

/// Reads `CFBundleIdentifier` from the bundle's `Info.plist`.
pub fn bundle_identifier(app_path: &Path) -> Option<String> {
    let info = Value::from_file(app_path.join("Info.plist")).ok()?;
    info.as_dictionary()?
        .get("CFBundleIdentifier")?
        .as_string()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;
    use crate::store::NewCredential;
    use secrecy::ExposeSecret;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Signer that records every call instead of signing.
    #[derive(Default)]
    struct RecordingSigner {
        signed: Mutex<Vec<(Option<PathBuf>, Option<String>, bool, bool)>>,
        removed: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    impl Signer for RecordingSigner {
        fn sign(&self, request: &SignRequest) -> Result<()> {
            self.signed.lock().unwrap().push((
                request.key_path.clone(),
                request
                    .key_password
                    .as_ref()
                    .map(|p| p.expose_secret().to_owned()),
                request.remove_profile,
                request.adhoc,
            ));
            Ok(())
        }

        fn remove_dylibs(&self, executable: &Path, names: &[String]) -> Result<()> {
            self.removed
                .lock()
                .unwrap()
                .push((executable.to_path_buf(), names.to_vec()));
            Ok(())
        }
    }

    fn make_app(dir: &Path, executable: Option<&str>) -> PathBuf {
        let app = dir.join("Test.app");
        fs::create_dir_all(&app).unwrap();
        if let Some(name) = executable {
            fs::write(
                app.join("Info.plist"),
                format!(
                    r#"<?xml version="1.0"?><plist version="1.0"><dict>
                    <key>CFBundleExecutable</key><string>{name}</string>
                    <key>CFBundleIdentifier</key><string>com.example.test</string>
                    </dict></plist>"#
                ),
            )
            .unwrap();
        }
        app
    }

    fn store_with_credential(dir: &TempDir, password: Option<&str>) -> (Arc<CredentialStore>, String) {
        let store = Arc::new(
            CredentialStore::open(
                dir.path().join("Certificates"),
                Arc::new(MemorySecretStore::new()),
            )
            .unwrap(),
        );
        let record = store
            .add(NewCredential {
                id: "cred-1".into(),
                secret: password.map(|p| SecretString::from(p.to_owned())),
                nickname: None,
                ppq_check: false,
                expiration: None,
                is_default: false,
            })
            .unwrap();
        let cred_dir = store.credential_dir(&record.id);
        fs::write(cred_dir.join("dev.p12"), b"key").unwrap();
        fs::write(cred_dir.join("dev.mobileprovision"), b"profile").unwrap();
        (store, record.id)
    }

    #[test]
    fn test_sign_without_credential_fails() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), Some("Test"));

        let resigner = Resigner::new(app, SigningOptions::default(), store, None);
        let signer = RecordingSigner::default();

        assert!(matches!(
            resigner.sign(&signer),
            Err(Error::MissingCredential)
        ));
        assert!(signer.signed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sign_resolves_paths_and_password() {
        let dir = TempDir::new().unwrap();
        let (store, id) = store_with_credential(&dir, Some("hunter2"));
        let app = make_app(dir.path(), Some("Test"));

        let resigner = Resigner::new(app, SigningOptions::default(), store, Some(id));
        let signer = RecordingSigner::default();
        resigner.sign(&signer).unwrap();

        let signed = signer.signed.lock().unwrap();
        let (key, password, remove_profile, adhoc) = &signed[0];
        assert!(key.as_ref().unwrap().ends_with("dev.p12"));
        assert_eq!(password.as_deref(), Some("hunter2"));
        assert!(*remove_profile);
        assert!(!*adhoc);
    }

    #[test]
    fn test_remove_provisioning_inverts_remove_profile() {
        let dir = TempDir::new().unwrap();
        let (store, id) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), Some("Test"));

        let options = SigningOptions {
            remove_provisioning: true,
            ..Default::default()
        };
        let resigner = Resigner::new(app, options, store, Some(id));
        let signer = RecordingSigner::default();
        resigner.sign(&signer).unwrap();

        let signed = signer.signed.lock().unwrap();
        assert!(!signed[0].2);
    }

    #[test]
    fn test_adhoc_sign_needs_no_credential() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), Some("Test"));

        let resigner = Resigner::new(app, SigningOptions::default(), store, None);
        let signer = RecordingSigner::default();
        resigner.adhoc_sign(&signer).unwrap();

        let signed = signer.signed.lock().unwrap();
        assert!(signed[0].0.is_none());
        assert!(signed[0].3);
    }

    #[test]
    fn test_disinject_noop_on_empty_list() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), Some("Test"));

        let resigner = Resigner::new(app, SigningOptions::default(), store, None);
        let signer = RecordingSigner::default();
        resigner.disinject(&signer).unwrap();
        assert!(signer.removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disinject_targets_main_executable() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), Some("TestBinary"));

        let options = SigningOptions {
            disinjection_files: vec!["Evil.dylib".into()],
            ..Default::default()
        };
        let resigner = Resigner::new(app.clone(), options, store, None);
        let signer = RecordingSigner::default();
        resigner.disinject(&signer).unwrap();

        let removed = signer.removed.lock().unwrap();
        assert_eq!(removed[0].0, app.join("TestBinary"));
        assert_eq!(removed[0].1, vec!["Evil.dylib".to_string()]);
    }

    #[test]
    fn test_disinject_falls_back_to_bundle_stem() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_with_credential(&dir, None);
        let app = make_app(dir.path(), None);

        let options = SigningOptions {
            disinjection_files: vec!["Evil.dylib".into()],
            ..Default::default()
        };
        let resigner = Resigner::new(app.clone(), options, store, None);
        let signer = RecordingSigner::default();
        resigner.disinject(&signer).unwrap();

        let removed = signer.removed.lock().unwrap();
        assert_eq!(removed[0].0, app.join("Test"));
    }

    #[test]
    fn test_bundle_identifier_reads_info_plist() {
        let dir = TempDir::new().unwrap();
        let app = make_app(dir.path(), Some("Test"));
        assert_eq!(
            bundle_identifier(&app).as_deref(),
            Some("com.example.test")
        );
        assert!(bundle_identifier(Path::new("/nonexistent.app")).is_none());
    }
}
