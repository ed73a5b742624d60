//! Subprocess adapter for an external signing tool.

use super::{SignRequest, Signer};
use crate::{Error, Result};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Environment variable the external tool reads the key password from.
///
/// The password never appears on the command line; argv is visible to other
/// users on shared hosts.
pub const PASSWORD_ENV: &str = "RESIGN_KEY_PASSWORD";

/// [`Signer`] that shells out to an external zsign-compatible binary.
///
/// Argument surface:
///
/// - `-k <key>` PKCS#12 key file
/// - `-m <profile>` provisioning profile
/// - `-e <entitlements>` custom entitlements
/// - `-a` ad-hoc signing
/// - `--remove-profile` strip the embedded profile from the output
/// - `--remove-dylib <name>` (repeatable) strip an injected library
/// - the bundle or executable path as the final positional argument
///
/// The key password travels in [`PASSWORD_ENV`].
pub struct ToolSigner {
    program: PathBuf,
}

impl ToolSigner {
    /// Creates a signer invoking the binary at `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, mut command: Command) -> Result<()> {
        debug!(program = %self.program.display(), "invoking external signer");
        let output = command
            .output()
            .map_err(|e| Error::Signer(format!("{}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Signer(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Signer for ToolSigner {
    fn sign(&self, request: &SignRequest) -> Result<()> {
        let mut command = Command::new(&self.program);

        if request.adhoc {
            command.arg("-a");
        }
        if let Some(key) = &request.key_path {
            command.arg("-k").arg(key);
        }
        if let Some(profile) = &request.profile_path {
            command.arg("-m").arg(profile);
        }
        if let Some(entitlements) = &request.entitlements_path {
            command.arg("-e").arg(entitlements);
        }
        if request.remove_profile {
            command.arg("--remove-profile");
        }
        if let Some(password) = &request.key_password {
            command.env(PASSWORD_ENV, password.expose_secret());
        }
        command.arg(&request.app_path);

        self.run(command)
    }

    fn remove_dylibs(&self, executable: &Path, names: &[String]) -> Result<()> {
        let mut command = Command::new(&self.program);
        for name in names {
            command.arg("--remove-dylib").arg(name);
        }
        command.arg(executable);
        self.run(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_signer_error() {
        let signer = ToolSigner::new("/nonexistent/signing-tool");
        let request = SignRequest {
            app_path: "/tmp/Test.app".into(),
            profile_path: None,
            key_path: None,
            key_password: None,
            entitlements_path: None,
            remove_profile: false,
            adhoc: true,
        };
        assert!(matches!(signer.sign(&request), Err(Error::Signer(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_surfaces_stderr() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("fake-signer");
        fs::write(&tool, "#!/bin/sh\necho signing broke >&2\nexit 1\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let signer = ToolSigner::new(&tool);
        let err = signer
            .remove_dylibs(Path::new("/tmp/exe"), &["Evil.dylib".into()])
            .unwrap_err();
        assert!(err.to_string().contains("signing broke"));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_tool_receives_password_env() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use secrecy::SecretString;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("fake-signer");
        let marker = dir.path().join("seen-password");
        fs::write(
            &tool,
            format!("#!/bin/sh\nprintf %s \"${PASSWORD_ENV}\" > {}\n", marker.display()),
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let signer = ToolSigner::new(&tool);
        let request = SignRequest {
            app_path: dir.path().join("Test.app"),
            profile_path: None,
            key_path: None,
            key_password: Some(SecretString::from("hunter2".to_owned())),
            entitlements_path: None,
            remove_profile: false,
            adhoc: true,
        };
        signer.sign(&request).unwrap();
        assert_eq!(fs::read_to_string(marker).unwrap(), "hunter2");
    }
}
