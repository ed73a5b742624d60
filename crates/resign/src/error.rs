//! Error types for signing identity and extraction operations.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases
//! in credential management, archive handling, validation, and signing
//! orchestration.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use crate::secrets::SecretStoreError;
use thiserror::Error;

/// Error type for signing pipeline operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses
/// this error type. Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use resign::{archive, Error};
///
/// match archive::extract_file("tweak.deb.gz") {
///     Ok(path) => println!("extracted to {}", path.display()),
///     Err(Error::UnsupportedFileExtension(ext)) => eprintln!("cannot handle .{ext}"),
///     Err(e) => eprintln!("extraction failed: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading inputs, writing outputs, or manipulating the
    /// credential directories on disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed archive container.
    ///
    /// The input is not a valid fixed-header archive: bad magic, truncated
    /// header, unparsable size field, or content running past the end of
    /// the buffer. The reason string describes which check failed.
    #[error("Bad archive: {0}")]
    BadArchive(String),

    /// The file extension does not map to a known decompressor.
    ///
    /// See [`crate::archive::extract_file`] for the recognized extensions.
    #[error("Unsupported file extension: {0}")]
    UnsupportedFileExtension(String),

    /// Signing was requested without a credential.
    ///
    /// Returned by [`crate::signing::Resigner::sign`] when no credential
    /// handle was attached. Use ad-hoc signing for credential-less flows.
    #[error("No signing credential available")]
    MissingCredential,

    /// The credential's provisioning profile failed to decode.
    ///
    /// A credential whose profile cannot be parsed is unusable; callers
    /// should treat this as a terminal failure for the affected credential.
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    /// The secret store rejected an operation.
    ///
    /// Carries the backend status. Absence of a secret is *not* an error;
    /// lookups report that as `None`.
    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),

    /// Copying credential files into the store directory failed.
    #[error("Copy failed: {0}")]
    Copy(String),

    /// The external signer reported a failure.
    ///
    /// Carries the tool's diagnostic output where available.
    #[error("Signer failed: {0}")]
    Signer(String),

    /// The revocation authority could not produce a verdict.
    ///
    /// Checker logic treats this as an inconclusive result and leaves the
    /// credential record unchanged.
    #[error("Revocation authority error: {0}")]
    Authority(String),

    /// Property list parsing failed.
    ///
    /// Failed to parse a provisioning profile payload, `Info.plist`, or an
    /// entitlements file.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// Credential record serialization failed.
    #[error("Record error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive operation failed.
    ///
    /// Occurs while packaging a signed bundle. See [`crate::package`].
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
