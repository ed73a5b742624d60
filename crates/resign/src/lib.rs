pub mod archive;
pub mod error;
pub mod package;
pub mod paths;
pub mod profile;
pub mod revocation;
pub mod secrets;
pub mod signing;
pub mod store;
pub mod validation;

pub use archive::extract_file;
pub use error::Error;
pub use package::{archive_file_name, create_ipa, stage_payload, CompressionLevel};
pub use paths::Workspace;
pub use profile::ProvisioningProfile;
pub use revocation::{
    HttpRevocationAuthority, RevocationAuthority, RevocationChecker, RevocationStatus,
};
pub use secrets::{MemorySecretStore, PlatformSecretStore, SecretStore};
pub use signing::{Resigner, SignRequest, Signer, SigningOptions, ToolSigner};
pub use store::{CredentialImporter, CredentialStore, SigningCredential};
pub use validation::{validate, ValidationReport, ValidationWarning};

pub type Result<T> = std::result::Result<T, Error>;
