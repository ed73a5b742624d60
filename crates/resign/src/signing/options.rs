//! Signing options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Caller-configurable signing behavior.
///
/// Loadable from JSON; unknown fields are rejected and missing fields take
/// their defaults, so an options file only needs the keys it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigningOptions {
    /// Bundle identifier override. When absent, the app's own identifier is
    /// used.
    pub app_identifier: Option<String>,
    /// Custom entitlements plist handed to the signer and checked during
    /// validation.
    pub entitlements_file: Option<PathBuf>,
    /// Injected-library names to strip from the main executable before
    /// signing. Empty means no disinjection step.
    pub disinjection_files: Vec<String>,
    /// Strip the embedded provisioning profile from the signed bundle.
    pub remove_provisioning: bool,
    /// ZIP compression level for packaging, 0-9.
    pub compression_level: u32,
}
