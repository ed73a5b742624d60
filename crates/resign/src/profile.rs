//! Provisioning profile decoding.
//!
//! Provisioning profiles are CMS-signed property lists. This module locates
//! the embedded plist payload, parses it, and exposes the fields the rest of
//! the pipeline cares about: entitlements, team identifiers, expiration, and
//! the PPQ flag recorded on imported credentials.

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// A decoded provisioning profile.
///
/// Read-only: derived from the profile file on each decode, never written
/// back. The entitlements dictionary keeps plist's own value model, so
/// heterogeneous entries (strings, booleans, arrays, nested dictionaries)
/// stay typed and can be inspected with the usual `as_*` accessors.
#[derive(Debug, Clone)]
pub struct ProvisioningProfile {
    /// Profile display name (`Name`).
    pub name: Option<String>,
    /// Profile UUID (`UUID`).
    pub uuid: Option<String>,
    /// Team display name (`TeamName`).
    pub team_name: Option<String>,
    /// Ordered team identifiers (`TeamIdentifier`).
    pub team_identifiers: Vec<String>,
    /// Creation timestamp, when the profile declares one.
    pub creation_date: Option<SystemTime>,
    /// Expiration timestamp, when the profile declares one.
    pub expiration_date: Option<SystemTime>,
    /// `PPQCheck` flag; false when absent.
    pub ppq_check: bool,
    /// Entitlement grants embedded in the profile.
    pub entitlements: Dictionary,
}

impl ProvisioningProfile {
    /// Decodes the profile at `path`.
    ///
    /// Returns `None` on any structural failure (unreadable file, no
    /// embedded plist, payload not a dictionary). Callers must treat `None`
    /// as "credential invalid" rather than raising further errors; the
    /// underlying reason is debug-logged here.
    pub fn decode(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::parse_file(path) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "provisioning profile failed to decode");
                None
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    /// Parses a profile from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialInvalid`] if no plist payload can be
    /// located or the payload is not a dictionary, and [`Error::Plist`] if
    /// the payload fails to parse.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let payload = embedded_plist(data)?;
        let value: Value = plist::from_bytes(payload)?;

        let dict = value
            .as_dictionary()
            .ok_or_else(|| Error::CredentialInvalid("profile payload is not a dictionary".into()))?;

        let entitlements = dict
            .get("Entitlements")
            .and_then(Value::as_dictionary)
            .cloned()
            .unwrap_or_default();

        let team_identifiers = dict
            .get("TeamIdentifier")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_string)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: string_field(dict, "Name"),
            uuid: string_field(dict, "UUID"),
            team_name: string_field(dict, "TeamName"),
            team_identifiers,
            creation_date: date_field(dict, "CreationDate"),
            expiration_date: date_field(dict, "ExpirationDate"),
            ppq_check: dict
                .get("PPQCheck")
                .and_then(Value::as_boolean)
                .unwrap_or(false),
            entitlements,
        })
    }

    /// The `application-identifier` entitlement, if declared.
    ///
    /// This is the `TEAMID.bundle-suffix` string matched against target
    /// bundle ids during validation.
    pub fn application_identifier(&self) -> Option<&str> {
        self.entitlements
            .get("application-identifier")
            .and_then(Value::as_string)
    }

    /// First team identifier, if any.
    pub fn team_identifier(&self) -> Option<&str> {
        self.team_identifiers.first().map(String::as_str)
    }
}

fn string_field(dict: &Dictionary, key: &str) -> Option<String> {
    dict.get(key).and_then(Value::as_string).map(str::to_owned)
}

fn date_field(dict: &Dictionary, key: &str) -> Option<SystemTime> {
    dict.get(key).and_then(Value::as_date).map(SystemTime::from)
}

/// Locates the plist payload inside a CMS-wrapped profile.
///
/// Profiles are DER envelopes with the plist embedded verbatim, so scanning
/// for the XML markers is enough. A buffer that is already a bare binary
/// plist is accepted as-is.
fn embedded_plist(data: &[u8]) -> Result<&[u8]> {
    if data.starts_with(b"bplist00") {
        return Ok(data);
    }

    let start = data
        .windows(5)
        .position(|w| w == b"<?xml")
        .ok_or_else(|| Error::CredentialInvalid("no plist found in profile".into()))?;

    let end = data[start..]
        .windows(8)
        .position(|w| w == b"</plist>")
        .map(|p| start + p + 8)
        .ok_or_else(|| Error::CredentialInvalid("unterminated plist in profile".into()))?;

    Ok(&data[start..end])
}
