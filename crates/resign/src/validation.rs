//! Entitlement validation.
//!
//! Compares the target bundle identifier and any custom entitlement
//! overrides against a decoded provisioning profile. Every rule produces an
//! independent, non-fatal warning; the caller gets all that apply alongside
//! the effective bundle id.

use crate::profile::ProvisioningProfile;
use crate::signing::SigningOptions;
use plist::Value;
use regex::Regex;
use std::fmt;
use std::path::Path;

/// One validation finding. Non-fatal; the signing flow proceeds regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// The effective bundle identifier is an empty string.
    EmptyBundleId,
    /// The profile declares no `application-identifier` entitlement.
    ProfileMissingAppIdentifier,
    /// The profile's `application-identifier` does not match the target
    /// bundle id under the wildcard rule.
    ProfileAppIdentifierMismatch,
    /// The profile's first team identifier is not a `.`-terminated prefix of
    /// its `application-identifier`.
    ProfileTeamIdentifierMismatch,
    /// The custom entitlements file could not be read as a dictionary.
    EntitlementsUnreadable,
    /// The custom entitlements declare no `application-identifier`.
    EntitlementsMissingAppIdentifier,
    /// The custom entitlements `application-identifier` does not match the
    /// target bundle id under the wildcard rule.
    EntitlementsAppIdentifierMismatch,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptyBundleId => "Bundle identifier is empty.",
            Self::ProfileMissingAppIdentifier => {
                "Provisioning profile does not declare application-identifier."
            }
            Self::ProfileAppIdentifierMismatch => {
                "Provisioning profile app ID does not match the target bundle ID."
            }
            Self::ProfileTeamIdentifierMismatch => {
                "Provisioning profile team identifier does not match application-identifier."
            }
            Self::EntitlementsUnreadable => "Unable to read custom entitlements file.",
            Self::EntitlementsMissingAppIdentifier => {
                "Custom entitlements do not declare application-identifier."
            }
            Self::EntitlementsAppIdentifierMismatch => {
                "Custom entitlements application-identifier does not match the target bundle ID."
            }
        };
        f.write_str(text)
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// The bundle id signing will use: the options override when present,
    /// else the app's own identifier.
    pub effective_bundle_id: Option<String>,
    /// All warnings that applied, in rule order.
    pub warnings: Vec<ValidationWarning>,
}

/// Validates `app_identifier` and the options' entitlement overrides against
/// `profile`.
///
/// # Examples
///
/// ```
/// use resign::signing::SigningOptions;
/// use resign::validation::validate;
///
/// let report = validate(Some("com.example.app"), &SigningOptions::default(), None);
/// assert_eq!(report.effective_bundle_id.as_deref(), Some("com.example.app"));
/// assert!(report.warnings.is_empty());
/// ```
pub fn validate(
    app_identifier: Option<&str>,
    options: &SigningOptions,
    profile: Option<&ProvisioningProfile>,
) -> ValidationReport {
    let effective_bundle_id = options
        .app_identifier
        .as_deref()
        .or(app_identifier)
        .map(str::to_owned);
    let mut warnings = Vec::new();

    if effective_bundle_id.as_deref().is_some_and(str::is_empty) {
        warnings.push(ValidationWarning::EmptyBundleId);
    }

    if let Some(profile) = profile {
        if let Some(app_id) = profile.application_identifier() {
            if let Some(bundle_id) = effective_bundle_id.as_deref() {
                if !matches_application_identifier(app_id, bundle_id) {
                    warnings.push(ValidationWarning::ProfileAppIdentifierMismatch);
                }
            }
        } else if effective_bundle_id.is_some() {
            warnings.push(ValidationWarning::ProfileMissingAppIdentifier);
        }

        if let Some(team_id) = profile.team_identifier() {
            if let Some(app_id) = profile.application_identifier() {
                if !app_id.starts_with(&format!("{team_id}.")) {
                    warnings.push(ValidationWarning::ProfileTeamIdentifierMismatch);
                }
            }
        }
    }

    if let Some(entitlements_path) = &options.entitlements_file {
        match load_entitlements(entitlements_path) {
            Some(entitlements) => {
                match entitlements
                    .get("application-identifier")
                    .and_then(Value::as_string)
                {
                    Some(app_id) => {
                        if let Some(bundle_id) = effective_bundle_id.as_deref() {
                            if !matches_application_identifier(app_id, bundle_id) {
                                warnings.push(ValidationWarning::EntitlementsAppIdentifierMismatch);
                            }
                        }
                    }
                    None => warnings.push(ValidationWarning::EntitlementsMissingAppIdentifier),
                }
            }
            None => warnings.push(ValidationWarning::EntitlementsUnreadable),
        }
    }

    ValidationReport {
        effective_bundle_id,
        warnings,
    }
}

fn load_entitlements(path: &Path) -> Option<plist::Dictionary> {
    plist::Value::from_file(path)
        .ok()?
        .into_dictionary()
}

/// Matches a wildcarded `application-identifier` against a bundle id.
///
/// The identifier has the form `TEAMID.suffix`; the suffix is everything
/// after the first `.`. A bare `*` suffix matches any bundle id; a suffix
/// containing `*` becomes an anchored pattern with every non-`*` character
/// escaped and each `*` matching any characters; otherwise the suffix must
/// equal the bundle id exactly.
pub fn matches_application_identifier(application_id: &str, bundle_id: &str) -> bool {
    let Some(dot) = application_id.find('.') else {
        return false;
    };
    let suffix = &application_id[dot + 1..];

    if suffix == "*" {
        return true;
    }

    if suffix.contains('*') {
        let pattern = format!("^{}$", regex::escape(suffix).replace("\\*", ".*"));
        return Regex::new(&pattern)
            .map(|re| re.is_match(bundle_id))
            .unwrap_or(false);
    }

    suffix == bundle_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn profile_with(app_id: Option<&str>, team_id: Option<&str>) -> ProvisioningProfile {
        let mut xml = String::from(r#"<?xml version="1.0"?><plist version="1.0"><dict>"#);
        if let Some(team) = team_id {
            xml.push_str(&format!(
                "<key>TeamIdentifier</key><array><string>{team}</string></array>"
            ));
        }
        xml.push_str("<key>Entitlements</key><dict>");
        if let Some(app) = app_id {
            xml.push_str(&format!(
                "<key>application-identifier</key><string>{app}</string>"
            ));
        }
        xml.push_str("</dict></dict></plist>");
        ProvisioningProfile::parse(xml.as_bytes()).unwrap()
    }

    fn entitlements_file(dir: &TempDir, app_id: &str) -> PathBuf {
        let path = dir.path().join("custom.entitlements");
        fs::write(
            &path,
            format!(
                r#"<?xml version="1.0"?><plist version="1.0"><dict>
                <key>application-identifier</key><string>{app_id}</string>
                </dict></plist>"#
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_wildcard_suffix_matches_prefix() {
        assert!(matches_application_identifier(
            "TEAM1.com.app.*",
            "com.app.anything"
        ));
        assert!(!matches_application_identifier(
            "TEAM1.com.app.*",
            "com.other"
        ));
    }

    #[test]
    fn test_bare_star_matches_everything() {
        assert!(matches_application_identifier("TEAM1.*", "com.app"));
        assert!(matches_application_identifier("TEAM1.*", "anything.at.all"));
    }

    #[test]
    fn test_exact_suffix_requires_equality() {
        assert!(matches_application_identifier("TEAM1.com.exact", "com.exact"));
        assert!(!matches_application_identifier(
            "TEAM1.com.exact",
            "com.exact.sub"
        ));
    }

    #[test]
    fn test_no_dot_never_matches() {
        assert!(!matches_application_identifier("TEAM1", "com.app"));
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        // The dots in the suffix are literals, not "any character".
        assert!(!matches_application_identifier(
            "TEAM1.com.app.*",
            "comXapp.thing"
        ));
    }

    #[test]
    fn test_override_takes_precedence() {
        let options = SigningOptions {
            app_identifier: Some("com.override".into()),
            ..Default::default()
        };
        let report = validate(Some("com.original"), &options, None);
        assert_eq!(report.effective_bundle_id.as_deref(), Some("com.override"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_bundle_id_warns() {
        let report = validate(Some(""), &SigningOptions::default(), None);
        assert_eq!(report.warnings, vec![ValidationWarning::EmptyBundleId]);
    }

    #[test]
    fn test_matching_profile_produces_no_warnings() {
        let profile = profile_with(Some("TEAM1.com.example.app"), Some("TEAM1"));
        let report = validate(
            Some("com.example.app"),
            &SigningOptions::default(),
            Some(&profile),
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_profile_mismatch_warns() {
        let profile = profile_with(Some("TEAM1.com.example.app"), Some("TEAM1"));
        let report = validate(Some("com.other"), &SigningOptions::default(), Some(&profile));
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::ProfileAppIdentifierMismatch]
        );
    }

    #[test]
    fn test_profile_missing_app_identifier_warns_only_with_bundle_id() {
        let profile = profile_with(None, None);

        let report = validate(Some("com.app"), &SigningOptions::default(), Some(&profile));
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::ProfileMissingAppIdentifier]
        );

        let report = validate(None, &SigningOptions::default(), Some(&profile));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_team_identifier_prefix_mismatch_warns() {
        let profile = profile_with(Some("OTHER.com.example.app"), Some("TEAM1"));
        let report = validate(
            Some("com.example.app"),
            &SigningOptions::default(),
            Some(&profile),
        );
        assert!(report
            .warnings
            .contains(&ValidationWarning::ProfileTeamIdentifierMismatch));
    }

    #[test]
    fn test_unreadable_entitlements_warns() {
        let options = SigningOptions {
            entitlements_file: Some("/nonexistent/custom.entitlements".into()),
            ..Default::default()
        };
        let report = validate(Some("com.app"), &options, None);
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::EntitlementsUnreadable]
        );
    }

    #[test]
    fn test_entitlements_missing_app_identifier_warns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.entitlements");
        fs::write(
            &path,
            br#"<?xml version="1.0"?><plist version="1.0"><dict>
            <key>get-task-allow</key><true/>
            </dict></plist>"#,
        )
        .unwrap();

        let options = SigningOptions {
            entitlements_file: Some(path),
            ..Default::default()
        };
        let report = validate(Some("com.app"), &options, None);
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::EntitlementsMissingAppIdentifier]
        );
    }

    #[test]
    fn test_entitlements_mismatch_warns() {
        let dir = TempDir::new().unwrap();
        let path = entitlements_file(&dir, "TEAM1.com.example.app");

        let options = SigningOptions {
            entitlements_file: Some(path),
            ..Default::default()
        };
        let report = validate(Some("com.other"), &options, None);
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::EntitlementsAppIdentifierMismatch]
        );
    }

    #[test]
    fn test_warnings_accumulate() {
        let dir = TempDir::new().unwrap();
        let path = entitlements_file(&dir, "TEAM1.com.example.app");
        let profile = profile_with(Some("OTHER.com.example.app"), Some("TEAM1"));

        let options = SigningOptions {
            entitlements_file: Some(path),
            ..Default::default()
        };
        let report = validate(Some("com.other"), &options, Some(&profile));
        assert_eq!(
            report.warnings,
            vec![
                ValidationWarning::ProfileAppIdentifierMismatch,
                ValidationWarning::ProfileTeamIdentifierMismatch,
                ValidationWarning::EntitlementsAppIdentifierMismatch,
            ]
        );
    }
}
