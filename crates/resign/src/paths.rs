//! On-disk workspace layout.
//!
//! All of the pipeline's directories hang off one root: `Certificates/` for
//! credential directories, `Signed/` and `Unsigned/` for app bundles, and
//! `Archives/` for packaged output. Legacy roots from older layouts migrate
//! through an explicit pass with a reported per-item outcome.

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory layout rooted at one base directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a workspace rooted at `root`. Nothing is touched on disk
    /// until [`Workspace::ensure_layout`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The certificates directory.
    pub fn certificates(&self) -> PathBuf {
        self.root.join("Certificates")
    }

    /// The directory for the credential `id`.
    pub fn certificate_dir(&self, id: &str) -> PathBuf {
        self.certificates().join(id)
    }

    /// The signed-apps directory.
    pub fn signed(&self) -> PathBuf {
        self.root.join("Signed")
    }

    /// The signed-apps directory for one operation `id`.
    pub fn signed_dir(&self, id: &str) -> PathBuf {
        self.signed().join(id)
    }

    /// The unsigned-apps directory.
    pub fn unsigned(&self) -> PathBuf {
        self.root.join("Unsigned")
    }

    /// The unsigned-apps directory for one operation `id`.
    pub fn unsigned_dir(&self, id: &str) -> PathBuf {
        self.unsigned().join(id)
    }

    /// The packaged-archives directory.
    pub fn archives(&self) -> PathBuf {
        self.root.join("Archives")
    }

    /// Creates every layout directory that does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if a directory cannot be
    /// created.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.certificates(),
            self.signed(),
            self.unsigned(),
            self.archives(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Outcome for one item of a legacy migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Moved into the new layout.
    Moved,
    /// Left in place because the destination already exists.
    SkippedExists,
    /// Left in place because the move failed.
    Failed(String),
}

/// Per-item outcomes of one [`migrate_legacy_certificates`] run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// `(item name, outcome)` in directory order.
    pub items: Vec<(String, MigrationOutcome)>,
}

impl MigrationReport {
    /// Count of items with the given outcome kind.
    fn count(&self, matches: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| matches(o)).count()
    }

    /// Items moved into the new layout.
    pub fn moved(&self) -> usize {
        self.count(|o| *o == MigrationOutcome::Moved)
    }

    /// Items skipped because they already exist at the destination.
    pub fn skipped(&self) -> usize {
        self.count(|o| *o == MigrationOutcome::SkippedExists)
    }

    /// Items that failed to move and were left in place.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Failed(_)))
    }
}

/// Moves credential directories from `legacy_root` into the workspace's
/// certificates directory.
///
/// One explicit pass with a defined outcome per item: moved, skipped because
/// the destination exists, or failed and left in place. The legacy root is
/// removed afterwards only if it emptied out; nothing that failed to move is
/// ever deleted. A missing legacy root yields an empty report.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) only for failures around the
/// pass itself (listing the legacy root, creating the destination);
/// per-item failures are reported, not raised.
pub fn migrate_legacy_certificates(
    legacy_root: impl AsRef<Path>,
    workspace: &Workspace,
) -> Result<MigrationReport> {
    let legacy_root = legacy_root.as_ref();
    let mut report = MigrationReport::default();

    if !legacy_root.exists() {
        return Ok(report);
    }

    let certificates = workspace.certificates();
    fs::create_dir_all(&certificates)?;

    for entry in fs::read_dir(legacy_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let destination = certificates.join(entry.file_name());

        let outcome = if destination.exists() {
            MigrationOutcome::SkippedExists
        } else {
            match fs::rename(entry.path(), &destination) {
                Ok(()) => MigrationOutcome::Moved,
                Err(e) => {
                    warn!(item = %name, error = %e, "legacy certificate migration failed, left in place");
                    MigrationOutcome::Failed(e.to_string())
                }
            }
        };
        report.items.push((name, outcome));
    }

    // Only an emptied legacy root goes away; remove_dir refuses otherwise.
    let _ = fs::remove_dir(legacy_root);

    info!(
        moved = report.moved(),
        skipped = report.skipped(),
        failed = report.failed(),
        "legacy certificate migration complete"
    );
    Ok(report)
}
