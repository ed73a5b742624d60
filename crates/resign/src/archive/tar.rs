//! Safe tar expansion.
//!
//! Expands a tar container into a freshly created directory, rejecting any
//! entry whose name would resolve outside it (zip-slip). Unsafe entries are
//! logged and skipped; they never fail the extraction as a whole.

use crate::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::warn;
use uuid::Uuid;

/// Expands the tar file at `path` into a new UUID-named directory next to
/// it, returning that directory.
///
/// Directory entries are created, regular files are written with their
/// parent directories ensured, and every other entry type is ignored
/// silently. Entries that would escape the extraction root are warn-logged
/// and skipped.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) when the container cannot be read
/// or a safe entry cannot be written.
pub fn expand_tar(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let root = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(Uuid::new_v4().to_string());
    fs::create_dir_all(&root)?;

    let mut archive = Archive::new(File::open(path)?);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        let Some(dest) = safe_entry_path(&root, &name) else {
            warn!(entry = %name, "skipped unsafe tar entry");
            continue;
        };

        match entry.header().entry_type() {
            EntryType::Directory => fs::create_dir_all(&dest)?,
            EntryType::Regular => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut output = File::create(&dest)?;
                io::copy(&mut entry, &mut output)?;
            }
            _ => {}
        }
    }

    Ok(root)
}

/// Resolves an entry name against the extraction root, lexically.
///
/// Returns `None` for names that are empty, absolute, or whose parent
/// components would step to or above the root. Interior `a/../b` segments
/// normalize as long as they stay strictly below the root.
fn safe_entry_path(root: &Path, name: &str) -> Option<PathBuf> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let relative = Path::new(trimmed);
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root means the entry escapes it.
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    let mut dest = root.to_path_buf();
    dest.extend(parts);
    Some(dest)
}
