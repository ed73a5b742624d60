//! IPA packaging.
//!
//! Stages a signed `.app` bundle into the standard `Payload/` layout and
//! zips it into an `.ipa`, optionally reporting fractional progress to an
//! observer. Packaging is a one-shot blocking sequence; a failed run leaves
//! partial output for the caller to discard.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for IPA creation, clamped to 0-9.
#[derive(Debug, Clone, Copy)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0). Fastest, largest output.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9). Smallest output, slowest.
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9; greater values clamp to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// The level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Copies the `.app` bundle at `app_dir` into `<work_dir>/Payload/<name>`,
/// returning the `Payload` directory.
///
/// # Errors
///
/// Returns [`Error::Io`] if the bundle is missing, not a directory, or any
/// file cannot be copied.
pub fn stage_payload(app_dir: impl AsRef<Path>, work_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let app_dir = app_dir.as_ref();
    if !app_dir.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("app bundle not found: {}", app_dir.display()),
        )));
    }

    let app_name = app_dir.file_name().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid app bundle path",
        ))
    })?;

    let payload = work_dir.as_ref().join("Payload");
    let dest = payload.join(app_name);
    fs::create_dir_all(&payload)?;
    copy_tree(app_dir, &dest)?;
    Ok(payload)
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
        let target = dest.join(relative);

        let metadata = fs::symlink_metadata(entry.path())?;
        if metadata.is_dir() {
            fs::create_dir_all(&target)?;
        } else if metadata.file_type().is_symlink() {
            #[cfg(unix)]
            {
                let link = fs::read_link(entry.path())?;
                std::os::unix::fs::symlink(link, &target)?;
            }
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Zips `payload_dir` (a `Payload/` tree) into the `.ipa` at `output`.
///
/// `progress`, when present, receives fractions in `0.0..=1.0` as entries
/// are written. Symlinks and unix permissions are preserved in the archive.
///
/// # Errors
///
/// Returns [`Error::Io`] for filesystem failures and [`Error::Zip`] for
/// archive write failures.
pub fn create_ipa(
    payload_dir: impl AsRef<Path>,
    output: impl AsRef<Path>,
    compression_level: CompressionLevel,
    mut progress: Option<&mut dyn FnMut(f64)>,
) -> Result<()> {
    let payload_dir = payload_dir.as_ref();
    let output = output.as_ref();

    if !payload_dir.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("payload directory not found: {}", payload_dir.display()),
        )));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let options = if compression_level.level() == 0 {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level.level() as i64))
    };

    let entries: Vec<_> = WalkDir::new(payload_dir)
        .follow_links(false)
        .into_iter()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
    let total = entries.len().max(1) as f64;

    let mut zip = ZipWriter::new(File::create(output)?);
    zip.add_directory("Payload/", options)?;

    for (index, entry) in entries.iter().enumerate() {
        let path = entry.path();
        let relative = path
            .strip_prefix(payload_dir)
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;

        let archive_path = if relative.as_os_str().is_empty() {
            String::from("Payload/")
        } else {
            format!("Payload/{}", relative.display())
        };

        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            let dir_path = if archive_path.ends_with('/') {
                archive_path
            } else {
                format!("{archive_path}/")
            };
            if dir_path != "Payload/" {
                zip.add_directory(dir_path, options)?;
            }
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(path)?;
            zip.add_symlink(archive_path.as_str(), target.to_string_lossy(), options)?;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(metadata.permissions().mode())
            };

            zip.start_file(archive_path.as_str(), options)?;
            let mut file = File::open(path)?;
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
        }

        if let Some(observer) = progress.as_deref_mut() {
            observer((index + 1) as f64 / total);
        }
    }

    zip.finish()?;
    Ok(())
}

/// Builds the archive file name `<name>_<version>_<unix-ts>.ipa`.
///
/// Both components are sanitized to a conservative charset and truncated;
/// empty components fall back to `Unknown` / `1.0`.
pub fn archive_file_name(name: &str, version: &str, when: SystemTime) -> String {
    let timestamp = when
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{}_{}_{}.ipa",
        sanitize_component(name, "Unknown"),
        sanitize_component(version, "1.0"),
        timestamp
    )
}

fn sanitize_component(value: &str, fallback: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(['.', '_', '-', ' ']);

    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.chars().take(64).collect()
    }
}
