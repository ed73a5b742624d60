//! Archive decoding and safe extraction.
//!
//! Three layers feed the signing pipeline's inputs:
//!
//! - [`ar`] - the fixed-header AR container Debian packages arrive in.
//! - [`decompress_file`] - whole-file inverse transforms selected by
//!   extension (`xz`, `lzma`, `bz2`, `gz`).
//! - [`expand_tar`] - tar expansion into a fresh directory with
//!   path-escape protection.
//!
//! [`extract_file`] dispatches between the last two by extension.

pub mod ar;
mod stream;
mod tar;

pub use stream::{decompress, decompress_file, RECOGNIZED_EXTENSIONS};
pub use tar::expand_tar;

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Extracts `path` one step: decompresses a recognized compressed file to a
/// sibling with the extension stripped, or expands a `.tar` into a new
/// directory and returns it.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFileExtension`] for anything else, and the
/// underlying decode/expand errors otherwise.
pub fn extract_file(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if stream::is_compressed_extension(&extension) {
        return decompress_file(path);
    }
    if extension == "tar" {
        return expand_tar(path);
    }
    Err(Error::UnsupportedFileExtension(extension))
}
