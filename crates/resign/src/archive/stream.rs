//! Whole-file decompression.
//!
//! Single-stream compressed files are decoded by an inverse transform
//! selected from the file extension, and the output lands next to the input
//! with the extension stripped.

use crate::{Error, Result};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions with a known inverse transform.
pub const RECOGNIZED_EXTENSIONS: [&str; 4] = ["xz", "lzma", "bz2", "gz"];

/// Whether `extension` (lowercase) maps to a known decompressor.
pub(crate) fn is_compressed_extension(extension: &str) -> bool {
    RECOGNIZED_EXTENSIONS.contains(&extension)
}

/// Decompresses the file at `path`, writing the output to the same path with
/// the compression extension stripped.
///
/// # Errors
///
/// - [`Error::UnsupportedFileExtension`] for an unrecognized extension.
/// - [`Error::BadArchive`] when the stream fails to decode.
/// - [`Error::Io`] when the input cannot be read or the output written.
pub fn decompress_file(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let data = fs::read(path)?;
    let decoded = decompress(&extension, &data)?;

    let output = path.with_extension("");
    fs::write(&output, decoded)?;
    debug!(input = %path.display(), output = %output.display(), "decompressed");
    Ok(output)
}

/// Applies the inverse transform for `extension` to `data`.
pub fn decompress(extension: &str, data: &[u8]) -> Result<Vec<u8>> {
    match extension {
        "xz" => {
            let mut output = Vec::new();
            lzma_rs::xz_decompress(&mut Cursor::new(data), &mut output)
                .map_err(|e| Error::BadArchive(format!("xz: {e:?}")))?;
            Ok(output)
        }
        "lzma" => {
            let mut output = Vec::new();
            lzma_rs::lzma_decompress(&mut Cursor::new(data), &mut output)
                .map_err(|e| Error::BadArchive(format!("lzma: {e:?}")))?;
            Ok(output)
        }
        "bz2" => {
            let mut output = Vec::new();
            bzip2::read::BzDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(|e| Error::BadArchive(format!("bz2: {e}")))?;
            Ok(output)
        }
        "gz" => {
            let mut output = Vec::new();
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(|e| Error::BadArchive(format!("gz: {e}")))?;
            Ok(output)
        }
        other => Err(Error::UnsupportedFileExtension(other.to_owned())),
    }
}
