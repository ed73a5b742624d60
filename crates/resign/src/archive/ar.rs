//! AR container decoding.
//!
//! The Unix `ar` container is a fixed-layout sequential format: an 8-byte
//! magic followed by 60-byte space-padded ASCII entry headers, each with the
//! entry's content immediately after and padded to a 2-byte boundary. Debian
//! packages and tweak bundles arrive in this container.

use crate::{Error, Result};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// AR container magic.
pub const MAGIC: &[u8; 8] = b"!<arch>\n";

const HEADER_LEN: usize = 60;

/// One decoded AR entry. Transient: exists only for the duration of an
/// extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArEntry {
    /// Entry file name.
    pub name: String,
    /// Modification time from the header.
    pub modified: SystemTime,
    /// Owner uid.
    pub owner_id: u32,
    /// Group gid.
    pub group_id: u32,
    /// File mode.
    pub mode: u32,
    /// Declared content length in bytes.
    pub size: usize,
    /// Content bytes.
    pub data: Vec<u8>,
}

/// Decodes the AR container at `path`.
///
/// # Errors
///
/// Returns [`Error::BadArchive`] on any structural failure; see [`parse`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<ArEntry>> {
    let data = fs::read(path.as_ref())
        .map_err(|_| Error::BadArchive("Unable to read archive".into()))?;
    parse(&data)
}

/// Decodes an AR container from raw bytes.
///
/// # Errors
///
/// Returns [`Error::BadArchive`] when the buffer is shorter than the magic,
/// the magic is wrong, a header is truncated, the size field is unparsable
/// or non-positive, the name is empty, or an entry's content extends past
/// the end of the buffer.
///
/// # Examples
///
/// ```
/// let mut data = b"!<arch>\n".to_vec();
/// data.extend_from_slice(b"foo.txt         ");
/// data.extend_from_slice(b"0           ");
/// data.extend_from_slice(b"0     0     100644  ");
/// data.extend_from_slice(b"10        `\n");
/// data.extend_from_slice(b"0123456789");
/// let entries = resign::archive::ar::parse(&data)?;
/// assert_eq!(entries[0].name, "foo.txt");
/// assert_eq!(entries[0].size, 10);
/// # Ok::<(), resign::Error>(())
/// ```
pub fn parse(data: &[u8]) -> Result<Vec<ArEntry>> {
    if data.len() < MAGIC.len() {
        return Err(Error::BadArchive("Invalid header".into()));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(Error::BadArchive("Invalid magic".into()));
    }

    let body = &data[MAGIC.len()..];
    let mut offset = 0usize;
    let mut entries = Vec::new();

    while offset < body.len() {
        let entry = parse_entry(body, offset)?;
        offset += HEADER_LEN + entry.size;
        // Entries are 2-byte aligned; skip the pad byte at odd offsets.
        offset += offset % 2;
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_entry(body: &[u8], offset: usize) -> Result<ArEntry> {
    if offset + HEADER_LEN > body.len() {
        return Err(Error::BadArchive("Unexpected end of header".into()));
    }
    let header = &body[offset..offset + HEADER_LEN];

    let size: usize = unpad(&header[48..58])
        .parse()
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| Error::BadArchive("Invalid size".into()))?;

    let name = unpad(&header[0..16]);
    if name.is_empty() {
        return Err(Error::BadArchive("Invalid name".into()));
    }

    if offset + HEADER_LEN + size > body.len() {
        return Err(Error::BadArchive("Invalid file size".into()));
    }

    let seconds: f64 = unpad(&header[16..28])
        .parse()
        .map_err(|_| Error::BadArchive("Invalid metadata".into()))?;
    // "inf" and out-of-range values parse as f64; reject them here rather
    // than letting the timestamp addition overflow.
    let modified = Duration::try_from_secs_f64(seconds.max(0.0))
        .map_err(|_| Error::BadArchive("Invalid metadata".into()))?;
    let owner_id: u32 = unpad(&header[28..34])
        .parse()
        .map_err(|_| Error::BadArchive("Invalid metadata".into()))?;
    let group_id: u32 = unpad(&header[34..40])
        .parse()
        .map_err(|_| Error::BadArchive("Invalid metadata".into()))?;
    let mode: u32 = unpad(&header[40..48])
        .parse()
        .map_err(|_| Error::BadArchive("Invalid metadata".into()))?;

    Ok(ArEntry {
        name,
        modified: UNIX_EPOCH + modified,
        owner_id,
        group_id,
        mode,
        size,
        data: body[offset + HEADER_LEN..offset + HEADER_LEN + size].to_vec(),
    })
}

/// Strips the space padding from a fixed-width field. Fields may be padded
/// on either side.
fn unpad(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim_matches(' ').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes one AR entry with the fixed 60-byte header layout.
    fn push_entry(out: &mut Vec<u8>, name: &str, mtime: u64, content: &[u8]) {
        out.extend_from_slice(format!("{name:<16}").as_bytes());
        out.extend_from_slice(format!("{mtime:<12}").as_bytes());
        out.extend_from_slice(format!("{:<6}", 0).as_bytes());
        out.extend_from_slice(format!("{:<6}", 0).as_bytes());
        out.extend_from_slice(format!("{:<8}", 100644).as_bytes());
        out.extend_from_slice(format!("{:<10}", content.len()).as_bytes());
        out.extend_from_slice(b"`\n");
        out.extend_from_slice(content);
        if (out.len() - MAGIC.len()) % 2 == 1 {
            out.push(b'\n');
        }
    }

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for (name, content) in entries {
            push_entry(&mut out, name, 1724000000, content);
        }
        out
    }

    #[test]
    fn test_round_trip_preserves_entries_in_order() {
        let expected: Vec<(&str, &[u8])> = vec![
            ("control.tar.gz", b"first entry bytes"),
            ("data.tar.lzma", b"second"),
            ("debian-binary", b"2.0\n"),
        ];
        let archive = build_archive(&expected);

        let entries = parse(&archive).unwrap();
        assert_eq!(entries.len(), 3);
        for (entry, (name, content)) in entries.iter().zip(&expected) {
            assert_eq!(entry.name, *name);
            assert_eq!(entry.size, content.len());
            assert_eq!(entry.data, *content);
        }
    }

    #[test]
    fn test_padded_fields_decode() {
        // Size field padded on the left, name on the right.
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.txt         ");
        data.extend_from_slice(b"1724000000  ");
        data.extend_from_slice(b"501   ");
        data.extend_from_slice(b"20    ");
        data.extend_from_slice(b"100644  ");
        data.extend_from_slice(b"        10");
        data.extend_from_slice(b"`\n");
        data.extend_from_slice(b"0123456789");

        let entries = parse(&data).unwrap();
        assert_eq!(entries[0].name, "foo.txt");
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].owner_id, 501);
        assert_eq!(entries[0].group_id, 20);
    }

    #[test]
    fn test_short_content_in_buffer_fails() {
        // Same header declaring 10 bytes, but only 8 present.
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.txt         ");
        data.extend_from_slice(b"1724000000  ");
        data.extend_from_slice(b"501   ");
        data.extend_from_slice(b"20    ");
        data.extend_from_slice(b"100644  ");
        data.extend_from_slice(b"        10");
        data.extend_from_slice(b"`\n");
        data.extend_from_slice(b"01234567");

        let err = parse(&data).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid file size"));
    }

    #[test]
    fn test_example_entry_decodes() {
        let archive = build_archive(&[("foo.txt", b"0123456789")]);
        let entries = parse(&archive).unwrap();
        assert_eq!(entries[0].name, "foo.txt");
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].data, b"0123456789");
        assert_eq!(entries[0].mode, 100644);
        assert_eq!(
            entries[0].modified,
            UNIX_EPOCH + Duration::from_secs(1724000000)
        );
    }

    #[test]
    fn test_truncated_content_fails() {
        let mut archive = build_archive(&[("foo.txt", b"0123456789")]);
        archive.truncate(archive.len() - 2);
        let err = parse(&archive).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid file size"));
    }

    #[test]
    fn test_short_buffer_fails() {
        let err = parse(b"!<arch").unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid header"));
    }

    #[test]
    fn test_wrong_magic_fails() {
        let err = parse(b"NOTANAR\n rest of data").unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid magic"));
    }

    #[test]
    fn test_truncated_header_fails() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.txt   ");
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Unexpected end of header"));
    }

    #[test]
    fn test_zero_size_fails() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.txt         ");
        data.extend_from_slice(b"0           ");
        data.extend_from_slice(b"0     0     100644  ");
        data.extend_from_slice(b"0         ");
        data.extend_from_slice(b"`\n");
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid size"));
    }

    fn archive_with_mtime(mtime: &str) -> Vec<u8> {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"foo.txt         ");
        data.extend_from_slice(format!("{mtime:<12}").as_bytes());
        data.extend_from_slice(b"0     0     100644  ");
        data.extend_from_slice(b"4         ");
        data.extend_from_slice(b"`\n");
        data.extend_from_slice(b"abcd");
        data
    }

    #[test]
    fn test_non_finite_mtime_is_invalid_metadata() {
        let err = parse(&archive_with_mtime("inf")).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid metadata"));
    }

    #[test]
    fn test_overflowing_mtime_is_invalid_metadata() {
        let err = parse(&archive_with_mtime("9e99")).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid metadata"));
    }

    #[test]
    fn test_negative_mtime_clamps_to_epoch() {
        let entries = parse(&archive_with_mtime("-100")).unwrap();
        assert_eq!(entries[0].modified, UNIX_EPOCH);
    }

    #[test]
    fn test_empty_name_fails() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"                ");
        data.extend_from_slice(b"0           ");
        data.extend_from_slice(b"0     0     100644  ");
        data.extend_from_slice(b"4         ");
        data.extend_from_slice(b"`\n");
        data.extend_from_slice(b"abcd");
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, Error::BadArchive(reason) if reason == "Invalid name"));
    }

    #[test]
    fn test_empty_archive_has_no_entries() {
        let entries = parse(MAGIC).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_odd_sized_entry_is_padded() {
        // "2.0\n" is 4 bytes (even) and "odd" is 3 (odd, padded); the third
        // entry must still decode cleanly after the pad byte.
        let archive = build_archive(&[
            ("debian-binary", b"2.0\n"),
            ("odd.txt", b"odd"),
            ("last.txt", b"tail"),
        ]);
        let entries = parse(&archive).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].data, b"odd");
        assert_eq!(entries[2].name, "last.txt");
    }

    #[test]
    fn test_parse_file_missing_is_bad_archive() {
        let err = parse_file("/nonexistent/bundle.deb").unwrap_err();
        assert!(matches!(err, Error::BadArchive(_)));
    }
}
