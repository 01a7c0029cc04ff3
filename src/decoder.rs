//! Record decoder for `Manifest.mbdb` catalogs
//!
//! The catalog is a 6-byte header followed by back-to-back variable-length
//! entries. Field offsets depend on every field before them, so decoding is
//! a single sequential pass over a buffer held fully in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::error::{FormatError, Result, TruncatedData};
use crate::schema::{HEADER_LEN, MAGIC};

/// Version pair from the catalog header. Kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mbdb {}.{}", self.major, self.minor)
    }
}

/// One catalog entry as it appears on the wire.
///
/// Timestamps are raw 32-bit values; see [`crate::schema::device_time`] for
/// converting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub domain: String,
    pub path: String,
    /// Empty unless the entry is a symlink.
    pub link_target: String,
    /// Hex rendering of the stored content digest, empty if none.
    pub content_hash: String,
    pub mode: u16,
    pub owner_uid: u32,
    pub group_gid: u32,
    pub mtime: u32,
    pub atime: u32,
    pub ctime: u32,
    pub file_length: u64,
    pub flag: u8,
    pub properties: BTreeMap<String, String>,
    /// Byte range of this entry within the catalog buffer.
    pub span: Range<usize>,
}

/// A fully decoded catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: FormatVersion,
    pub records: Vec<Record>,
}

/// Decode a whole catalog buffer.
///
/// Any short read aborts the decode; no partially decoded catalog is ever
/// returned.
pub fn decode_catalog(buf: &[u8]) -> Result<Manifest> {
    let version = decode_header(buf)?;

    let mut cursor = ByteCursor::new(buf, HEADER_LEN);
    let mut records = Vec::new();
    while !cursor.is_at_end() {
        let record = decode_record(&mut cursor).map_err(|source| FormatError::Truncated {
            record: records.len(),
            source,
        })?;
        records.push(record);
    }

    Ok(Manifest { version, records })
}

/// Check the magic tag and return the version pair.
pub fn decode_header(buf: &[u8]) -> std::result::Result<FormatVersion, FormatError> {
    if buf.len() < HEADER_LEN {
        return Err(FormatError::MissingHeader { len: buf.len() });
    }
    let mut found = [0u8; 4];
    found.copy_from_slice(&buf[..4]);
    if &found != MAGIC {
        return Err(FormatError::BadMagic { found });
    }
    Ok(FormatVersion {
        major: buf[4],
        minor: buf[5],
    })
}

/// Decode the entry starting at the cursor's offset.
pub fn decode_record(cursor: &mut ByteCursor<'_>) -> std::result::Result<Record, TruncatedData> {
    let start = cursor.offset();

    let domain = cursor.read_string()?;
    let path = cursor.read_string()?;
    let link_target = cursor.read_string()?;
    let content_hash = cursor.read_hash()?;
    cursor.read_string()?; // unused
    let mode = cursor.read_u16()?;
    cursor.read_u32()?;
    cursor.read_u32()?;
    let owner_uid = cursor.read_u32()?;
    let group_gid = cursor.read_u32()?;
    let mtime = cursor.read_u32()?;
    let atime = cursor.read_u32()?;
    let ctime = cursor.read_u32()?;
    let file_length = cursor.read_u64()?;
    let flag = cursor.read_u8()?;

    let count = cursor.read_u8()?;
    let mut properties = BTreeMap::new();
    for _ in 0..count {
        let name = cursor.read_string()?;
        let value = cursor.read_string()?;
        properties.insert(name, value);
    }

    Ok(Record {
        domain,
        path,
        link_target,
        content_hash,
        mode,
        owner_uid,
        group_gid,
        mtime,
        atime,
        ctime,
        file_length,
        flag,
        properties,
        span: start..cursor.offset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MbdbError;

    fn push_str(buf: &mut Vec<u8>, s: Option<&[u8]>) {
        match s {
            None => buf.extend_from_slice(&[0xFF, 0xFF]),
            Some(bytes) => {
                buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }

    fn entry(domain: &str, path: &str, mode: u16, props: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_str(&mut buf, Some(domain.as_bytes()));
        push_str(&mut buf, Some(path.as_bytes()));
        push_str(&mut buf, None);
        push_str(&mut buf, Some(&[0xDE, 0xAD, 0xBE, 0xEF]));
        push_str(&mut buf, None);
        buf.extend_from_slice(&mode.to_be_bytes());
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&501u32.to_be_bytes());
        buf.extend_from_slice(&20u32.to_be_bytes());
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(&200u32.to_be_bytes());
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&4096u64.to_be_bytes());
        buf.push(4);
        buf.push(props.len() as u8);
        for (k, v) in props {
            push_str(&mut buf, Some(k.as_bytes()));
            push_str(&mut buf, Some(v.as_bytes()));
        }
        buf
    }

    fn catalog(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = b"mbdb".to_vec();
        buf.extend_from_slice(&[5, 0]);
        for e in entries {
            buf.extend_from_slice(e);
        }
        buf
    }

    #[test]
    fn test_decode_single_record() {
        let buf = catalog(&[entry("HomeDomain", "Library/a.db", 0x81A4, &[("k", "v")])]);
        let manifest = decode_catalog(&buf).unwrap();

        assert_eq!(manifest.version, FormatVersion { major: 5, minor: 0 });
        assert_eq!(manifest.records.len(), 1);
        let r = &manifest.records[0];
        assert_eq!(r.domain, "HomeDomain");
        assert_eq!(r.path, "Library/a.db");
        assert_eq!(r.link_target, "");
        assert_eq!(r.content_hash, "deadbeef");
        assert_eq!(r.mode, 0x81A4);
        assert_eq!((r.owner_uid, r.group_gid), (501, 20));
        assert_eq!((r.mtime, r.atime, r.ctime), (100, 200, 300));
        assert_eq!(r.file_length, 4096);
        assert_eq!(r.flag, 4);
        assert_eq!(r.properties.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_spans_cover_the_body_exactly() {
        let buf = catalog(&[
            entry("A", "x", 0x41ED, &[]),
            entry("B", "y/z", 0x81A4, &[("p", "q"), ("r", "")]),
        ]);
        let manifest = decode_catalog(&buf).unwrap();

        let consumed: usize = manifest.records.iter().map(|r| r.span.len()).sum();
        assert_eq!(consumed, buf.len() - HEADER_LEN);
        assert_eq!(manifest.records[0].span.start, HEADER_LEN);
        assert_eq!(manifest.records[0].span.end, manifest.records[1].span.start);
    }

    #[test]
    fn test_zero_properties_is_empty_map() {
        let buf = catalog(&[entry("A", "x", 0x41ED, &[])]);
        let manifest = decode_catalog(&buf).unwrap();
        assert!(manifest.records[0].properties.is_empty());
    }

    #[test]
    fn test_header_only_catalog_is_empty() {
        let manifest = decode_catalog(b"mbdb\x05\x00").unwrap();
        assert!(manifest.records.is_empty());
        assert_eq!(manifest.version.to_string(), "mbdb 5.0");
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let err = decode_catalog(b"mbdx\x05\x00").unwrap_err();
        assert!(matches!(
            err,
            MbdbError::Format(FormatError::BadMagic { found }) if &found == b"mbdx"
        ));

        let err = decode_catalog(b"mbd").unwrap_err();
        assert!(matches!(err, MbdbError::Format(FormatError::MissingHeader { len: 3 })));
    }

    #[test]
    fn test_truncated_second_record_fails_whole_decode() {
        let mut buf = catalog(&[
            entry("A", "x", 0x41ED, &[]),
            entry("B", "y", 0x81A4, &[("name", "value")]),
        ]);
        buf.truncate(buf.len() - 3);

        let err = decode_catalog(&buf).unwrap_err();
        match err {
            MbdbError::Format(FormatError::Truncated { record, .. }) => assert_eq!(record, 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
