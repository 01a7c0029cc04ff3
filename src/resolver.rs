//! Classification and identity for decoded records
//!
//! Everything here is a pure function of a single [`Record`]; records can be
//! resolved in any order or in parallel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::decoder::Record;
use crate::error::{MbdbError, Result};
use crate::schema::mode::{PERM_MASK, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};

/// Kind of object a catalog entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    File,
    Directory,
    Symlink,
}

impl ObjectType {
    /// Classify from the mode's type bits. `None` for anything else.
    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode & S_IFMT {
            S_IFLNK => Some(ObjectType::Symlink),
            S_IFREG => Some(ObjectType::File),
            S_IFDIR => Some(ObjectType::Directory),
            _ => None,
        }
    }

    /// The `ls -l` style marker: `-`, `d` or `l`.
    pub fn as_char(self) -> char {
        match self {
            ObjectType::File => '-',
            ObjectType::Directory => 'd',
            ObjectType::Symlink => 'l',
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for ObjectType {
    type Err = MbdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "-" => Ok(ObjectType::File),
            "d" => Ok(ObjectType::Directory),
            "l" => Ok(ObjectType::Symlink),
            other => Err(MbdbError::Query(format!("unknown object type marker {other:?}"))),
        }
    }
}

/// A record together with everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub record: Record,
    pub object_type: ObjectType,
    pub permissions: String,
    pub domain_type: String,
    pub domain_name: String,
    pub directory_path: String,
    pub leaf_name: String,
    pub identity_hash: String,
}

/// Derive classification, splits and identity for one record.
pub fn resolve(record: Record) -> Result<ResolvedRecord> {
    let object_type =
        ObjectType::from_mode(record.mode).ok_or_else(|| MbdbError::Classification {
            mode: record.mode,
            domain: record.domain.clone(),
            path: record.path.clone(),
        })?;

    let (domain_type, domain_name) = split_domain(&record.domain);
    let (directory_path, leaf_name) = split_path(&record.path, object_type);

    Ok(ResolvedRecord {
        object_type,
        permissions: permission_string(record.mode),
        domain_type: domain_type.to_string(),
        domain_name: domain_name.to_string(),
        directory_path: directory_path.to_string(),
        leaf_name: leaf_name.to_string(),
        identity_hash: identity_hash(&record.domain, &record.path),
        record,
    })
}

/// Resolve a batch, failing on the first unclassifiable record.
pub fn resolve_all(records: Vec<Record>) -> Result<Vec<ResolvedRecord>> {
    records.into_iter().map(resolve).collect()
}

/// Render the low 9 permission bits as `rwxrwxrwx`.
///
/// Setuid, setgid and sticky bits are masked in but not rendered.
pub fn permission_string(mode: u16) -> String {
    let bits = mode & PERM_MASK;
    let mut out = String::with_capacity(9);
    for shift in [6u16, 3, 0] {
        let triad = (bits >> shift) & 0o7;
        out.push(if triad & 0o4 != 0 { 'r' } else { '-' });
        out.push(if triad & 0o2 != 0 { 'w' } else { '-' });
        out.push(if triad & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Split `AppDomain-com.example.app` into `("AppDomain", "com.example.app")`.
///
/// Only the first hyphen separates; the name keeps any later ones.
pub fn split_domain(domain: &str) -> (&str, &str) {
    domain.split_once('-').unwrap_or((domain, ""))
}

/// Split a path into its directory and leaf.
///
/// Directories are kept whole with an empty leaf, so a directory entry keys
/// into the hierarchy under its own path.
pub fn split_path(path: &str, object_type: ObjectType) -> (&str, &str) {
    match object_type {
        ObjectType::Directory => (path, ""),
        _ => path.rsplit_once('/').unwrap_or(("", path)),
    }
}

/// SHA-1 of `"<domain>-<path>"` as lowercase hex.
///
/// This is the name the backup stores the entry's content under.
pub fn identity_hash(domain: &str, path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"-");
    hasher.update(path.as_bytes());
    format!("{:x}", hasher.finalize())
}
