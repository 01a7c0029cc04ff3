//! Read surface of a loaded catalog index
//!
//! External collaborators (browsers, exporters) work against [`CatalogQuery`]
//! and the row types here, never against the SQL schema directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resolver::ObjectType;
use crate::schema::device_time;

/// Persisted projection of one resolved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    /// Position in the catalog, starting at 1.
    pub id: i64,
    pub object_type: ObjectType,
    pub mode: u16,
    pub permissions: String,
    pub owner_uid: u32,
    pub group_gid: u32,
    pub file_length: u64,
    pub mtime: u32,
    pub atime: u32,
    pub ctime: u32,
    pub identity_hash: String,
    pub domain_type: String,
    pub domain_name: String,
    pub directory_path: String,
    pub leaf_name: String,
    pub link_target: String,
    pub content_hash: String,
    pub flag: u8,
    /// Only populated by [`CatalogQuery::by_id`].
    pub properties: BTreeMap<String, String>,
}

impl IndexRow {
    pub fn owner_hex(&self) -> String {
        format!("{:08x}", self.owner_uid)
    }

    pub fn group_hex(&self) -> String {
        format!("{:08x}", self.group_gid)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        device_time(self.mtime)
    }

    pub fn accessed(&self) -> Option<DateTime<Utc>> {
        device_time(self.atime)
    }

    pub fn changed(&self) -> Option<DateTime<Utc>> {
        device_time(self.ctime)
    }

    /// Where the backup keeps this entry's bytes, for regular files only.
    pub fn storage_path(&self, backup_root: &Path) -> Option<PathBuf> {
        match self.object_type {
            ObjectType::File => Some(backup_root.join(&self.identity_hash)),
            _ => None,
        }
    }
}

/// Criteria for [`CatalogQuery::resolve_identity`].
///
/// Empty fields are ignored; at least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityQuery {
    pub leaf_name: String,
    pub directory_path: String,
    pub domain_type: String,
}

impl IdentityQuery {
    /// Match on file name alone, e.g. a well-known settings plist.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            leaf_name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_directory(mut self, path: impl Into<String>) -> Self {
        self.directory_path = path.into();
        self
    }

    pub fn in_domain_type(mut self, domain_type: impl Into<String>) -> Self {
        self.domain_type = domain_type.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_name.is_empty() && self.directory_path.is_empty() && self.domain_type.is_empty()
    }
}

/// Result of an identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub id: i64,
    pub identity_hash: String,
}

/// Hierarchical and point lookups over a loaded catalog.
///
/// Enumerations return distinct values in ascending byte order. Lookups
/// that can miss return [`crate::MbdbError::NotFound`]; enumerations with no
/// matches return an empty list.
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    /// Distinct domain types, e.g. `AppDomain`, `HomeDomain`.
    async fn domain_types(&self) -> Result<Vec<String>>;

    /// Distinct domain names under one domain type.
    async fn domain_members(&self, domain_type: &str) -> Result<Vec<String>>;

    /// Distinct directory paths within one domain.
    async fn paths_of_domain(&self, domain_type: &str, domain_name: &str) -> Result<Vec<String>>;

    /// Rows in exactly one directory of one domain, ordered by leaf name.
    async fn entries_in_path(
        &self,
        domain_type: &str,
        domain_name: &str,
        directory_path: &str,
    ) -> Result<Vec<IndexRow>>;

    /// One row with its properties merged in.
    async fn by_id(&self, id: i64) -> Result<IndexRow>;

    /// First row (lowest id) matching every non-empty criterion.
    async fn resolve_identity(&self, query: &IdentityQuery) -> Result<ResolvedIdentity>;
}
