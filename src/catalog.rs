//! Load pipeline: catalog bytes to a queryable index
//!
//! Decoding and resolution are CPU-bound and run on the blocking pool so an
//! async caller stays responsive while a large catalog loads.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    backend::{IndexStore, StoreConfig},
    decoder::{decode_catalog, FormatVersion},
    error::Result,
    query::IndexRow,
    resolver::{resolve_all, ResolvedRecord},
    schema::MANIFEST_FILE,
};

/// A decoded backup catalog with its index.
#[derive(Debug, Clone)]
pub struct Catalog {
    backup_root: PathBuf,
    version: FormatVersion,
    store: IndexStore,
}

impl Catalog {
    /// Load `<backup_root>/Manifest.mbdb`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use mbdbsql::{Catalog, CatalogQuery, IdentityQuery, StoreConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let catalog = Catalog::open("/path/to/backup", StoreConfig::Memory).await?;
    ///     for domain_type in catalog.store().domain_types().await? {
    ///         println!("{domain_type}");
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn open(backup_root: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let backup_root = backup_root.as_ref().to_path_buf();
        let bytes = tokio::fs::read(backup_root.join(MANIFEST_FILE)).await?;
        Self::from_bytes(bytes, backup_root, config).await
    }

    /// Load a catalog already read into memory.
    pub async fn from_bytes(
        bytes: Vec<u8>,
        backup_root: impl Into<PathBuf>,
        config: StoreConfig,
    ) -> Result<Self> {
        let backup_root = backup_root.into();
        let (version, records) = tokio::task::spawn_blocking(move || decode_and_resolve(&bytes)).await??;

        info!(
            %version,
            records = records.len(),
            root = %backup_root.display(),
            "catalog decoded"
        );

        let store = IndexStore::load(config, &records).await?;
        Ok(Self {
            backup_root,
            version,
            store,
        })
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Number of entries in the catalog.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Read surface shared with external collaborators.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// On-disk location of a regular file's content inside this backup.
    pub fn storage_path(&self, row: &IndexRow) -> Option<PathBuf> {
        row.storage_path(&self.backup_root)
    }
}

fn decode_and_resolve(bytes: &[u8]) -> Result<(FormatVersion, Vec<ResolvedRecord>)> {
    let manifest = decode_catalog(bytes)?;
    let records = resolve_all(manifest.records)?;
    Ok((manifest.version, records))
}
