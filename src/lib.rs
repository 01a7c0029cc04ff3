//! # mbdbsql - Backup Manifest Decoder with an SQL Index
//!
//! mbdbsql reads the `Manifest.mbdb` catalog written by mobile device
//! backups and rebuilds the backup's logical file table: every file,
//! directory and symlink with its ownership, timestamps, permissions and
//! extended properties.
//!
//! ## Pipeline
//!
//! - **Decode**: [`decode_catalog`] turns the binary stream into [`Record`]s
//! - **Resolve**: [`resolve`] classifies each record and derives its
//!   content identity, the name its bytes are stored under in the backup
//! - **Index**: [`IndexStore`] bulk-loads resolved records into SQLite and
//!   answers the [`CatalogQuery`] lookups
//!
//! ## Example
//!
//! ```rust,ignore
//! use mbdbsql::{Catalog, CatalogQuery, IdentityQuery, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::open("/path/to/backup", StoreConfig::Memory).await?;
//!     println!("{} with {} entries", catalog.version(), catalog.len());
//!
//!     let hit = catalog
//!         .store()
//!         .resolve_identity(&IdentityQuery::leaf("sms.db"))
//!         .await?;
//!     let row = catalog.store().by_id(hit.id).await?;
//!     println!("{:?}", catalog.storage_path(&row));
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod query;
pub mod resolver;
pub mod schema;

pub use backend::{IndexStore, StoreConfig};
pub use catalog::Catalog;
pub use cursor::ByteCursor;
pub use decoder::{decode_catalog, FormatVersion, Manifest, Record};
pub use error::{FormatError, MbdbError, Result, TruncatedData};
pub use query::{CatalogQuery, IdentityQuery, IndexRow, ResolvedIdentity};
pub use resolver::{identity_hash, resolve, resolve_all, ObjectType, ResolvedRecord};
