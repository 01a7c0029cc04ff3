//! SQLite-backed index over resolved catalog records
//!
//! An [`IndexStore`] is only handed out after its bulk load has committed, so
//! readers never see a partially loaded catalog. After that the store is
//! read-only and can be cloned freely across tasks.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{
    error::Result,
    query::{CatalogQuery, IdentityQuery, IndexRow, ResolvedIdentity},
    resolver::ResolvedRecord,
    schema::SCHEMA,
    MbdbError,
};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite,
};
use tracing::{debug, info, warn};

/// Where the index lives
#[derive(Debug, Clone, Default)]
pub enum StoreConfig {
    /// Private in-memory database, unique to one store
    #[default]
    Memory,

    /// SQLite file, created if missing. Loading into a file that already
    /// holds an index fails with [`MbdbError::IndexExists`].
    File(PathBuf),
}

const MAX_READERS: u32 = 4;

const ENTRY_COLUMNS: &str = "id, object_type, mode, permissions, owner_uid, group_gid, \
     file_length, mtime, atime, ctime, identity_hash, domain_type, domain_name, \
     directory_path, leaf_name, link_target, content_hash, flag";

/// Loaded, read-only catalog index
#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: SqlitePool,
    rows: usize,
    properties: usize,
}

impl IndexStore {
    /// Create a store and bulk-load `records` into it.
    ///
    /// Rows get ids 1, 2, 3... in slice order. Schema creation and every
    /// insert run in a single transaction: on error nothing is committed and
    /// no store is returned.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use mbdbsql::{decode_catalog, resolve_all, IndexStore, StoreConfig};
    ///
    /// let manifest = decode_catalog(&bytes)?;
    /// let records = resolve_all(manifest.records)?;
    /// let store = IndexStore::load(StoreConfig::Memory, &records).await?;
    /// ```
    pub async fn load(config: StoreConfig, records: &[ResolvedRecord]) -> Result<Self> {
        let options = match &config {
            // Each parse of ":memory:" names a fresh shared-cache database, and
            // every pooled connection is opened from this same options value.
            StoreConfig::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
            StoreConfig::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        };

        // The in-memory database disappears with its last connection, so one
        // connection is kept open for the life of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_READERS)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| MbdbError::Connection(e.to_string()))?;

        let mut store = Self {
            pool,
            rows: 0,
            properties: 0,
        };

        if let Err(e) = store.bulk_load(&config, records).await {
            store.pool.close().await;
            return Err(e);
        }

        info!(
            rows = store.rows,
            properties = store.properties,
            ?config,
            "catalog index loaded"
        );
        Ok(store)
    }

    /// Convenience constructor for an in-memory store
    pub async fn memory(records: &[ResolvedRecord]) -> Result<Self> {
        Self::load(StoreConfig::Memory, records).await
    }

    /// Convenience constructor for a file-backed store
    pub async fn file(path: impl Into<PathBuf>, records: &[ResolvedRecord]) -> Result<Self> {
        Self::load(StoreConfig::File(path.into()), records).await
    }

    /// Number of rows loaded.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of property rows loaded across all entries.
    pub fn property_count(&self) -> usize {
        self.properties
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create the schema and insert every record in one transaction.
    ///
    /// A database that already holds an index is refused: another store may
    /// still be reading its rows.
    async fn bulk_load(&mut self, config: &StoreConfig, records: &[ResolvedRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name IN ('entries', 'properties') LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(table) = existing {
            return Err(MbdbError::IndexExists(format!(
                "{config:?} already has a `{table}` table"
            )));
        }

        debug!("creating index schema");
        sqlx::Executor::execute(&mut *tx, SCHEMA)
            .await
            .map_err(|e| MbdbError::Migration(format!("Failed to create index schema: {}", e)))?;

        let mut first_seen: HashMap<&str, i64> = HashMap::with_capacity(records.len());
        let mut properties = 0;

        for (idx, rec) in records.iter().enumerate() {
            let id = idx as i64 + 1;

            // Colliding identities are kept; both rows stay reachable by id.
            if let Some(first) = first_seen.get(rec.identity_hash.as_str()) {
                warn!(
                    identity = %rec.identity_hash,
                    first_id = *first,
                    duplicate_id = id,
                    "duplicate identity hash in catalog"
                );
            } else {
                first_seen.insert(&rec.identity_hash, id);
            }

            let r = &rec.record;
            sqlx::query(
                "INSERT INTO entries (id, object_type, mode, permissions, owner_uid, group_gid, \
                 file_length, mtime, atime, ctime, identity_hash, domain_type, domain_name, \
                 directory_path, leaf_name, link_target, content_hash, flag) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )
            .bind(id)
            .bind(rec.object_type.to_string())
            .bind(i64::from(r.mode))
            .bind(&rec.permissions)
            .bind(i64::from(r.owner_uid))
            .bind(i64::from(r.group_gid))
            // stored bit-for-bit; read back with the inverse cast
            .bind(r.file_length as i64)
            .bind(i64::from(r.mtime))
            .bind(i64::from(r.atime))
            .bind(i64::from(r.ctime))
            .bind(&rec.identity_hash)
            .bind(&rec.domain_type)
            .bind(&rec.domain_name)
            .bind(&rec.directory_path)
            .bind(&rec.leaf_name)
            .bind(&r.link_target)
            .bind(&r.content_hash)
            .bind(i64::from(r.flag))
            .execute(&mut *tx)
            .await?;

            for (name, value) in &r.properties {
                sqlx::query("INSERT INTO properties (owner_id, name, value) VALUES (?1, ?2, ?3)")
                    .bind(id)
                    .bind(name)
                    .bind(value)
                    .execute(&mut *tx)
                    .await?;
                properties += 1;
            }
        }

        tx.commit().await?;

        self.rows = records.len();
        self.properties = properties;
        Ok(())
    }

    async fn distinct(&self, sql: &str, binds: &[&str]) -> Result<Vec<String>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(MbdbError::from))
            .collect()
    }

    async fn properties_of(&self, id: i64) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT name, value FROM properties WHERE owner_id = ?1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, String)> {
                Ok((row.try_get("name")?, row.try_get("value")?))
            })
            .collect()
    }
}

/// Convert an `entries` row to an [`IndexRow`] without properties
fn convert_row(row: &SqliteRow) -> Result<IndexRow> {
    let object_type: String = row.try_get("object_type")?;

    Ok(IndexRow {
        id: row.try_get("id")?,
        object_type: object_type.parse()?,
        mode: narrow(row, "mode")?,
        permissions: row.try_get("permissions")?,
        owner_uid: narrow(row, "owner_uid")?,
        group_gid: narrow(row, "group_gid")?,
        file_length: row.try_get::<i64, _>("file_length")? as u64,
        mtime: narrow(row, "mtime")?,
        atime: narrow(row, "atime")?,
        ctime: narrow(row, "ctime")?,
        identity_hash: row.try_get("identity_hash")?,
        domain_type: row.try_get("domain_type")?,
        domain_name: row.try_get("domain_name")?,
        directory_path: row.try_get("directory_path")?,
        leaf_name: row.try_get("leaf_name")?,
        link_target: row.try_get("link_target")?,
        content_hash: row.try_get("content_hash")?,
        flag: narrow(row, "flag")?,
        properties: BTreeMap::new(),
    })
}

/// Read an INTEGER column back into the narrower type it was written from
fn narrow<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: i64 = row.try_get(column)?;
    T::try_from(value)
        .map_err(|_| MbdbError::Query(format!("column {column} holds out-of-range value {value}")))
}

#[async_trait]
impl CatalogQuery for IndexStore {
    async fn domain_types(&self) -> Result<Vec<String>> {
        self.distinct(
            "SELECT DISTINCT domain_type FROM entries ORDER BY domain_type",
            &[],
        )
        .await
    }

    async fn domain_members(&self, domain_type: &str) -> Result<Vec<String>> {
        self.distinct(
            "SELECT DISTINCT domain_name FROM entries WHERE domain_type = ?1 ORDER BY domain_name",
            &[domain_type],
        )
        .await
    }

    async fn paths_of_domain(&self, domain_type: &str, domain_name: &str) -> Result<Vec<String>> {
        self.distinct(
            "SELECT DISTINCT directory_path FROM entries \
             WHERE domain_type = ?1 AND domain_name = ?2 ORDER BY directory_path",
            &[domain_type, domain_name],
        )
        .await
    }

    async fn entries_in_path(
        &self,
        domain_type: &str,
        domain_name: &str,
        directory_path: &str,
    ) -> Result<Vec<IndexRow>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries \
             WHERE domain_type = ?1 AND domain_name = ?2 AND directory_path = ?3 \
             ORDER BY leaf_name, id"
        );
        let rows = sqlx::query(&sql)
            .bind(domain_type)
            .bind(domain_name)
            .bind(directory_path)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(convert_row).collect()
    }

    async fn by_id(&self, id: i64) -> Result<IndexRow> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MbdbError::NotFound(format!("no entry with id {id}")))?;

        let mut entry = convert_row(&row)?;
        entry.properties = self.properties_of(id).await?;
        Ok(entry)
    }

    async fn resolve_identity(&self, query: &IdentityQuery) -> Result<ResolvedIdentity> {
        if query.is_empty() {
            return Err(MbdbError::Query(
                "identity lookup needs a leaf name, directory path or domain type".to_string(),
            ));
        }

        // Column names are fixed here; only values are bound.
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, identity_hash FROM entries");
        let criteria = [
            ("leaf_name", query.leaf_name.as_str()),
            ("directory_path", query.directory_path.as_str()),
            ("domain_type", query.domain_type.as_str()),
        ];
        let mut sep = " WHERE ";
        for (column, value) in criteria {
            if value.is_empty() {
                continue;
            }
            qb.push(sep).push(column).push(" = ").push_bind(value);
            sep = " AND ";
        }
        qb.push(" ORDER BY id LIMIT 1");

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MbdbError::NotFound(format!("no entry matches {query:?}")))?;

        Ok(ResolvedIdentity {
            id: row.try_get("id")?,
            identity_hash: row.try_get("identity_hash")?,
        })
    }
}
