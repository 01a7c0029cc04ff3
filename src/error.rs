//! Error types for mbdbsql

use thiserror::Error;

/// Result type for mbdbsql operations
pub type Result<T> = std::result::Result<T, MbdbError>;

/// A cursor read ran past the end of the buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("needed {needed} bytes at offset {offset}, only {available} available")]
pub struct TruncatedData {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// Structural problems with the catalog bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("catalog is {len} bytes, shorter than its header")]
    MissingHeader { len: usize },

    #[error("bad magic {found:02x?}, not an mbdb catalog")]
    BadMagic { found: [u8; 4] },

    #[error("record {record} is truncated: {source}")]
    Truncated {
        record: usize,
        #[source]
        source: TruncatedData,
    },
}

/// Catalog error types
#[derive(Error, Debug)]
pub enum MbdbError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Classification error: mode {mode:#06x} of {domain}-{path} is not a file, directory or symlink")]
    Classification {
        mode: u16,
        domain: String,
        path: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Index already present: {0}")]
    IndexExists(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MbdbError {
    /// True for errors that mean the catalog itself is unusable.
    pub fn is_format(&self) -> bool {
        matches!(self, MbdbError::Format(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MbdbError::NotFound(_))
    }

    pub fn is_index_exists(&self) -> bool {
        matches!(self, MbdbError::IndexExists(_))
    }
}
