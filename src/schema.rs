//! Catalog format constants
//!
//! Layout of the `Manifest.mbdb` file and the mode bits carried by each entry.

use chrono::{DateTime, Utc};

/// ASCII tag at offset 0 of every catalog.
pub const MAGIC: &[u8; 4] = b"mbdb";

/// Magic plus the (major, minor) version pair.
pub const HEADER_LEN: usize = 6;

/// Length prefix meaning "field absent".
pub const ABSENT: u16 = 0xFFFF;

/// Name of the catalog inside a backup directory.
pub const MANIFEST_FILE: &str = "Manifest.mbdb";

/// Seconds between the unix epoch and the device epoch (2001-01-01).
pub const DEVICE_EPOCH_OFFSET: i64 = 978_307_200;

/// DDL for the index tables, run inside the load transaction.
pub const SCHEMA: &str = include_str!("../migrations/sqlite.sql");

/// Object type bits of the 16-bit mode field
pub mod mode {
    pub const S_IFMT: u16 = 0xE000; // Object type mask
    pub const S_IFREG: u16 = 0x8000; // Regular file
    pub const S_IFDIR: u16 = 0x4000; // Directory
    pub const S_IFLNK: u16 = 0xA000; // Symbolic link

    pub const PERM_MASK: u16 = 0x0FFF;
}

/// Convert a raw catalog timestamp to wall-clock time.
///
/// Returns `None` only if the shifted value leaves chrono's range, which a
/// 32-bit input cannot do in practice.
pub fn device_time(raw: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(raw) + DEVICE_EPOCH_OFFSET, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_time_zero_is_device_epoch() {
        let t = device_time(0).unwrap();
        assert_eq!(t.to_rfc3339(), "2001-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_device_time_offsets_raw_seconds() {
        let t = device_time(86_400).unwrap();
        assert_eq!(t.timestamp(), DEVICE_EPOCH_OFFSET + 86_400);
    }
}
