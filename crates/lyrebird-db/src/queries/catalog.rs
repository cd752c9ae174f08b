//! Catalog entry queries.
//!
//! A catalog entry exists for every audio file whose metadata was applied at
//! least once. Entries are keyed by absolute path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use lyrebird_common::{Error, Result};

use crate::models::{CatalogCounts, CatalogEntry};
use crate::timestamp;

/// Parse a catalog entry from a database row.
///
/// Expects columns in order: file_path, dir_path, modified_at, first_seen_at.
fn parse_entry_row(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        file_path: row.get(0)?,
        dir_path: row.get(1)?,
        modified_at: timestamp::column(row, 2)?,
        first_seen_at: timestamp::column(row, 3)?,
    })
}

/// Get the catalog entry for a path.
///
/// # Returns
///
/// * `Ok(Some(CatalogEntry))` - The entry if the path is catalogued
/// * `Ok(None)` - If the path is unknown
/// * `Err(Error)` - If a database error occurs
pub fn get_entry(conn: &Connection, file_path: &str) -> Result<Option<CatalogEntry>> {
    let result = conn.query_row(
        "SELECT file_path, dir_path, modified_at, first_seen_at
         FROM catalog_entries WHERE file_path = :file_path",
        rusqlite::named_params! { ":file_path": file_path },
        parse_entry_row,
    );

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert a catalog entry or advance an existing one.
///
/// On conflict the directory and modification signal are replaced while the
/// original `first_seen_at` is kept.
pub fn upsert_entry(conn: &Connection, entry: &CatalogEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO catalog_entries (file_path, dir_path, modified_at, first_seen_at)
         VALUES (:file_path, :dir_path, :modified_at, :first_seen_at)
         ON CONFLICT(file_path) DO UPDATE SET
            dir_path = excluded.dir_path,
            modified_at = excluded.modified_at",
        rusqlite::named_params! {
            ":file_path": &entry.file_path,
            ":dir_path": &entry.dir_path,
            ":modified_at": timestamp::format(&entry.modified_at),
            ":first_seen_at": timestamp::format(&entry.first_seen_at),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Delete a catalog entry. Track metadata cascades with it.
///
/// Returns `true` if a row was removed.
pub fn delete_entry(conn: &Connection, file_path: &str) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM catalog_entries WHERE file_path = :file_path",
            rusqlite::named_params! { ":file_path": file_path },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// Snapshot of every catalogued path and its stored modification signal.
pub fn all_signals(conn: &Connection) -> Result<HashMap<String, DateTime<Utc>>> {
    let mut stmt = conn
        .prepare("SELECT file_path, modified_at FROM catalog_entries")
        .map_err(|e| Error::database(e.to_string()))?;

    let signals = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, timestamp::column(row, 1)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(signals)
}

/// Every catalogued path, sorted.
pub fn all_paths(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT file_path FROM catalog_entries ORDER BY file_path")
        .map_err(|e| Error::database(e.to_string()))?;

    let paths = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(paths)
}

/// Count catalogued files and the distinct folders containing them.
pub fn counts(conn: &Connection) -> Result<CatalogCounts> {
    conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT dir_path) FROM catalog_entries",
        [],
        |row| {
            Ok(CatalogCounts {
                files: row.get::<_, i64>(0)?.max(0) as u64,
                folders: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::test_support;
    use chrono::Duration;

    #[test]
    fn test_upsert_and_get_entry() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t0 = Utc::now();

        assert!(get_entry(&conn, "/m/a/1.mp3").unwrap().is_none());

        let entry = test_support::entry("/m/a/1.mp3", t0);
        upsert_entry(&conn, &entry).unwrap();

        let stored = get_entry(&conn, "/m/a/1.mp3").unwrap().unwrap();
        assert_eq!(stored, entry);
    }

    #[test]
    fn test_upsert_keeps_first_seen() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        upsert_entry(&conn, &test_support::entry("/m/a/1.mp3", t0)).unwrap();

        let mut newer = test_support::entry("/m/a/1.mp3", t1);
        newer.first_seen_at = t1;
        upsert_entry(&conn, &newer).unwrap();

        let stored = get_entry(&conn, "/m/a/1.mp3").unwrap().unwrap();
        assert_eq!(stored.modified_at, t1);
        assert_eq!(stored.first_seen_at, t0);
    }

    #[test]
    fn test_signals_paths_and_counts() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let t0 = Utc::now();

        for path in ["/m/a/1.mp3", "/m/a/2.mp3", "/m/b/1.flac"] {
            upsert_entry(&conn, &test_support::entry(path, t0)).unwrap();
        }

        let signals = all_signals(&conn).unwrap();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals["/m/b/1.flac"], t0);

        assert_eq!(
            all_paths(&conn).unwrap(),
            vec!["/m/a/1.mp3", "/m/a/2.mp3", "/m/b/1.flac"]
        );

        let counts = counts(&conn).unwrap();
        assert_eq!(counts, CatalogCounts { files: 3, folders: 2 });
    }

    #[test]
    fn test_delete_entry() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        upsert_entry(&conn, &test_support::entry("/m/a/1.mp3", Utc::now())).unwrap();
        assert!(delete_entry(&conn, "/m/a/1.mp3").unwrap());
        assert!(!delete_entry(&conn, "/m/a/1.mp3").unwrap());
        assert!(get_entry(&conn, "/m/a/1.mp3").unwrap().is_none());
    }
}
