//! Transactional composition of catalog, metadata and derived views.
//!
//! The synchronization engine writes through these two functions only, so a
//! track is either fully present (entry, metadata, search row, genres) or
//! fully absent.

use chrono::{DateTime, Utc};
use lyrebird_common::{Error, Result};
use rusqlite::Connection;

use crate::models::{CatalogEntry, TrackMetadata};
use crate::queries::{catalog, indexes, metadata};

/// Apply one successfully extracted file.
///
/// Upserts the catalog entry and its metadata, then refreshes the search
/// and genre views, all in a single transaction.
pub fn apply_track(
    conn: &Connection,
    entry: &CatalogEntry,
    track: &TrackMetadata,
    now: DateTime<Utc>,
) -> Result<()> {
    if entry.file_path != track.file_path {
        return Err(Error::invalid_input(format!(
            "metadata for {} does not belong to {}",
            track.file_path, entry.file_path
        )));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    catalog::upsert_entry(&tx, entry)?;
    metadata::upsert_track(&tx, track, now)?;
    indexes::refresh_search_entry(&tx, track)?;
    indexes::refresh_track_genres(&tx, &track.file_path, &track.genres)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))
}

/// Remove a path from the library.
///
/// Derived views are cleared before the metadata and catalog rows go.
/// Returns `true` if a catalog entry existed.
pub fn remove_path(conn: &Connection, file_path: &str) -> Result<bool> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    indexes::remove_search_entry(&tx, file_path)?;
    indexes::remove_track_genres(&tx, file_path)?;
    metadata::delete_track(&tx, file_path)?;
    let removed = catalog::delete_entry(&tx, file_path)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(removed)
}
