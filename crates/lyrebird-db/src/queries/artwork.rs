//! Artwork freshness queries.
//!
//! One record per album id and one per artist id; the two keyspaces never
//! collide. Records are never deleted by the synchronizer.

use lyrebird_common::{EntityKind, Error, Result};
use rusqlite::Connection;

use crate::models::ArtworkRecord;
use crate::timestamp;

/// Parse an artwork record from a database row.
///
/// Expects columns in order: kind, entity_id, image_path, source, freshness.
fn parse_artwork_row(row: &rusqlite::Row) -> rusqlite::Result<ArtworkRecord> {
    let kind: String = row.get(0)?;
    let source: String = row.get(3)?;
    Ok(ArtworkRecord {
        kind: kind.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        entity_id: row.get(1)?,
        image_path: row.get(2)?,
        source: source.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        freshness: timestamp::column(row, 4)?,
    })
}

/// Get the artwork record for an entity.
///
/// # Returns
///
/// * `Ok(Some(ArtworkRecord))` - The record if artwork was resolved before
/// * `Ok(None)` - If the entity has never been resolved
/// * `Err(Error)` - If a database error occurs
pub fn get_record(conn: &Connection, kind: EntityKind, entity_id: &str) -> Result<Option<ArtworkRecord>> {
    let result = conn.query_row(
        "SELECT kind, entity_id, image_path, source, freshness
         FROM artwork WHERE kind = :kind AND entity_id = :entity_id",
        rusqlite::named_params! {
            ":kind": kind.as_str(),
            ":entity_id": entity_id,
        },
        parse_artwork_row,
    );

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert a record, or replace it if the new freshness is strictly newer.
///
/// Freshness never moves backwards: an upsert carrying an older or equal
/// timestamp leaves the stored record untouched.
///
/// # Returns
///
/// * `Ok(true)` - The record was inserted or advanced
/// * `Ok(false)` - A record with equal or newer freshness already exists
/// * `Err(Error)` - If a database error occurs
pub fn upsert_record(conn: &Connection, record: &ArtworkRecord) -> Result<bool> {
    let affected = conn
        .execute(
            "INSERT INTO artwork (kind, entity_id, image_path, source, freshness)
             VALUES (:kind, :entity_id, :image_path, :source, :freshness)
             ON CONFLICT(kind, entity_id) DO UPDATE SET
                image_path = excluded.image_path,
                source = excluded.source,
                freshness = excluded.freshness
             WHERE excluded.freshness > artwork.freshness",
            rusqlite::named_params! {
                ":kind": record.kind.as_str(),
                ":entity_id": &record.entity_id,
                ":image_path": &record.image_path,
                ":source": record.source.as_str(),
                ":freshness": timestamp::format(&record.freshness),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// All records of one kind, ordered by id.
pub fn list_records(conn: &Connection, kind: EntityKind) -> Result<Vec<ArtworkRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT kind, entity_id, image_path, source, freshness
             FROM artwork WHERE kind = :kind ORDER BY entity_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let records = stmt
        .query_map(
            rusqlite::named_params! { ":kind": kind.as_str() },
            parse_artwork_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(records)
}
