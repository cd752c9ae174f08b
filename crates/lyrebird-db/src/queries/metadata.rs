//! Track metadata queries.
//!
//! Rows are keyed by the same absolute path as their catalog entry. Writers
//! should go through [`crate::queries::library`] so the derived search and
//! genre views stay in step.

use chrono::{DateTime, Utc};
use lyrebird_common::{AlbumId, ArtistId, Error, Result, TrackId};
use rusqlite::Connection;

use crate::models::TrackMetadata;
use crate::timestamp;

const TRACK_COLUMNS: &str = "file_path, file_name, title, artist, album, album_artist, genres,
    track_number, total_tracks, disc_number, total_discs, release_date, label,
    duration, size, bitrate, codec, format,
    musicbrainz_track_id, musicbrainz_album_id, musicbrainz_artist_id";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse track metadata from a database row selected with `TRACK_COLUMNS`.
fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<TrackMetadata> {
    let genres: String = row.get(6)?;
    let genres: Vec<String> = serde_json::from_str(&genres).map_err(|e| conversion_error(6, e))?;

    Ok(TrackMetadata {
        file_path: row.get(0)?,
        file_name: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        album_artist: row.get(5)?,
        genres,
        track_number: row.get(7)?,
        total_tracks: row.get(8)?,
        disc_number: row.get(9)?,
        total_discs: row.get(10)?,
        release_date: row.get(11)?,
        label: row.get(12)?,
        duration: row.get(13)?,
        size: row.get(14)?,
        bitrate: row.get(15)?,
        codec: row.get(16)?,
        format: row.get(17)?,
        track_id: TrackId::parse(row.get::<_, String>(18)?).map_err(|e| conversion_error(18, e))?,
        album_id: AlbumId::parse(row.get::<_, String>(19)?).map_err(|e| conversion_error(19, e))?,
        artist_id: ArtistId::parse(row.get::<_, String>(20)?)
            .map_err(|e| conversion_error(20, e))?,
    })
}

/// Insert or replace the metadata for one file.
///
/// The catalog entry for `track.file_path` must already exist.
pub fn upsert_track(conn: &Connection, track: &TrackMetadata, updated_at: DateTime<Utc>) -> Result<()> {
    let genres = serde_json::to_string(&track.genres)
        .map_err(|e| Error::internal(format!("failed to encode genres: {e}")))?;

    conn.execute(
        "INSERT INTO track_metadata (
            file_path, file_name, title, artist, album, album_artist, genres,
            track_number, total_tracks, disc_number, total_discs, release_date, label,
            duration, size, bitrate, codec, format,
            musicbrainz_track_id, musicbrainz_album_id, musicbrainz_artist_id, updated_at
         ) VALUES (
            :file_path, :file_name, :title, :artist, :album, :album_artist, :genres,
            :track_number, :total_tracks, :disc_number, :total_discs, :release_date, :label,
            :duration, :size, :bitrate, :codec, :format,
            :track_id, :album_id, :artist_id, :updated_at
         )
         ON CONFLICT(file_path) DO UPDATE SET
            file_name = excluded.file_name,
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            album_artist = excluded.album_artist,
            genres = excluded.genres,
            track_number = excluded.track_number,
            total_tracks = excluded.total_tracks,
            disc_number = excluded.disc_number,
            total_discs = excluded.total_discs,
            release_date = excluded.release_date,
            label = excluded.label,
            duration = excluded.duration,
            size = excluded.size,
            bitrate = excluded.bitrate,
            codec = excluded.codec,
            format = excluded.format,
            musicbrainz_track_id = excluded.musicbrainz_track_id,
            musicbrainz_album_id = excluded.musicbrainz_album_id,
            musicbrainz_artist_id = excluded.musicbrainz_artist_id,
            updated_at = excluded.updated_at",
        rusqlite::named_params! {
            ":file_path": &track.file_path,
            ":file_name": &track.file_name,
            ":title": &track.title,
            ":artist": &track.artist,
            ":album": &track.album,
            ":album_artist": &track.album_artist,
            ":genres": genres,
            ":track_number": track.track_number,
            ":total_tracks": track.total_tracks,
            ":disc_number": track.disc_number,
            ":total_discs": track.total_discs,
            ":release_date": &track.release_date,
            ":label": &track.label,
            ":duration": track.duration,
            ":size": track.size,
            ":bitrate": track.bitrate,
            ":codec": &track.codec,
            ":format": &track.format,
            ":track_id": track.track_id.as_str(),
            ":album_id": track.album_id.as_str(),
            ":artist_id": track.artist_id.as_str(),
            ":updated_at": timestamp::format(&updated_at),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get the metadata for one file.
pub fn get_track(conn: &Connection, file_path: &str) -> Result<Option<TrackMetadata>> {
    let result = conn.query_row(
        &format!("SELECT {TRACK_COLUMNS} FROM track_metadata WHERE file_path = :file_path"),
        rusqlite::named_params! { ":file_path": file_path },
        parse_track_row,
    );

    match result {
        Ok(track) => Ok(Some(track)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Delete the metadata for one file. Returns `true` if a row was removed.
pub fn delete_track(conn: &Connection, file_path: &str) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM track_metadata WHERE file_path = :file_path",
            rusqlite::named_params! { ":file_path": file_path },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// All tracks of an album, in disc and track order.
pub fn tracks_for_album(conn: &Connection, album_id: &AlbumId) -> Result<Vec<TrackMetadata>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM track_metadata
             WHERE musicbrainz_album_id = :album_id
             ORDER BY disc_number, track_number, file_path"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let tracks = stmt
        .query_map(
            rusqlite::named_params! { ":album_id": album_id.as_str() },
            parse_track_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(tracks)
}

/// Distinct directories holding tracks of an album.
pub fn album_directories(conn: &Connection, album_id: &AlbumId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT c.dir_path
             FROM track_metadata t
             JOIN catalog_entries c ON c.file_path = t.file_path
             WHERE t.musicbrainz_album_id = :album_id
             ORDER BY c.dir_path",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let dirs = stmt
        .query_map(
            rusqlite::named_params! { ":album_id": album_id.as_str() },
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(dirs)
}

/// Candidate directories for an artist image.
///
/// These are the parents of every directory holding the artist's tracks,
/// i.e. the `Artist/` level above `Artist/Album/`. Order is stable and
/// duplicates are removed.
pub fn artist_directories(conn: &Connection, artist_id: &ArtistId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT c.dir_path
             FROM track_metadata t
             JOIN catalog_entries c ON c.file_path = t.file_path
             WHERE t.musicbrainz_artist_id = :artist_id
             ORDER BY c.dir_path",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let album_dirs = stmt
        .query_map(
            rusqlite::named_params! { ":artist_id": artist_id.as_str() },
            |row| row.get::<_, String>(0),
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut parents: Vec<String> = Vec::new();
    for dir in album_dirs {
        let Some(parent) = std::path::Path::new(&dir).parent() else {
            continue;
        };
        let parent = parent.to_string_lossy().to_string();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    Ok(parents)
}

/// Album title and album-artist name, taken from the album's first track.
pub fn album_names(conn: &Connection, album_id: &AlbumId) -> Result<Option<(String, String)>> {
    let result = conn.query_row(
        "SELECT album, CASE WHEN album_artist = '' THEN artist ELSE album_artist END
         FROM track_metadata
         WHERE musicbrainz_album_id = :album_id
         ORDER BY disc_number, track_number, file_path
         LIMIT 1",
        rusqlite::named_params! { ":album_id": album_id.as_str() },
        |row| Ok((row.get(0)?, row.get(1)?)),
    );

    match result {
        Ok(names) => Ok(Some(names)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Display name of an artist, taken from any of its tracks.
pub fn artist_name(conn: &Connection, artist_id: &ArtistId) -> Result<Option<String>> {
    let result = conn.query_row(
        "SELECT artist FROM track_metadata
         WHERE musicbrainz_artist_id = :artist_id AND artist <> ''
         ORDER BY file_path
         LIMIT 1",
        rusqlite::named_params! { ":artist_id": artist_id.as_str() },
        |row| row.get(0),
    );

    match result {
        Ok(name) => Ok(Some(name)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Albums with at least one track directly in `dir`.
pub fn albums_in_directory(conn: &Connection, dir: &str) -> Result<Vec<AlbumId>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT t.musicbrainz_album_id
             FROM track_metadata t
             JOIN catalog_entries c ON c.file_path = t.file_path
             WHERE c.dir_path = :dir
             ORDER BY t.musicbrainz_album_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let ids = stmt
        .query_map(rusqlite::named_params! { ":dir": dir }, |row| {
            AlbumId::parse(row.get::<_, String>(0)?).map_err(|e| conversion_error(0, e))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(ids)
}

/// Artists whose album directories sit directly below `dir`, i.e. the
/// artists an image in `dir` would belong to.
pub fn artists_below_directory(conn: &Connection, dir: &str) -> Result<Vec<ArtistId>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT t.musicbrainz_artist_id, c.dir_path
             FROM track_metadata t
             JOIN catalog_entries c ON c.file_path = t.file_path
             WHERE substr(c.dir_path, 1, length(:dir) + 1) = :dir || '/'
             ORDER BY t.musicbrainz_artist_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":dir": dir }, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut ids: Vec<ArtistId> = Vec::new();
    for (id, album_dir) in rows {
        let parent = std::path::Path::new(&album_dir).parent();
        if parent != Some(std::path::Path::new(dir)) {
            continue;
        }
        let id = ArtistId::parse(id)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    Ok(ids)
}
