//! Derived search and genre views.
//!
//! These views are kept consistent with `track_metadata` by explicit calls
//! issued right after every metadata upsert or delete (see
//! [`crate::queries::library`]); there are no storage triggers.

use lyrebird_common::{Error, Result};
use rusqlite::Connection;

use crate::models::{GenreCount, TrackMetadata};

/// Text indexed for a track: lower-cased title, artists, album and genres.
fn search_text(track: &TrackMetadata) -> String {
    let mut parts: Vec<&str> = vec![&track.title, &track.artist, &track.album];
    if track.album_artist != track.artist {
        parts.push(&track.album_artist);
    }
    parts.extend(track.genres.iter().map(String::as_str));
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Insert or replace the search row for a track.
pub fn refresh_search_entry(conn: &Connection, track: &TrackMetadata) -> Result<()> {
    conn.execute(
        "INSERT INTO track_search (file_path, search_text) VALUES (:file_path, :text)
         ON CONFLICT(file_path) DO UPDATE SET search_text = excluded.search_text",
        rusqlite::named_params! {
            ":file_path": &track.file_path,
            ":text": search_text(track),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Remove the search row for a path.
pub fn remove_search_entry(conn: &Connection, file_path: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM track_search WHERE file_path = :file_path",
        rusqlite::named_params! { ":file_path": file_path },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

fn genres_of(conn: &Connection, file_path: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT genre FROM track_genres WHERE file_path = :file_path")
        .map_err(|e| Error::database(e.to_string()))?;

    let genres = stmt
        .query_map(rusqlite::named_params! { ":file_path": file_path }, |row| {
            row.get(0)
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(genres)
}

/// Replace the genres of one track and adjust the per-genre counts.
///
/// Counts are maintained incrementally: the track's previous genres are
/// decremented and the new ones incremented. Genres whose count reaches
/// zero are dropped.
pub fn refresh_track_genres(conn: &Connection, file_path: &str, genres: &[String]) -> Result<()> {
    let previous = genres_of(conn, file_path)?;

    conn.execute(
        "DELETE FROM track_genres WHERE file_path = :file_path",
        rusqlite::named_params! { ":file_path": file_path },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    for genre in &previous {
        conn.execute(
            "UPDATE genre_counts SET track_count = track_count - 1 WHERE genre = :genre",
            rusqlite::named_params! { ":genre": genre },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    for genre in genres {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO track_genres (file_path, genre) VALUES (:file_path, :genre)",
                rusqlite::named_params! { ":file_path": file_path, ":genre": genre },
            )
            .map_err(|e| Error::database(e.to_string()))?;
        if inserted == 0 {
            continue;
        }
        conn.execute(
            "INSERT INTO genre_counts (genre, track_count) VALUES (:genre, 1)
             ON CONFLICT(genre) DO UPDATE SET track_count = track_count + 1",
            rusqlite::named_params! { ":genre": genre },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    conn.execute("DELETE FROM genre_counts WHERE track_count <= 0", [])
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Remove all genres of a path and adjust the counts.
pub fn remove_track_genres(conn: &Connection, file_path: &str) -> Result<()> {
    refresh_track_genres(conn, file_path, &[])
}

/// Recompute `genre_counts` from `track_genres` from scratch.
pub fn rebuild_genre_counts(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM genre_counts;
         INSERT INTO genre_counts (genre, track_count)
            SELECT genre, COUNT(*) FROM track_genres GROUP BY genre;",
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// All genres with their track counts, most common first.
pub fn genre_counts(conn: &Connection) -> Result<Vec<GenreCount>> {
    let mut stmt = conn
        .prepare("SELECT genre, track_count FROM genre_counts ORDER BY track_count DESC, genre")
        .map_err(|e| Error::database(e.to_string()))?;

    let counts = stmt
        .query_map([], |row| {
            Ok(GenreCount {
                genre: row.get(0)?,
                track_count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(counts)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Paths of tracks whose indexed text contains every whitespace-separated
/// term of `query` (case-insensitive).
pub fn search_tracks(conn: &Connection, query: &str, limit: usize) -> Result<Vec<String>> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("%{}%", escape_like(&t.to_lowercase())))
        .collect();
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let clauses = vec!["search_text LIKE ? ESCAPE '\\'"; terms.len()].join(" AND ");
    let sql = format!(
        "SELECT file_path FROM track_search WHERE {clauses} ORDER BY file_path LIMIT {}",
        limit.min(i64::MAX as usize)
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let paths = stmt
        .query_map(rusqlite::params_from_iter(terms.iter()), |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::test_support;

    fn genres(list: &[&str]) -> Vec<String> {
        list.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_genre_counts_follow_refreshes() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        refresh_track_genres(&conn, "/m/1.mp3", &genres(&["Rock", "Pop"])).unwrap();
        refresh_track_genres(&conn, "/m/2.mp3", &genres(&["Rock"])).unwrap();

        let counts = genre_counts(&conn).unwrap();
        assert_eq!(counts[0], GenreCount { genre: "Rock".into(), track_count: 2 });
        assert_eq!(counts[1], GenreCount { genre: "Pop".into(), track_count: 1 });

        // Retag track 1: Pop disappears, Jazz appears.
        refresh_track_genres(&conn, "/m/1.mp3", &genres(&["Rock", "Jazz"])).unwrap();
        let names: Vec<String> = genre_counts(&conn).unwrap().into_iter().map(|g| g.genre).collect();
        assert_eq!(names, vec!["Rock", "Jazz"]);

        remove_track_genres(&conn, "/m/1.mp3").unwrap();
        remove_track_genres(&conn, "/m/2.mp3").unwrap();
        assert!(genre_counts(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_genres_counted_once() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        refresh_track_genres(&conn, "/m/1.mp3", &genres(&["Rock", "Rock"])).unwrap();
        assert_eq!(genre_counts(&conn).unwrap()[0].track_count, 1);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        refresh_track_genres(&conn, "/m/1.mp3", &genres(&["Rock", "Pop"])).unwrap();
        refresh_track_genres(&conn, "/m/2.mp3", &genres(&["Rock"])).unwrap();
        let incremental = genre_counts(&conn).unwrap();

        conn.execute("UPDATE genre_counts SET track_count = 99", []).unwrap();
        rebuild_genre_counts(&conn).unwrap();
        assert_eq!(genre_counts(&conn).unwrap(), incremental);
    }

    #[test]
    fn test_search_requires_all_terms() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut a = test_support::track("/m/a.mp3", "album", "artist");
        a.title = "Blue in Green".into();
        let mut b = test_support::track("/m/b.mp3", "album", "artist");
        b.title = "So What".into();
        refresh_search_entry(&conn, &a).unwrap();
        refresh_search_entry(&conn, &b).unwrap();

        assert_eq!(search_tracks(&conn, "BLUE green", 10).unwrap(), vec!["/m/a.mp3"]);
        assert_eq!(search_tracks(&conn, "artist", 10).unwrap().len(), 2);
        assert_eq!(search_tracks(&conn, "artist", 1).unwrap().len(), 1);
        assert!(search_tracks(&conn, "   ", 10).unwrap().is_empty());
        assert!(search_tracks(&conn, "100%", 10).unwrap().is_empty());

        remove_search_entry(&conn, "/m/a.mp3").unwrap();
        assert!(search_tracks(&conn, "blue", 10).unwrap().is_empty());
    }
}
