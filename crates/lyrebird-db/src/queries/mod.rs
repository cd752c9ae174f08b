//! Database query modules.
//!
//! Each module holds free functions over a borrowed `rusqlite::Connection`.
//! Functions that must change several tables atomically live in [`library`].

pub mod artwork;
pub mod catalog;
pub mod indexes;
pub mod library;
pub mod metadata;
pub mod scans;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use lyrebird_common::{AlbumId, ArtistId, TrackId};

    use crate::models::{CatalogEntry, TrackMetadata};

    pub fn entry(path: &str, modified_at: DateTime<Utc>) -> CatalogEntry {
        let dir = std::path::Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        CatalogEntry {
            file_path: path.to_string(),
            dir_path: dir,
            modified_at,
            first_seen_at: modified_at,
        }
    }

    pub fn track(path: &str, album_id: &str, artist_id: &str) -> TrackMetadata {
        let file_name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        TrackMetadata {
            file_path: path.to_string(),
            file_name: file_name.clone(),
            title: file_name,
            artist: "Artist A".to_string(),
            album: "Album B".to_string(),
            album_artist: "Artist A".to_string(),
            genres: vec!["Rock".to_string()],
            track_number: 1,
            total_tracks: 2,
            disc_number: 1,
            total_discs: 1,
            release_date: "2001-01-01".to_string(),
            label: String::new(),
            duration: Some(180.0),
            size: Some(1024),
            bitrate: Some(320_000),
            codec: Some("mp3".to_string()),
            format: Some("mp3".to_string()),
            track_id: TrackId::parse(format!("track-{}", path.len())).unwrap(),
            album_id: AlbumId::parse(album_id).unwrap(),
            artist_id: ArtistId::parse(artist_id).unwrap(),
        }
    }
}
