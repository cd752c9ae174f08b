//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed Rust structures that map to database tables.
//! Identifier and enum columns use the types from lyrebird-common.

use chrono::{DateTime, Utc};
use lyrebird_common::{AlbumId, ArtistId, ArtworkSource, EntityKind, ScanState, TrackId};
use serde::{Deserialize, Serialize};

/// One physical audio file under a music root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    /// Absolute path of the file; the catalog key.
    pub file_path: String,
    /// Directory containing the file.
    pub dir_path: String,
    /// Last observed modification signal, `max(mtime, ctime)`.
    pub modified_at: DateTime<Utc>,
    /// When the file was first catalogued.
    pub first_seen_at: DateTime<Utc>,
}

/// Tags and technical fields extracted from one catalogued file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    pub file_path: String,
    pub file_name: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub genres: Vec<String>,
    pub track_number: u32,
    pub total_tracks: u32,
    pub disc_number: u32,
    pub total_discs: u32,
    /// Release date as tagged, usually `YYYY` or `YYYY-MM-DD`.
    pub release_date: String,
    pub label: String,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// File size in bytes.
    pub size: Option<i64>,
    /// Bitrate in bits per second.
    pub bitrate: Option<i64>,
    pub codec: Option<String>,
    pub format: Option<String>,
    pub track_id: TrackId,
    pub album_id: AlbumId,
    pub artist_id: ArtistId,
}

impl TrackMetadata {
    /// Name to show for the artist of this track's album.
    pub fn display_album_artist(&self) -> &str {
        if self.album_artist.is_empty() {
            &self.artist
        } else {
            &self.album_artist
        }
    }
}

/// Freshness record for one album or artist image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtworkRecord {
    pub kind: EntityKind,
    pub entity_id: String,
    /// Canonical served image path.
    pub image_path: String,
    pub source: ArtworkSource,
    /// When the stored image was last confirmed current.
    pub freshness: DateTime<Utc>,
}

/// Bookkeeping for one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub files_processed: u64,
    pub folders_processed: u64,
    pub status: ScanState,
    pub error: Option<String>,
}

/// Totals over the whole catalog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogCounts {
    pub files: u64,
    pub folders: u64,
}

/// Number of tracks carrying one genre.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenreCount {
    pub genre: String,
    pub track_count: u64,
}
