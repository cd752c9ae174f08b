//! Tag normalization.
//!
//! Raw container tags arrive with inconsistent key spelling and casing
//! (`MUSICBRAINZ_ALBUMID`, `MusicBrainz Album Id`, `musicbrainz_albumid`, ...).
//! [`normalize`] turns them into a [`TrackMetadata`] value.

use std::collections::HashMap;
use std::path::Path;

use lyrebird_common::{AlbumId, ArtistId, TrackId};
use lyrebird_db::models::TrackMetadata;

use super::ExtractError;

const ARTIST: &[&str] = &["artist", "album_artist"];
const ALBUM_ARTIST: &[&str] = &["album_artist", "album-artist", "albumartist"];
const TITLE: &[&str] = &["title"];
const ALBUM: &[&str] = &["album"];
const GENRE: &[&str] = &["genre"];
const RELEASE_DATE: &[&str] = &["date", "release_date", "original_date", "originaldate"];
const ORIGINAL_YEAR: &[&str] = &["tory", "ory", "original_year", "original year"];
const TRACK: &[&str] = &["track", "tracknumber"];
const TOTAL_TRACKS: &[&str] = &["totaltracks", "tracktotal"];
const DISC: &[&str] = &["disc", "discnumber"];
const TOTAL_DISCS: &[&str] = &["totaldiscs", "disctotal"];
const LABEL: &[&str] = &["label", "publisher"];
const MB_ALBUM_ID: &[&str] = &["musicbrainz_albumid", "musicbrainz album id"];
const MB_ARTIST_ID: &[&str] = &["musicbrainz_artistid", "musicbrainz artist id"];
const MB_TRACK_ID: &[&str] = &["musicbrainz_trackid", "musicbrainz release track id"];

/// Tag map with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    values: HashMap<String, String>,
}

impl RawTags {
    /// Build from raw key/value pairs. Empty values are dropped; on key
    /// collisions after lower-casing the first non-empty value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = HashMap::new();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            values
                .entry(key.as_ref().trim().to_lowercase())
                .or_insert_with(|| value.to_string());
        }
        Self { values }
    }

    /// Add entries from `other` for keys not already present.
    pub fn fill_from(&mut self, other: &RawTags) {
        for (key, value) in &other.values {
            self.values.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// First value found for any of `keys`, in order.
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.values.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Technical stream facts reported alongside the tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Technical {
    pub format: Option<String>,
    pub codec: Option<String>,
    pub duration: Option<f64>,
    pub size: Option<i64>,
    pub bitrate: Option<i64>,
}

/// Split `"3/12"` into `(Some(3), Some(12))`. Unparseable parts are `None`.
fn split_position(value: Option<&str>) -> (Option<u32>, Option<u32>) {
    let Some(value) = value else {
        return (None, None);
    };
    let mut parts = value.splitn(2, '/');
    let number = parts.next().and_then(|n| n.trim().parse().ok());
    let total = parts.next().and_then(|t| t.trim().parse().ok());
    (number, total)
}

fn parse_count(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Split a genre tag on `;` and `,`, trimming and dropping empties and
/// case-insensitive duplicates while keeping first-seen order.
pub fn split_genres(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split([';', ','])
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert(g.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// First entry of a possibly multi-valued identifier tag.
pub fn first_identifier(raw: &str) -> &str {
    raw.split([';', '/', ','])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Build a [`TrackMetadata`] from raw tags and technical facts.
///
/// Fails with [`ExtractError::MissingIdentifiers`] unless all three
/// MusicBrainz identifiers are present and usable.
pub fn normalize(path: &Path, tags: &RawTags, technical: Technical) -> Result<TrackMetadata, ExtractError> {
    let track_id = tags.first(MB_TRACK_ID).map(first_identifier).unwrap_or("");
    let album_id = tags.first(MB_ALBUM_ID).map(first_identifier).unwrap_or("");
    let artist_id = tags.first(MB_ARTIST_ID).map(first_identifier).unwrap_or("");

    let missing: Vec<&str> = [("track", track_id), ("album", album_id), ("artist", artist_id)]
        .into_iter()
        .filter(|(_, id)| id.is_empty())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        return Err(ExtractError::MissingIdentifiers(missing.join(", ")));
    }

    let invalid = |e: lyrebird_common::Error| ExtractError::Parse(e.to_string());
    let track_id = TrackId::parse(track_id).map_err(invalid)?;
    let album_id = AlbumId::parse(album_id).map_err(invalid)?;
    let artist_id = ArtistId::parse(artist_id).map_err(invalid)?;

    let (track_number, track_total) = split_position(tags.first(TRACK));
    let (disc_number, disc_total) = split_position(tags.first(DISC));

    let release_date = match tags.first(RELEASE_DATE) {
        Some(date) => date.to_string(),
        None => tags
            .first(ORIGINAL_YEAR)
            .map(|year| format!("{year}-01-01"))
            .unwrap_or_default(),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let title = match tags.first(TITLE) {
        Some(title) => title.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    };

    Ok(TrackMetadata {
        file_path: path.to_string_lossy().to_string(),
        file_name,
        title,
        artist: tags.first(ARTIST).unwrap_or_default().to_string(),
        album: tags.first(ALBUM).unwrap_or_default().to_string(),
        album_artist: tags.first(ALBUM_ARTIST).unwrap_or_default().to_string(),
        genres: tags.first(GENRE).map(split_genres).unwrap_or_default(),
        track_number: track_number.unwrap_or(0),
        total_tracks: parse_count(tags.first(TOTAL_TRACKS)).or(track_total).unwrap_or(0),
        disc_number: disc_number.unwrap_or(1),
        total_discs: parse_count(tags.first(TOTAL_DISCS)).or(disc_total).unwrap_or(0),
        release_date,
        label: tags.first(LABEL).unwrap_or_default().to_string(),
        duration: technical.duration,
        size: technical.size,
        bitrate: technical.bitrate,
        codec: technical.codec,
        format: technical.format,
        track_id,
        album_id,
        artist_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ids() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MUSICBRAINZ_TRACKID", "t-1"),
            ("MusicBrainz Album Id", "al-1"),
            ("musicbrainz_artistid", "ar-1"),
        ]
    }

    fn tags(extra: &[(&'static str, &'static str)]) -> RawTags {
        let mut pairs = ids();
        pairs.extend_from_slice(extra);
        RawTags::from_pairs(pairs)
    }

    #[test]
    fn test_case_insensitive_lookup_with_fallbacks() {
        let tags = tags(&[("ALBUM_ARTIST", "Various"), ("Title", "Song")]);
        let meta = normalize(Path::new("/m/a.flac"), &tags, Technical::default()).unwrap();
        assert_eq!(meta.title, "Song");
        // artist falls back to album_artist
        assert_eq!(meta.artist, "Various");
        assert_eq!(meta.album_artist, "Various");
        assert_eq!(meta.track_id.as_str(), "t-1");
        assert_eq!(meta.album_id.as_str(), "al-1");
        assert_eq!(meta.artist_id.as_str(), "ar-1");
    }

    #[test]
    fn test_track_and_disc_split() {
        let tags = tags(&[("track", "3/12"), ("disc", "2/2"), ("TOTALTRACKS", "13")]);
        let meta = normalize(Path::new("/m/a.mp3"), &tags, Technical::default()).unwrap();
        assert_eq!(meta.track_number, 3);
        // explicit total wins over the n/total form
        assert_eq!(meta.total_tracks, 13);
        assert_eq!(meta.disc_number, 2);
        assert_eq!(meta.total_discs, 2);
    }

    #[test]
    fn test_disc_defaults_to_one() {
        let meta = normalize(Path::new("/m/a.mp3"), &tags(&[]), Technical::default()).unwrap();
        assert_eq!(meta.disc_number, 1);
        assert_eq!(meta.track_number, 0);
        assert_eq!(meta.title, "a");
    }

    #[test]
    fn test_release_date_falls_back_to_original_year() {
        let meta = normalize(
            Path::new("/m/a.mp3"),
            &tags(&[("TORY", "1977")]),
            Technical::default(),
        )
        .unwrap();
        assert_eq!(meta.release_date, "1977-01-01");

        let meta = normalize(
            Path::new("/m/a.mp3"),
            &tags(&[("TORY", "1977"), ("date", "1978-05-01")]),
            Technical::default(),
        )
        .unwrap();
        assert_eq!(meta.release_date, "1978-05-01");
    }

    #[test]
    fn test_missing_identifiers() {
        let tags = RawTags::from_pairs([("MUSICBRAINZ_TRACKID", "t-1")]);
        let err = normalize(Path::new("/m/a.mp3"), &tags, Technical::default()).unwrap_err();
        assert_matches!(err, ExtractError::MissingIdentifiers(ref which) if which == "album, artist");
    }

    #[test]
    fn test_unsafe_identifier_rejected() {
        let tags = RawTags::from_pairs([
            ("MUSICBRAINZ_TRACKID", "t-1"),
            ("MUSICBRAINZ_ALBUMID", ".."),
            ("MUSICBRAINZ_ARTISTID", "ar-1"),
        ]);
        assert_matches!(
            normalize(Path::new("/m/a.mp3"), &tags, Technical::default()),
            Err(ExtractError::Parse(_))
        );
    }

    #[test]
    fn test_multi_artist_identifier_uses_first() {
        assert_eq!(first_identifier("ar-1; ar-2"), "ar-1");
        assert_eq!(first_identifier("ar-1/ar-2"), "ar-1");
        assert_eq!(first_identifier(" ; "), "");
    }

    #[test]
    fn test_split_genres() {
        assert_eq!(
            split_genres("Rock; Pop,rock ,, Jazz"),
            vec!["Rock", "Pop", "Jazz"]
        );
        assert!(split_genres(" ; ").is_empty());
    }

    #[test]
    fn test_fill_from_keeps_existing() {
        let mut stream = RawTags::from_pairs([("title", "Stream")]);
        let format = RawTags::from_pairs([("TITLE", "Format"), ("album", "Album")]);
        stream.fill_from(&format);
        assert_eq!(stream.first(&["title"]), Some("Stream"));
        assert_eq!(stream.first(&["album"]), Some("Album"));
    }
}
