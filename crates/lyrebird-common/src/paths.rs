//! Path utilities for audio files and local artwork conventions.
//!
//! This module provides the default audio extension allow-list used by the
//! walker, and the file names under which local cover art is looked up.

use std::path::Path;

/// Default audio extensions recognized by the scanner.
const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "alac", "flac", "m4a", "mp3", "ogg", "opus", "wav", "wma",
];

/// Conventional album cover file name, looked up before `<album>.jpg`.
pub const ALBUM_IMAGE_NAME: &str = "folder.jpg";

/// Conventional artist image file name, looked up before `<artist>.jpg`.
pub const ARTIST_IMAGE_NAME: &str = "artist.jpg";

/// Lower-cased extension of a path, without the dot.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use lyrebird_common::paths::extension_lower;
///
/// assert_eq!(extension_lower(Path::new("a/B.FLAC")).as_deref(), Some("flac"));
/// assert_eq!(extension_lower(Path::new("README")), None);
/// ```
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Check a path against a configured extension allow-list.
///
/// Entries in `allowed` may be written with or without a leading dot and in
/// any case.
pub fn has_allowed_extension<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    let Some(ext) = extension_lower(path) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.as_ref().trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// File name for an entity-named image, e.g. `Abbey Road.jpg`.
///
/// Returns `None` when the name is empty or would escape its directory.
///
/// # Examples
///
/// ```
/// use lyrebird_common::paths::entity_image_name;
///
/// assert_eq!(entity_image_name("Abbey Road").as_deref(), Some("Abbey Road.jpg"));
/// assert_eq!(entity_image_name("AC/DC"), None);
/// ```
pub fn entity_image_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
        return None;
    }
    Some(format!("{name}.jpg"))
}

/// Get the default list of audio file extensions.
#[must_use]
pub fn audio_extensions() -> &'static [&'static str] {
    AUDIO_EXTENSIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list() {
        let defaults = audio_extensions();
        for ext in defaults {
            assert!(has_allowed_extension(Path::new(&format!("track.{ext}")), defaults));
        }

        // Case insensitive
        assert!(has_allowed_extension(Path::new("track.FLAC"), defaults));
        assert!(has_allowed_extension(Path::new("track.Mp3"), defaults));

        // Not audio files
        assert!(!has_allowed_extension(Path::new("folder.jpg"), defaults));
        assert!(!has_allowed_extension(Path::new("notes.txt"), defaults));
        assert!(!has_allowed_extension(Path::new("no_extension"), defaults));
    }

    #[test]
    fn test_has_allowed_extension() {
        let allowed = vec![".mp3".to_string(), "FLAC".to_string()];
        assert!(has_allowed_extension(Path::new("a.mp3"), &allowed));
        assert!(has_allowed_extension(Path::new("a.flac"), &allowed));
        assert!(!has_allowed_extension(Path::new("a.ogg"), &allowed));
        assert!(!has_allowed_extension(Path::new("mp3"), &allowed));
    }

    #[test]
    fn test_entity_image_name() {
        assert_eq!(entity_image_name(" Help! ").as_deref(), Some("Help!.jpg"));
        assert_eq!(entity_image_name(""), None);
        assert_eq!(entity_image_name(".."), None);
        assert_eq!(entity_image_name("a\\b"), None);
    }
}
