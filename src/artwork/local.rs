//! Local artwork discovery next to the audio files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lyrebird_common::paths::entity_image_name;
use tracing::{debug, warn};

use crate::scanner::walker::modification_signal;

/// An image file found in one of an entity's directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub path: PathBuf,
    /// Modification signal of the image, comparable to artwork freshness.
    pub modified: DateTime<Utc>,
}

/// Search `directories` in order for the convention name, then for
/// `<display_name>.jpg`. The first existing file wins.
///
/// Names match case-insensitively, the way the walker reports convention
/// images, so `Folder.JPG` counts as `folder.jpg` on any filesystem.
pub fn find_local_image(
    directories: &[PathBuf],
    convention: &str,
    display_name: &str,
) -> Option<LocalImage> {
    let by_name = entity_image_name(display_name);

    for dir in directories {
        let candidates = std::iter::once(convention).chain(by_name.as_deref());
        for file_name in candidates {
            if let Some(found) = lookup(dir, file_name) {
                debug!(path = %found.path.display(), "Found local artwork");
                return Some(found);
            }
        }
    }
    None
}

/// Exact name first, then any entry whose name differs only in ASCII case.
fn lookup(dir: &Path, file_name: &str) -> Option<LocalImage> {
    if let Some(found) = stat_image(&dir.join(file_name)) {
        return Some(found);
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Cannot list artwork directory");
            }
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(file_name))
        })
        .find_map(|entry| stat_image(&entry.path()))
}

fn stat_image(path: &Path) -> Option<LocalImage> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot stat artwork candidate");
            return None;
        }
    };

    match modification_signal(&metadata) {
        Ok(modified) => Some(LocalImage {
            path: path.to_path_buf(),
            modified,
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read artwork timestamp");
            None
        }
    }
}
