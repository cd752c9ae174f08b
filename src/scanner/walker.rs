//! Filesystem walker and change detector.
//!
//! Enumerates audio files and convention-named artwork under the configured
//! roots and reports each with its modification signal, `max(mtime, ctime)`. Classification against the
//! stored catalog is a pure function so the orchestrator can apply it to a
//! snapshot without touching the store per file.

use std::fs::Metadata;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lyrebird_common::paths::has_allowed_extension;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One observation made while walking.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkItem {
    /// An audio file and its modification signal.
    Observed { path: PathBuf, signal: DateTime<Utc> },
    /// A local artwork file named in [`WalkOptions::image_names`].
    Image { path: PathBuf, signal: DateTime<Utc> },
    /// An entry that could not be stat'ed or read.
    Skipped { path: PathBuf, reason: String },
}

/// Fatal walk failures.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("music root {root:?} is unavailable: {reason}")]
    RootUnavailable { root: PathBuf, reason: String },

    #[error("walk interrupted by consumer")]
    Interrupted,
}

/// Per-file decision against the stored catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    New,
    Changed,
    Unchanged,
}

impl FileChange {
    pub fn needs_processing(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Process iff there is no stored signal, or the observed one is strictly newer.
pub fn classify(stored: Option<DateTime<Utc>>, observed: DateTime<Utc>) -> FileChange {
    match stored {
        None => FileChange::New,
        Some(stored) if observed > stored => FileChange::Changed,
        Some(_) => FileChange::Unchanged,
    }
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub extensions: Vec<String>,
    pub follow_links: bool,
    /// Artwork file names reported as [`WalkItem::Image`], matched
    /// case-insensitively.
    pub image_names: Vec<String>,
}

impl WalkOptions {
    fn is_image_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.image_names.iter().any(|i| i.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
    }
}

/// Counters for a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub observed: u64,
    pub images: u64,
    pub skipped: u64,
}

/// Modification signal of a file: the later of content-modify time and
/// attribute-change time.
///
/// ctime is only available on unix; elsewhere the signal is the mtime.
pub fn modification_signal(metadata: &Metadata) -> std::io::Result<DateTime<Utc>> {
    let modified: DateTime<Utc> = metadata.modified()?.into();

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let changed = DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32);
        if let Some(changed) = changed {
            return Ok(modified.max(changed));
        }
    }

    Ok(modified)
}

fn check_root(root: &Path) -> Result<(), WalkError> {
    let unavailable = |reason: String| WalkError::RootUnavailable {
        root: root.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(root).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }
    std::fs::read_dir(root).map_err(|e| unavailable(e.to_string()))?;
    Ok(())
}

/// Walk every root and hand each observation to `sink`.
///
/// All roots are checked before anything is emitted, so an unavailable root
/// fails the walk without partial output. Unreadable entries below a root are
/// reported as [`WalkItem::Skipped`] and never abort the walk. Returning
/// [`ControlFlow::Break`] from `sink` stops the walk with
/// [`WalkError::Interrupted`].
pub fn walk_roots<F>(roots: &[PathBuf], options: &WalkOptions, mut sink: F) -> Result<WalkSummary, WalkError>
where
    F: FnMut(WalkItem) -> ControlFlow<()>,
{
    for root in roots {
        check_root(root)?;
    }

    let mut summary = WalkSummary::default();

    for root in roots {
        debug!(root = %root.display(), "Walking music root");

        for entry in WalkDir::new(root).follow_links(options.follow_links) {
            let item = match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    let is_image = options.is_image_name(path);
                    if !is_image && !has_allowed_extension(path, &options.extensions) {
                        continue;
                    }
                    match entry.metadata().map_err(|e| e.to_string()).and_then(|m| {
                        modification_signal(&m).map_err(|e| e.to_string())
                    }) {
                        Ok(signal) if is_image => WalkItem::Image {
                            path: path.to_path_buf(),
                            signal,
                        },
                        Ok(signal) => WalkItem::Observed {
                            path: path.to_path_buf(),
                            signal,
                        },
                        Err(reason) => WalkItem::Skipped {
                            path: path.to_path_buf(),
                            reason,
                        },
                    }
                }
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    WalkItem::Skipped {
                        path,
                        reason: err.to_string(),
                    }
                }
            };

            match &item {
                WalkItem::Observed { .. } => summary.observed += 1,
                WalkItem::Image { .. } => summary.images += 1,
                WalkItem::Skipped { path, reason } => {
                    warn!(path = %path.display(), reason = %reason, "Skipping unreadable entry");
                    summary.skipped += 1;
                }
            }

            if sink(item).is_break() {
                return Err(WalkError::Interrupted);
            }
        }
    }

    Ok(summary)
}
