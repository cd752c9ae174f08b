//! Metadata extraction port.
//!
//! The synchronizer depends only on [`MetadataExtractor`]. The production
//! implementation is [`FfprobeExtractor`], which reads container tags with
//! ffprobe and pulls embedded cover art with ffmpeg.

pub mod ffprobe;
pub mod tags;
pub mod tools;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lyrebird_db::models::TrackMetadata;

pub use ffprobe::{FfprobeExtractor, ReaderTable, TagReader};
pub use tools::{check_tools, resolve_tool, ToolInfo};

/// Per-file extraction failures. None of these abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("not a recognized audio file: {0:?}")]
    Unsupported(PathBuf),

    #[error("{0} is not available")]
    ToolMissing(&'static str),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },

    #[error("could not parse metadata: {0}")]
    Parse(String),

    #[error("missing MusicBrainz identifiers: {0}")]
    MissingIdentifiers(String),
}

/// Reads tags and technical fields from one audio file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract normalized metadata for `path`.
    async fn extract(&self, path: &Path) -> Result<TrackMetadata, ExtractError>;

    /// Raw bytes of the cover image embedded in `path`, if any.
    async fn embedded_artwork(&self, path: &Path) -> Result<Option<Vec<u8>>, ExtractError>;
}
