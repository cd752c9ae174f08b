//! ffprobe-backed metadata extraction.
//!
//! Tag location differs by container: most formats carry tags at the
//! container level, while Ogg-family files (opus, ogg) carry them on the
//! audio stream. A [`ReaderTable`] keyed by extension picks the
//! [`TagReader`] strategy for each file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lyrebird_common::paths::extension_lower;
use lyrebird_db::models::TrackMetadata;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::tags::{normalize, RawTags, Technical};
use super::tools::resolve_tool;
use super::{ExtractError, MetadataExtractor};
use crate::config::ToolsConfig;

/// Per-invocation timeout for ffprobe and ffmpeg.
const TOOL_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// ffprobe JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub format: ProbeFormat,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ProbeOutput {
    fn first_audio_stream(&self) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
    }

    fn technical(&self) -> Technical {
        Technical {
            format: self.format.format_name.clone(),
            codec: self.first_audio_stream().and_then(|s| s.codec_name.clone()),
            duration: self.format.duration.as_deref().and_then(|d| d.parse().ok()),
            size: self.format.size.as_deref().and_then(|s| s.parse().ok()),
            bitrate: self.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tag reading strategies
// ---------------------------------------------------------------------------

/// Where to read tags from in ffprobe output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagReader {
    /// Container-level tags.
    FormatTags,
    /// Tags on the first audio stream, with container tags filling gaps.
    StreamTags,
}

impl TagReader {
    pub fn read_tags(self, probe: &ProbeOutput) -> RawTags {
        let format = RawTags::from_pairs(&probe.format.tags);
        match self {
            Self::FormatTags => format,
            Self::StreamTags => {
                let mut tags = probe
                    .first_audio_stream()
                    .map(|s| RawTags::from_pairs(&s.tags))
                    .unwrap_or_default();
                tags.fill_from(&format);
                tags
            }
        }
    }
}

/// Extension → [`TagReader`] lookup over the audio allow-list.
#[derive(Debug, Clone)]
pub struct ReaderTable {
    readers: HashMap<String, TagReader>,
}

impl ReaderTable {
    /// Build a table for the allowed extensions. Ogg-family extensions use
    /// [`TagReader::StreamTags`]; everything else uses
    /// [`TagReader::FormatTags`].
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let readers = extensions
            .iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .map(|ext| {
                let reader = match ext.as_str() {
                    "opus" | "ogg" => TagReader::StreamTags,
                    _ => TagReader::FormatTags,
                };
                (ext, reader)
            })
            .collect();
        Self { readers }
    }

    /// Reader for `path`, or `None` if its extension is not allowed.
    pub fn reader_for(&self, path: &Path) -> Option<TagReader> {
        extension_lower(path).and_then(|ext| self.readers.get(&ext).copied())
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// [`MetadataExtractor`] backed by the ffprobe and ffmpeg binaries.
pub struct FfprobeExtractor {
    ffprobe: Option<PathBuf>,
    ffmpeg: Option<PathBuf>,
    readers: ReaderTable,
}

impl FfprobeExtractor {
    pub fn new(ffprobe: Option<PathBuf>, ffmpeg: Option<PathBuf>, readers: ReaderTable) -> Self {
        Self {
            ffprobe,
            ffmpeg,
            readers,
        }
    }

    /// Locate the tools from config or `PATH`.
    pub fn discover<S: AsRef<str>>(tools: &ToolsConfig, extensions: &[S]) -> Self {
        Self::new(
            resolve_tool(tools.ffprobe_path.as_deref(), "ffprobe"),
            resolve_tool(tools.ffmpeg_path.as_deref(), "ffmpeg"),
            ReaderTable::new(extensions),
        )
    }

    async fn probe(&self, path: &Path) -> Result<ProbeOutput, ExtractError> {
        let ffprobe = self
            .ffprobe
            .as_deref()
            .ok_or(ExtractError::ToolMissing("ffprobe"))?;

        let mut cmd = Command::new(ffprobe);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let stdout = run("ffprobe", cmd).await?;

        serde_json::from_slice(&stdout).map_err(|e| ExtractError::Parse(e.to_string()))
    }
}

/// Run a command to completion and return its stdout.
async fn run(tool: &'static str, mut cmd: Command) -> Result<Vec<u8>, ExtractError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| ExtractError::ToolFailed {
        tool,
        message: format!("failed to spawn: {e}"),
    })?;

    let output = tokio::time::timeout(TOOL_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| ExtractError::ToolFailed {
            tool,
            message: format!("timed out after {:?}", TOOL_TIMEOUT),
        })?
        .map_err(|e| ExtractError::ToolFailed {
            tool,
            message: format!("I/O error waiting for process: {e}"),
        })?;

    if !output.status.success() {
        return Err(ExtractError::ToolFailed {
            tool,
            message: format!(
                "exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(output.stdout)
}

#[async_trait]
impl MetadataExtractor for FfprobeExtractor {
    async fn extract(&self, path: &Path) -> Result<TrackMetadata, ExtractError> {
        let reader = self
            .readers
            .reader_for(path)
            .ok_or_else(|| ExtractError::Unsupported(path.to_path_buf()))?;

        let probe = self.probe(path).await?;
        let tags = reader.read_tags(&probe);
        debug!(path = %path.display(), reader = ?reader, "Read tags");

        normalize(path, &tags, probe.technical())
    }

    async fn embedded_artwork(&self, path: &Path) -> Result<Option<Vec<u8>>, ExtractError> {
        let ffmpeg = self
            .ffmpeg
            .as_deref()
            .ok_or(ExtractError::ToolMissing("ffmpeg"))?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-v", "quiet", "-i"])
            .arg(path)
            .args(["-an", "-c:v", "copy", "-f", "image2pipe", "-"]);

        match run("ffmpeg", cmd).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            // ffmpeg exits non-zero when the file has no picture stream.
            Err(ExtractError::ToolFailed { message, .. }) => {
                debug!(path = %path.display(), message = %message, "No embedded artwork");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
