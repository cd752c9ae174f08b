//! Core type definitions for artwork and scan bookkeeping.
//!
//! All enums are stored in the database and serialized over the API in
//! lowercase (snake_case for multi-word variants).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Keyspace an artwork record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Cover art for an album.
    Album,
    /// Portrait for an album artist.
    Artist,
}

impl EntityKind {
    /// Stable lowercase name, also used as the artwork subdirectory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            other => Err(Error::invalid_input(format!("unknown entity kind: {other}"))),
        }
    }
}

/// Where a stored artwork image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkSource {
    /// An image file next to the audio files.
    Local,
    /// A picture embedded in the audio file's tags.
    Embedded,
    /// The canonical metadata registry (Cover Art Archive, Wikidata).
    Registry,
    /// A third-party name-based search.
    NameSearch,
}

impl ArtworkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Embedded => "embedded",
            Self::Registry => "registry",
            Self::NameSearch => "name_search",
        }
    }
}

impl fmt::Display for ArtworkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtworkSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "embedded" => Ok(Self::Embedded),
            "registry" => Ok(Self::Registry),
            "name_search" => Ok(Self::NameSearch),
            other => Err(Error::invalid_input(format!("unknown artwork source: {other}"))),
        }
    }
}

/// Lifecycle state of a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// No run has happened yet.
    Idle,
    /// A run holds the run-lock.
    Running,
    /// The run finished and swept the catalog.
    Completed,
    /// The run aborted; counts are partial.
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the state is final for a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::invalid_input(format!("unknown scan state: {other}"))),
        }
    }
}
