//! Typed identifier wrappers for canonical registry ids.
//!
//! Albums, artists and tracks are keyed by identifiers issued by an external
//! metadata registry (MusicBrainz). They are plain strings on the wire, so the
//! newtypes here keep an album id from being used where an artist id is
//! expected. Every id is validated on construction because ids are also used
//! as file names under the artwork directory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::EntityKind;

/// Returns `true` if `id` can be used as a single path component.
///
/// Rejects empty ids and anything containing `/`, `\` or `..`.
///
/// # Examples
///
/// ```
/// use lyrebird_common::ids::is_path_safe;
///
/// assert!(is_path_safe("0b6b4ba0-d36f-47bd-b4ea-6a5b91842d29"));
/// assert!(!is_path_safe("../etc/passwd"));
/// assert!(!is_path_safe("a/b"));
/// assert!(!is_path_safe(""));
/// ```
pub fn is_path_safe(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.contains('\\') && !id.contains("..")
}

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn parse<S: Into<String>>(raw: S) -> Result<Self> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if !is_path_safe(trimmed) {
                    return Err(Error::invalid_input(format!(
                        "invalid {} id: {:?}",
                        $label, raw
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

registry_id!(
    /// Canonical identifier of an album (a MusicBrainz release id).
    AlbumId,
    "album"
);

registry_id!(
    /// Canonical identifier of an artist.
    ArtistId,
    "artist"
);

registry_id!(
    /// Canonical identifier of a track.
    TrackId,
    "track"
);

/// An album or artist identifier, the two keyspaces artwork is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityKey {
    Album(AlbumId),
    Artist(ArtistId),
}

impl EntityKey {
    /// Which keyspace this key belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Album(_) => EntityKind::Album,
            Self::Artist(_) => EntityKind::Artist,
        }
    }

    /// The raw identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Album(id) => id.as_str(),
            Self::Artist(id) => id.as_str(),
        }
    }

    /// Build a key from a kind and an unvalidated id.
    pub fn parse(kind: EntityKind, id: &str) -> Result<Self> {
        match kind {
            EntityKind::Album => AlbumId::parse(id).map(Self::Album),
            EntityKind::Artist => ArtistId::parse(id).map(Self::Artist),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
