//! Trait definition and query types for remote artwork providers.
//!
//! This module defines the [`ArtworkProvider`] trait that every remote image
//! source (MusicBrainz/Cover Art Archive, Deezer, ...) implements. Providers
//! only resolve an image *URL*; downloading and storing the bytes is the
//! artwork cascade's job.

use async_trait::async_trait;
use lyrebird_common::EntityKind;

/// A name-based lookup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameQuery<'a> {
    /// Album or artist keyspace.
    pub kind: EntityKind,
    /// Display name of the album or artist.
    pub name: &'a str,
    /// Album artist, for album lookups.
    pub artist: Option<&'a str>,
}

impl<'a> NameQuery<'a> {
    pub fn album(name: &'a str, artist: &'a str) -> Self {
        Self {
            kind: EntityKind::Album,
            name,
            artist: Some(artist),
        }
    }

    pub fn artist(name: &'a str) -> Self {
        Self {
            kind: EntityKind::Artist,
            name,
            artist: None,
        }
    }
}

/// Async trait that all artwork providers implement.
///
/// Both lookups default to "not supported" so a provider only overrides the
/// kind of lookup its backend can answer. `Ok(None)` means the provider has
/// no image; `Err` means the provider could not be asked.
#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"deezer"`).
    fn name(&self) -> &'static str;

    /// Returns `true` when the provider is enabled and ready to serve requests.
    fn is_available(&self) -> bool;

    /// Resolve an image URL from a canonical registry identifier.
    async fn lookup_by_canonical_id(
        &self,
        _kind: EntityKind,
        _id: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Resolve an image URL from a display name.
    async fn lookup_by_name(&self, _query: &NameQuery<'_>) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Drop any memoised lookups.
    fn clear_cache(&self) {}
}
