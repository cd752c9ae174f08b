//! Remote artwork providers.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and query types.
//! - [`registry`] -- Provider registry for multi-source lookups.
//! - [`http`] -- Rate-limited HTTP client shared by the providers.
//! - [`musicbrainz`] -- Canonical-id lookups (Cover Art Archive, Wikidata).
//! - [`deezer`] -- Name-based lookups.

pub mod deezer;
pub mod http;
pub mod musicbrainz;
pub mod provider;
pub mod registry;

use std::sync::Arc;

use tracing::info;

use crate::config::ProvidersConfig;

pub use deezer::DeezerProvider;
pub use musicbrainz::MusicBrainzProvider;
pub use provider::{ArtworkProvider, NameQuery};
pub use registry::{ProviderHit, ProviderRegistry};

/// Build the registry from configuration.
///
/// The canonical registry is registered first; it answers id lookups while
/// Deezer answers name lookups. Disabled providers are left out.
pub fn build_registry(config: &ProvidersConfig) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    if config.musicbrainz.enabled {
        registry.register(Arc::new(MusicBrainzProvider::new(config.musicbrainz.clone())?));
    }
    if config.deezer.enabled {
        registry.register(Arc::new(DeezerProvider::new(config.deezer.clone())?));
    }

    let available: Vec<&str> = registry.available().iter().map(|p| p.name()).collect();
    info!(providers = ?available, "Artwork providers configured");
    Ok(registry)
}
