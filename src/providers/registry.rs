//! Provider registry for managing multiple [`ArtworkProvider`] implementations.
//!
//! The [`ProviderRegistry`] aggregates artwork providers and walks them in
//! registration order. Canonical-id lookups and name lookups are separate
//! passes so the cascade can try every registry source before falling back
//! to a fuzzier name search.

use std::sync::Arc;

use lyrebird_common::EntityKind;
use tracing::{debug, warn};

use super::provider::{ArtworkProvider, NameQuery};

/// An image URL together with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHit {
    pub provider: &'static str,
    pub url: String,
}

/// A registry that manages multiple [`ArtworkProvider`] implementations.
///
/// Providers are stored in the order they are registered. Lookups query each
/// *available* provider in turn and return the first hit. A provider that
/// errors is logged and skipped so one unreachable service never hides the
/// others.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use lyrebird::providers::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
///
/// let hit = registry.lookup_canonical(EntityKind::Album, "abc").await;
/// ```
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ArtworkProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new artwork provider.
    pub fn register(&mut self, provider: Arc<dyn ArtworkProvider>) {
        self.providers.push(provider);
    }

    /// Return references to all providers that are currently available.
    pub fn available(&self) -> Vec<&dyn ArtworkProvider> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.as_ref())
            .collect()
    }

    /// Look up a provider by its [`ArtworkProvider::name`].
    pub fn get(&self, name: &str) -> Option<&dyn ArtworkProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Ask every available provider for an image by canonical id.
    pub async fn lookup_canonical(&self, kind: EntityKind, id: &str) -> Option<ProviderHit> {
        for provider in self.available() {
            match provider.lookup_by_canonical_id(kind, id).await {
                Ok(Some(url)) => {
                    return Some(ProviderHit {
                        provider: provider.name(),
                        url,
                    })
                }
                Ok(None) => {
                    debug!(provider = provider.name(), %kind, id, "No canonical image");
                }
                Err(e) => {
                    warn!(provider = provider.name(), %kind, id, error = %e, "Canonical lookup failed");
                }
            }
        }
        None
    }

    /// Ask every available provider for an image by display name.
    pub async fn lookup_name(&self, query: &NameQuery<'_>) -> Option<ProviderHit> {
        for provider in self.available() {
            match provider.lookup_by_name(query).await {
                Ok(Some(url)) => {
                    return Some(ProviderHit {
                        provider: provider.name(),
                        url,
                    })
                }
                Ok(None) => {
                    debug!(provider = provider.name(), name = query.name, "No image by name");
                }
                Err(e) => {
                    warn!(provider = provider.name(), name = query.name, error = %e, "Name lookup failed");
                }
            }
        }
        None
    }

    /// Clear every provider's memoised lookups.
    pub fn clear_caches(&self) {
        for provider in &self.providers {
            provider.clear_cache();
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
