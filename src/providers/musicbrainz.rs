//! MusicBrainz canonical artwork provider.
//!
//! Albums resolve through the Cover Art Archive. Artists have no images on
//! MusicBrainz itself, so the artist's Wikidata relation is followed to its
//! `P18` (image) claim and served from Wikimedia Commons.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use lyrebird_common::EntityKind;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::http::RateLimitedClient;
use super::provider::ArtworkProvider;
use crate::config::MusicBrainzConfig;

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoverArtResponse {
    #[serde(default)]
    images: Vec<CoverArtImage>,
}

#[derive(Debug, Deserialize)]
struct CoverArtImage {
    #[serde(default)]
    front: bool,
    image: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(rename = "type", default)]
    kind: String,
    url: Option<RelationUrl>,
}

#[derive(Debug, Deserialize)]
struct RelationUrl {
    resource: String,
}

#[derive(Debug, Deserialize)]
struct WikidataResponse {
    #[serde(default)]
    entities: HashMap<String, WikidataEntity>,
}

#[derive(Debug, Deserialize)]
struct WikidataEntity {
    #[serde(default)]
    claims: HashMap<String, Vec<WikidataClaim>>,
}

#[derive(Debug, Deserialize)]
struct WikidataClaim {
    mainsnak: WikidataSnak,
}

#[derive(Debug, Deserialize)]
struct WikidataSnak {
    datavalue: Option<WikidataValue>,
}

#[derive(Debug, Deserialize)]
struct WikidataValue {
    value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Canonical-id provider backed by MusicBrainz, the Cover Art Archive,
/// Wikidata and Wikimedia Commons.
pub struct MusicBrainzProvider {
    http: RateLimitedClient,
    config: MusicBrainzConfig,
    cache: DashMap<(EntityKind, String), Option<String>>,
}

impl MusicBrainzProvider {
    pub fn new(config: MusicBrainzConfig) -> anyhow::Result<Self> {
        let http = RateLimitedClient::new("musicbrainz", &config.user_agent, config.requests_per_second)?;
        Ok(Self {
            http,
            config,
            cache: DashMap::new(),
        })
    }

    async fn album_cover(&self, release_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/release/{}",
            self.config.cover_art_url.trim_end_matches('/'),
            release_id
        );
        let Some(body) = self.http.get_json::<CoverArtResponse>(&url).await? else {
            return Ok(None);
        };

        let image = body
            .images
            .iter()
            .find(|img| img.front)
            .or_else(|| body.images.first());

        let url = image.and_then(|img| {
            img.thumbnails
                .get("large")
                .cloned()
                .or_else(|| img.image.clone())
        });

        Ok(url.map(|u| self.secure(u)))
    }

    async fn artist_image(&self, artist_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/artist/{}?inc=url-rels&fmt=json",
            self.config.base_url.trim_end_matches('/'),
            artist_id
        );
        let Some(artist) = self.http.get_json::<ArtistResponse>(&url).await? else {
            return Ok(None);
        };

        let Some(entity_id) = artist
            .relations
            .iter()
            .filter(|r| r.kind == "wikidata")
            .filter_map(|r| r.url.as_ref())
            .find(|u| u.resource.contains("wikidata"))
            .and_then(|u| wikidata_entity_id(&u.resource))
        else {
            debug!(artist_id, "Artist has no Wikidata relation");
            return Ok(None);
        };

        let url = format!(
            "{}/{}.json",
            self.config.wikidata_url.trim_end_matches('/'),
            entity_id
        );
        let Some(wikidata) = self.http.get_json::<WikidataResponse>(&url).await? else {
            return Ok(None);
        };

        let file_name = wikidata
            .entities
            .get(&entity_id)
            .and_then(|e| e.claims.get("P18"))
            .and_then(|claims| claims.first())
            .and_then(|c| c.mainsnak.datavalue.as_ref())
            .and_then(|v| v.value.as_str())
            .map(str::to_string);

        match file_name {
            Some(name) => commons_file_url(&self.config.commons_url, &name).map(Some),
            None => Ok(None),
        }
    }

    /// Cover Art Archive hands out `http://` links; upgrade them when the
    /// archive itself is reached over TLS.
    fn secure(&self, url: String) -> String {
        if self.config.cover_art_url.starts_with("https://") {
            if let Some(rest) = url.strip_prefix("http://") {
                return format!("https://{rest}");
            }
        }
        url
    }
}

/// The `Q...` id at the end of a Wikidata entity URL.
fn wikidata_entity_id(resource: &str) -> Option<String> {
    resource
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| id.starts_with('Q') && id.len() > 1)
        .map(str::to_string)
}

/// Build a Commons `Special:FilePath` URL for a file name.
fn commons_file_url(base: &str, file_name: &str) -> anyhow::Result<String> {
    let mut url = reqwest::Url::parse(base).with_context(|| format!("invalid commons url: {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("commons url cannot be a base: {base}"))?
        .push(&file_name.replace(' ', "_"));
    Ok(url.to_string())
}

#[async_trait]
impl ArtworkProvider for MusicBrainzProvider {
    fn name(&self) -> &'static str {
        "musicbrainz"
    }

    fn is_available(&self) -> bool {
        self.config.enabled
    }

    async fn lookup_by_canonical_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> anyhow::Result<Option<String>> {
        let key = (kind, id.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let url = match kind {
            EntityKind::Album => self.album_cover(id).await?,
            EntityKind::Artist => self.artist_image(id).await?,
        };
        self.cache.insert(key, url.clone());
        Ok(url)
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_wikidata_entity_id() {
        assert_eq!(
            wikidata_entity_id("https://www.wikidata.org/wiki/Q1299").as_deref(),
            Some("Q1299")
        );
        assert_eq!(
            wikidata_entity_id("https://www.wikidata.org/wiki/Q1299/").as_deref(),
            Some("Q1299")
        );
        assert!(wikidata_entity_id("https://www.wikidata.org/wiki/").is_none());
    }

    #[test]
    fn commons_url_encodes_file_name() {
        let url = commons_file_url(
            "https://commons.wikimedia.org/wiki/Special:FilePath",
            "The Beatles (1964).jpg",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://commons.wikimedia.org/wiki/Special:FilePath/The_Beatles_(1964).jpg"
        );
    }

    #[test]
    fn upgrades_only_for_tls_archive() {
        let provider = MusicBrainzProvider::new(MusicBrainzConfig::default()).unwrap();
        assert_eq!(
            provider.secure("http://archive.org/a.jpg".into()),
            "https://archive.org/a.jpg"
        );

        let plain = MusicBrainzProvider::new(MusicBrainzConfig {
            cover_art_url: "http://127.0.0.1:9999".into(),
            ..MusicBrainzConfig::default()
        })
        .unwrap();
        assert_eq!(
            plain.secure("http://127.0.0.1:9999/a.jpg".into()),
            "http://127.0.0.1:9999/a.jpg"
        );
    }

    #[test]
    fn disabled_provider_is_unavailable() {
        let provider = MusicBrainzProvider::new(MusicBrainzConfig {
            enabled: false,
            ..MusicBrainzConfig::default()
        })
        .unwrap();
        assert!(!provider.is_available());
    }
}
