//! Deezer name-search artwork provider.
//!
//! Deezer's public search API needs no credentials. Albums are searched by
//! `"<artist> <album>"` and the first result is taken; artists must match the
//! requested name exactly (ignoring case) because the artist search is fuzzy.

use anyhow::Context;
use async_trait::async_trait;
use lyrebird_common::EntityKind;
use serde::Deserialize;
use tracing::debug;

use super::http::{RateLimitedClient, USER_AGENT};
use super::provider::{ArtworkProvider, NameQuery};
use crate::config::DeezerConfig;

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbum {
    cover: Option<String>,
    cover_small: Option<String>,
    cover_medium: Option<String>,
    cover_big: Option<String>,
    cover_xl: Option<String>,
}

impl DeezerAlbum {
    fn best_image(self) -> Option<String> {
        [self.cover_xl, self.cover_big, self.cover_medium, self.cover_small, self.cover]
            .into_iter()
            .flatten()
            .find(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct DeezerArtist {
    #[serde(default)]
    name: String,
    picture: Option<String>,
    picture_small: Option<String>,
    picture_medium: Option<String>,
    picture_big: Option<String>,
    picture_xl: Option<String>,
}

impl DeezerArtist {
    fn best_image(self) -> Option<String> {
        [
            self.picture_xl,
            self.picture_big,
            self.picture_medium,
            self.picture_small,
            self.picture,
        ]
        .into_iter()
        .flatten()
        .find(|u| !u.is_empty())
    }
}

/// Name-search provider backed by the Deezer public API.
pub struct DeezerProvider {
    http: RateLimitedClient,
    config: DeezerConfig,
}

impl DeezerProvider {
    pub fn new(config: DeezerConfig) -> anyhow::Result<Self> {
        let http = RateLimitedClient::new("deezer", USER_AGENT, config.requests_per_second)?;
        Ok(Self { http, config })
    }

    fn search_url(&self, path: &str, query: &str) -> anyhow::Result<String> {
        let base = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let url = reqwest::Url::parse_with_params(&base, &[("q", query)])
            .with_context(|| format!("invalid deezer url: {base}"))?;
        Ok(url.to_string())
    }

    async fn search_album(&self, album: &str, artist: &str) -> anyhow::Result<Option<String>> {
        let url = self.search_url("/search/album", &format!("{artist} {album}"))?;
        debug!(url = %url, "Deezer album search");

        let Some(body) = self.http.get_json::<SearchResponse<DeezerAlbum>>(&url).await? else {
            return Ok(None);
        };
        Ok(body.data.into_iter().next().and_then(DeezerAlbum::best_image))
    }

    async fn search_artist(&self, name: &str) -> anyhow::Result<Option<String>> {
        let url = self.search_url("/search/artist", name)?;
        debug!(url = %url, "Deezer artist search");

        let Some(body) = self.http.get_json::<SearchResponse<DeezerArtist>>(&url).await? else {
            return Ok(None);
        };
        let wanted = name.to_lowercase();
        Ok(body
            .data
            .into_iter()
            .find(|a| a.name.to_lowercase() == wanted)
            .and_then(DeezerArtist::best_image))
    }
}

#[async_trait]
impl ArtworkProvider for DeezerProvider {
    fn name(&self) -> &'static str {
        "deezer"
    }

    fn is_available(&self) -> bool {
        self.config.enabled
    }

    async fn lookup_by_name(&self, query: &NameQuery<'_>) -> anyhow::Result<Option<String>> {
        if query.name.trim().is_empty() {
            return Ok(None);
        }
        match query.kind {
            EntityKind::Album => match query.artist {
                Some(artist) if !artist.trim().is_empty() => {
                    self.search_album(query.name, artist).await
                }
                _ => Ok(None),
            },
            EntityKind::Artist => self.search_artist(query.name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_prefers_largest_cover() {
        let album = DeezerAlbum {
            cover: Some("c".into()),
            cover_small: Some("s".into()),
            cover_medium: None,
            cover_big: Some("b".into()),
            cover_xl: Some(String::new()),
        };
        assert_eq!(album.best_image().as_deref(), Some("b"));
    }

    #[test]
    fn artist_falls_back_to_plain_picture() {
        let artist = DeezerArtist {
            name: "A".into(),
            picture: Some("p".into()),
            picture_small: None,
            picture_medium: None,
            picture_big: None,
            picture_xl: None,
        };
        assert_eq!(artist.best_image().as_deref(), Some("p"));
    }

    #[test]
    fn search_url_encodes_query() {
        let provider = DeezerProvider::new(DeezerConfig::default()).unwrap();
        let url = provider.search_url("/search/album", "Artist A Album B").unwrap();
        assert_eq!(url, "https://api.deezer.com/search/album?q=Artist+A+Album+B");
    }

    #[tokio::test]
    async fn album_lookup_without_artist_is_skipped() {
        let provider = DeezerProvider::new(DeezerConfig::default()).unwrap();
        let query = NameQuery {
            kind: EntityKind::Album,
            name: "Album B",
            artist: None,
        };
        assert!(provider.lookup_by_name(&query).await.unwrap().is_none());
    }
}
