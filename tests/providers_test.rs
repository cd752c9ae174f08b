//! Provider tests against mocked remote APIs.

mod common;

use std::sync::Arc;

use common::CountingProvider;
use lyrebird::config::{DeezerConfig, MusicBrainzConfig, ProvidersConfig};
use lyrebird::providers::http::RateLimitedClient;
use lyrebird::providers::{
    build_registry, ArtworkProvider, DeezerProvider, MusicBrainzProvider, NameQuery, ProviderRegistry,
};
use lyrebird_common::EntityKind;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn musicbrainz_config(server: &MockServer) -> MusicBrainzConfig {
    MusicBrainzConfig {
        base_url: format!("{}/ws/2", server.uri()),
        cover_art_url: server.uri(),
        wikidata_url: format!("{}/wd", server.uri()),
        commons_url: format!("{}/commons/Special:FilePath", server.uri()),
        requests_per_second: 100,
        ..MusicBrainzConfig::default()
    }
}

fn deezer_config(server: &MockServer) -> DeezerConfig {
    DeezerConfig {
        base_url: server.uri(),
        requests_per_second: 100,
        ..DeezerConfig::default()
    }
}

#[tokio::test]
async fn cover_art_prefers_front_thumbnail_and_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/release/rel-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [
                { "front": false, "image": "http://img.test/back.jpg", "thumbnails": {} },
                {
                    "front": true,
                    "image": "http://img.test/front.jpg",
                    "thumbnails": { "large": "http://img.test/front-500.jpg" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let provider = MusicBrainzProvider::new(musicbrainz_config(&server)).unwrap();
    let url = provider
        .lookup_by_canonical_id(EntityKind::Album, "rel-1")
        .await
        .unwrap();
    assert_eq!(url.as_deref(), Some("http://img.test/front-500.jpg"));

    provider
        .lookup_by_canonical_id(EntityKind::Album, "rel-1")
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    provider.clear_cache();
    provider
        .lookup_by_canonical_id(EntityKind::Album, "rel-1")
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_release_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/release/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = MusicBrainzProvider::new(musicbrainz_config(&server)).unwrap();
    let url = provider
        .lookup_by_canonical_id(EntityKind::Album, "missing")
        .await
        .unwrap();
    assert!(url.is_none());
}

#[tokio::test]
async fn artist_image_follows_wikidata_to_commons() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/artist/art-1"))
        .and(query_param("inc", "url-rels"))
        .and(query_param("fmt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "relations": [
                { "type": "official homepage", "url": { "resource": "https://example.test" } },
                { "type": "wikidata", "url": { "resource": "https://www.wikidata.org/wiki/Q42" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wd/Q42.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entities": {
                "Q42": {
                    "claims": {
                        "P18": [
                            { "mainsnak": { "datavalue": { "value": "Douglas adams portrait.jpg" } } }
                        ]
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    let provider = MusicBrainzProvider::new(musicbrainz_config(&server)).unwrap();
    let url = provider
        .lookup_by_canonical_id(EntityKind::Artist, "art-1")
        .await
        .unwrap();
    assert_eq!(
        url,
        Some(format!(
            "{}/commons/Special:FilePath/Douglas_adams_portrait.jpg",
            server.uri()
        ))
    );
}

#[tokio::test]
async fn artist_without_wikidata_relation_has_no_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/artist/art-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "relations": [] })))
        .mount(&server)
        .await;

    let provider = MusicBrainzProvider::new(musicbrainz_config(&server)).unwrap();
    let url = provider
        .lookup_by_canonical_id(EntityKind::Artist, "art-2")
        .await
        .unwrap();
    assert!(url.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deezer_album_search_takes_largest_cover() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/album"))
        .and(query_param("q", "Artist A Album B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "cover": "https://img.test/c.jpg",
                    "cover_big": "https://img.test/big.jpg",
                    "cover_xl": "https://img.test/xl.jpg"
                },
                { "cover_xl": "https://img.test/other.jpg" }
            ]
        })))
        .mount(&server)
        .await;

    let provider = DeezerProvider::new(deezer_config(&server)).unwrap();
    let url = provider
        .lookup_by_name(&NameQuery::album("Album B", "Artist A"))
        .await
        .unwrap();
    assert_eq!(url.as_deref(), Some("https://img.test/xl.jpg"));
}

#[tokio::test]
async fn deezer_artist_search_requires_exact_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/artist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "name": "Artist AB", "picture_xl": "https://img.test/wrong.jpg" },
                { "name": "artist a", "picture_big": "https://img.test/right.jpg" }
            ]
        })))
        .mount(&server)
        .await;

    let provider = DeezerProvider::new(deezer_config(&server)).unwrap();
    let url = provider
        .lookup_by_name(&NameQuery::artist("Artist A"))
        .await
        .unwrap();
    assert_eq!(url.as_deref(), Some("https://img.test/right.jpg"));

    let none = provider
        .lookup_by_name(&NameQuery::artist("Nobody"))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn registry_skips_failing_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(DeezerProvider::new(deezer_config(&server)).unwrap()));
    let fallback = Arc::new(CountingProvider::by_name("https://img.test/fallback.jpg"));
    registry.register(fallback.clone());

    let hit = registry
        .lookup_name(&NameQuery::artist("Artist A"))
        .await
        .unwrap();
    assert_eq!(hit.provider, "counting");
    assert_eq!(hit.url, "https://img.test/fallback.jpg");
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn client_retries_after_too_many_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = RateLimitedClient::new("test", "lyrebird-test", 100).unwrap();
    let body: Option<serde_json::Value> = client
        .get_json(&format!("{}/busy", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, Some(json!({ "ok": true })));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[test]
fn registry_contains_only_enabled_providers() {
    let registry = build_registry(&ProvidersConfig::default()).unwrap();
    let names: Vec<&str> = registry.available().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["musicbrainz", "deezer"]);

    let mut config = ProvidersConfig::default();
    config.musicbrainz.enabled = false;
    config.deezer.enabled = false;
    assert!(build_registry(&config).unwrap().available().is_empty());
}
