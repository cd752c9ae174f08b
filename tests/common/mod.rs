//! Shared test harness for integration tests.
//!
//! Provides [`TestLibrary`], which lays out a music root and a data
//! directory under temp dirs, points a [`Config`] at them and opens a
//! file-backed pool. Audio files are plain `key=value` text read back by
//! [`KeyValueExtractor`], so no external tools are needed.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use lyrebird::config::Config;
use lyrebird::events::EventBus;
use lyrebird::extract::tags::{normalize, RawTags, Technical};
use lyrebird::extract::{ExtractError, MetadataExtractor};
use lyrebird::providers::{ArtworkProvider, NameQuery, ProviderRegistry};
use lyrebird::sync::LibrarySync;
use lyrebird_common::EntityKind;
use lyrebird_db::models::TrackMetadata;
use lyrebird_db::pool::{get_conn, init_pool, DbPool, PooledConnection};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tag line that makes [`KeyValueExtractor`] report embedded cover art.
pub const EMBEDDED_ART: &str = "embedded_art";

/// A temporary library with its own catalog database.
pub struct TestLibrary {
    _music: TempDir,
    _data: TempDir,
    pub root: PathBuf,
    pub config: Config,
    pub pool: DbPool,
}

impl TestLibrary {
    pub fn new() -> Self {
        let music = tempfile::tempdir().expect("failed to create music dir");
        let data = tempfile::tempdir().expect("failed to create data dir");
        let root = music.path().canonicalize().expect("failed to canonicalize root");

        let mut config = Config::default();
        config.library.music_dirs = vec![root.clone()];
        config.data.data_dir = data.path().to_path_buf();
        config.scan.concurrency = 4;
        config.scan.thumbnail_workers = 2;
        config.artwork.thumbnail_size = 64;
        config.providers.musicbrainz.enabled = false;
        config.providers.deezer.enabled = false;

        let db_path = config.data.database_path();
        let pool = init_pool(&db_path.to_string_lossy()).expect("failed to open database");

        Self {
            _music: music,
            _data: data,
            root,
            config,
            pool,
        }
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.pool).expect("failed to get db connection")
    }

    /// Path under the music root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a track file tagged for `album_id` and `artist_id`.
    pub fn add_track(&self, rel: &str, spec: &TrackSpec<'_>) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().expect("track has a parent"))
            .expect("failed to create album dir");
        std::fs::write(&path, spec.render()).expect("failed to write track");
        path
    }

    /// Write a JPEG under the music root.
    pub fn add_image(&self, rel: &str, width: u32, height: u32) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().expect("image has a parent"))
            .expect("failed to create image dir");
        std::fs::write(&path, jpeg(width, height)).expect("failed to write image");
        path
    }

    /// Build a synchronizer over this library. Must run inside a runtime.
    pub fn sync(&self, providers: ProviderRegistry) -> Arc<LibrarySync> {
        self.sync_with(providers, Arc::new(KeyValueExtractor::default()))
    }

    pub fn sync_with(
        &self,
        providers: ProviderRegistry,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Arc<LibrarySync> {
        Arc::new(
            LibrarySync::new(
                self.config.clone(),
                self.pool.clone(),
                extractor,
                Arc::new(providers),
                Arc::new(EventBus::default()),
            )
            .expect("failed to build synchronizer"),
        )
    }
}

/// Tags for one test track.
#[derive(Debug, Clone)]
pub struct TrackSpec<'a> {
    pub track_id: &'a str,
    pub album_id: &'a str,
    pub artist_id: &'a str,
    pub title: &'a str,
    pub album: &'a str,
    pub artist: &'a str,
    pub genre: &'a str,
    pub embedded_art: bool,
}

impl<'a> TrackSpec<'a> {
    pub fn new(track_id: &'a str, album_id: &'a str, artist_id: &'a str) -> Self {
        Self {
            track_id,
            album_id,
            artist_id,
            title: track_id,
            album: "Album B",
            artist: "Artist A",
            genre: "Rock",
            embedded_art: false,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn genre(mut self, genre: &'a str) -> Self {
        self.genre = genre;
        self
    }

    pub fn with_embedded_art(mut self) -> Self {
        self.embedded_art = true;
        self
    }

    fn render(&self) -> String {
        let mut lines = vec![
            format!("musicbrainz_trackid={}", self.track_id),
            format!("musicbrainz_albumid={}", self.album_id),
            format!("musicbrainz_artistid={}", self.artist_id),
            format!("title={}", self.title),
            format!("album={}", self.album),
            format!("artist={}", self.artist),
            format!("genre={}", self.genre),
        ];
        if self.embedded_art {
            lines.push(format!("{EMBEDDED_ART}=1"));
        }
        lines.join("\n")
    }
}

/// Reads `key=value` lines as tags.
#[derive(Debug, Default)]
pub struct KeyValueExtractor {
    pub extractions: AtomicUsize,
    pub embedded_requests: AtomicUsize,
}

impl KeyValueExtractor {
    async fn read_tags(path: &Path) -> Result<RawTags, ExtractError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExtractError::ToolFailed {
                tool: "test-reader",
                message: e.to_string(),
            })?;
        Ok(RawTags::from_pairs(
            text.lines().filter_map(|line| line.split_once('=')),
        ))
    }
}

#[async_trait]
impl MetadataExtractor for KeyValueExtractor {
    async fn extract(&self, path: &Path) -> Result<TrackMetadata, ExtractError> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        let tags = Self::read_tags(path).await?;
        normalize(path, &tags, Technical::default())
    }

    async fn embedded_artwork(&self, path: &Path) -> Result<Option<Vec<u8>>, ExtractError> {
        self.embedded_requests.fetch_add(1, Ordering::SeqCst);
        let tags = Self::read_tags(path).await?;
        Ok(tags.first(&[EMBEDDED_ART]).map(|_| jpeg(40, 40)))
    }
}

/// Provider answering with fixed URLs and counting its lookups.
pub struct CountingProvider {
    pub url: Option<String>,
    pub by_name: Option<String>,
    pub canonical_calls: AtomicUsize,
    pub name_calls: AtomicUsize,
    pub delay: Duration,
}

impl CountingProvider {
    /// Provider that never has an image.
    pub fn empty() -> Self {
        Self {
            url: None,
            by_name: None,
            canonical_calls: AtomicUsize::new(0),
            name_calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn canonical(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::empty()
        }
    }

    pub fn by_name(url: impl Into<String>) -> Self {
        Self {
            by_name: Some(url.into()),
            ..Self::empty()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.canonical_calls.load(Ordering::SeqCst) + self.name_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn lookup_by_canonical_id(
        &self,
        _kind: EntityKind,
        _id: &str,
    ) -> anyhow::Result<Option<String>> {
        self.canonical_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.url.clone())
    }

    async fn lookup_by_name(&self, _query: &NameQuery<'_>) -> anyhow::Result<Option<String>> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_name.clone())
    }
}

/// Registry holding a single shared provider.
pub fn registry_with(provider: Arc<dyn ArtworkProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    registry
}

/// Encode a solid-color JPEG.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("failed to encode jpeg");
    buf.into_inner()
}

/// Serve a JPEG at `/cover.jpg` and return its URL.
pub async fn image_server(width: u32, height: u32) -> (MockServer, String) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cover.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(jpeg(width, height)),
        )
        .mount(&server)
        .await;
    let url = format!("{}/cover.jpg", server.uri());
    (server, url)
}

/// Set a file's mtime relative to now.
pub fn set_modified_offset(path: &Path, offset: Duration) {
    let when = SystemTime::now() + offset;
    std::fs::File::options()
        .write(true)
        .open(path)
        .expect("failed to open file")
        .set_modified(when)
        .expect("failed to set mtime");
}

/// Decoded dimensions of an image file.
pub fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).expect("failed to read image dimensions")
}
