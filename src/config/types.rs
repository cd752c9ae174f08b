use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub artwork: ArtworkConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root directories that are synchronized into the catalog.
    #[serde(default = "default_music_dirs")]
    pub music_dirs: Vec<PathBuf>,

    /// Lower-case audio extensions without the leading dot.
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,

    #[serde(default = "default_follow_links")]
    pub follow_links: bool,
}

fn default_music_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("./music")]
}

fn default_audio_extensions() -> Vec<String> {
    lyrebird_common::paths::audio_extensions()
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_follow_links() -> bool {
    true
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_dirs: default_music_dirs(),
            audio_extensions: default_audio_extensions(),
            follow_links: default_follow_links(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("lyrebird.db")
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.data_dir.join("artwork")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Maximum number of extractions or artwork resolutions in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of background thumbnail workers.
    #[serde(default = "default_thumbnail_workers")]
    pub thumbnail_workers: usize,
}

fn default_concurrency() -> usize {
    8
}

fn default_thumbnail_workers() -> usize {
    2
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            thumbnail_workers: default_thumbnail_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtworkConfig {
    /// Bounding box, in pixels, of derived thumbnails.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Convention filename looked up in album directories.
    #[serde(default = "default_album_image")]
    pub album_image: String,

    /// Convention filename looked up in artist directories.
    #[serde(default = "default_artist_image")]
    pub artist_image: String,
}

fn default_thumbnail_size() -> u32 {
    512
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_album_image() -> String {
    lyrebird_common::paths::ALBUM_IMAGE_NAME.to_string()
}

fn default_artist_image() -> String {
    lyrebird_common::paths::ARTIST_IMAGE_NAME.to_string()
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: default_thumbnail_size(),
            jpeg_quality: default_jpeg_quality(),
            album_image: default_album_image(),
            artist_image: default_artist_image(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub musicbrainz: MusicBrainzConfig,

    #[serde(default)]
    pub deezer: DeezerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MusicBrainzConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_musicbrainz_url")]
    pub base_url: String,

    #[serde(default = "default_cover_art_url")]
    pub cover_art_url: String,

    #[serde(default = "default_wikidata_url")]
    pub wikidata_url: String,

    #[serde(default = "default_commons_url")]
    pub commons_url: String,

    /// MusicBrainz rejects anonymous clients, so a contactable agent is required.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_musicbrainz_rate")]
    pub requests_per_second: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_musicbrainz_url() -> String {
    "https://musicbrainz.org/ws/2".to_string()
}

fn default_cover_art_url() -> String {
    "https://coverartarchive.org".to_string()
}

fn default_wikidata_url() -> String {
    "https://www.wikidata.org/wiki/Special:EntityData".to_string()
}

fn default_commons_url() -> String {
    "https://commons.wikimedia.org/wiki/Special:FilePath".to_string()
}

fn default_user_agent() -> String {
    format!(
        "lyrebird/{} ( https://github.com/lyrebird/lyrebird )",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_musicbrainz_rate() -> u32 {
    1
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_musicbrainz_url(),
            cover_art_url: default_cover_art_url(),
            wikidata_url: default_wikidata_url(),
            commons_url: default_commons_url(),
            user_agent: default_user_agent(),
            requests_per_second: default_musicbrainz_rate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeezerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_deezer_url")]
    pub base_url: String,

    #[serde(default = "default_deezer_rate")]
    pub requests_per_second: u32,
}

fn default_deezer_url() -> String {
    "https://api.deezer.com".to_string()
}

fn default_deezer_rate() -> u32 {
    4
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_deezer_url(),
            requests_per_second: default_deezer_rate(),
        }
    }
}
