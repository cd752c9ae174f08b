mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    normalize_extensions(&mut config.library.audio_extensions);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./lyrebird.toml",
        "./config.toml",
        "~/.config/lyrebird/config.toml",
        "/etc/lyrebird/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Lower-case extensions and strip any leading dot, dropping duplicates.
fn normalize_extensions(extensions: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    extensions.retain_mut(|ext| {
        *ext = ext.trim().trim_start_matches('.').to_lowercase();
        !ext.is_empty() && seen.insert(ext.clone())
    });
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.library.music_dirs.is_empty() {
        anyhow::bail!("At least one music directory must be configured");
    }

    for path in &config.library.music_dirs {
        if !path.exists() {
            tracing::warn!("Music directory does not exist: {:?}", path);
        }
    }

    if config.library.audio_extensions.is_empty() {
        anyhow::bail!("Audio extension list cannot be empty");
    }

    if config.scan.concurrency == 0 {
        anyhow::bail!("Scan concurrency cannot be 0");
    }

    if config.scan.thumbnail_workers == 0 {
        anyhow::bail!("Thumbnail worker count cannot be 0");
    }

    if config.artwork.thumbnail_size == 0 {
        anyhow::bail!("Thumbnail size cannot be 0");
    }

    if !(1..=100).contains(&config.artwork.jpeg_quality) {
        anyhow::bail!(
            "JPEG quality must be between 1 and 100, got {}",
            config.artwork.jpeg_quality
        );
    }

    for name in [&config.artwork.album_image, &config.artwork.artist_image] {
        if lyrebird_common::paths::entity_image_name(name).is_none() {
            anyhow::bail!("Artwork filename must be a plain file name: {:?}", name);
        }
    }

    let providers = &config.providers;
    if providers.musicbrainz.enabled && providers.musicbrainz.requests_per_second == 0 {
        anyhow::bail!("MusicBrainz is enabled but requests_per_second is 0");
    }
    if providers.deezer.enabled && providers.deezer.requests_per_second == 0 {
        anyhow::bail!("Deezer is enabled but requests_per_second is 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scan.concurrency, 8);
        assert_eq!(config.artwork.thumbnail_size, 512);
        assert_eq!(config.artwork.jpeg_quality, 90);
        assert_eq!(config.artwork.album_image, "folder.jpg");
        assert!(config.library.audio_extensions.contains(&"flac".to_string()));
        assert_eq!(
            config.data.database_path(),
            std::path::PathBuf::from("./data/lyrebird.db")
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
[library]
music_dirs = ["/srv/music"]
audio_extensions = [".MP3", "flac", "mp3"]

[providers.deezer]
enabled = false
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.library.audio_extensions, vec!["mp3", "flac"]);
        assert!(!config.providers.deezer.enabled);
        assert!(config.providers.musicbrainz.enabled);
        assert_eq!(config.providers.deezer.base_url, "https://api.deezer.com");
        assert_eq!(config.scan.thumbnail_workers, 2);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let file = write_config("[scan]\nconcurrency = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_quality() {
        let file = write_config("[artwork]\njpeg_quality = 101\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_empty_music_dirs() {
        let file = write_config("[library]\nmusic_dirs = []\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_path_like_image_name() {
        let file = write_config("[artwork]\nalbum_image = \"../cover.jpg\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("[library\n");
        assert!(load_config(file.path()).is_err());
    }
}
