//! Artwork resolution cascade for one album or artist.
//!
//! | local image | record                   | action            |
//! |-------------|--------------------------|-------------------|
//! | found       | freshness >= local time  | keep              |
//! | found       | freshness < local time   | re-import local   |
//! | found       | none                     | import local      |
//! | none        | exists                   | keep              |
//! | none        | none                     | remote cascade    |
//!
//! The remote cascade tries embedded art (albums only), then the canonical
//! registry, then a name search. The first usable image wins.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lyrebird_common::{ArtworkSource, EntityKey, EntityKind, Error, Result};
use lyrebird_db::models::ArtworkRecord;
use lyrebird_db::pool::{get_conn, DbPool};
use lyrebird_db::queries::{artwork, metadata};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::local::{find_local_image, LocalImage};
use super::storage::ArtworkStorage;
use super::thumbnail::{ThumbnailJob, ThumbnailPool};
use crate::config::Config;
use crate::extract::MetadataExtractor;
use crate::providers::http::{download_client, fetch_image, USER_AGENT};
use crate::providers::{NameQuery, ProviderHit, ProviderRegistry};

/// Provider label recorded for images pulled out of the audio files.
const EMBEDDED_PROVIDER: &str = "embedded";

/// Everything the cascade knows about one entity, loaded from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkTarget {
    pub kind: EntityKind,
    pub id: String,
    pub display_name: String,
    /// Album artist, for albums.
    pub artist_name: Option<String>,
    /// Candidate directories for a local image, in search order.
    pub directories: Vec<PathBuf>,
    /// A track to pull embedded art from, for albums.
    pub sample_track: Option<PathBuf>,
}

impl ArtworkTarget {
    /// Build the target for `key`, or `None` if no track references it.
    pub fn load(conn: &Connection, key: &EntityKey) -> Result<Option<Self>> {
        match key {
            EntityKey::Album(album_id) => {
                let tracks = metadata::tracks_for_album(conn, album_id)?;
                let Some(first) = tracks.first() else {
                    return Ok(None);
                };
                let (album, artist) = metadata::album_names(conn, album_id)?
                    .unwrap_or_else(|| (first.album.clone(), first.display_album_artist().to_string()));
                let directories = metadata::album_directories(conn, album_id)?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect();

                Ok(Some(Self {
                    kind: EntityKind::Album,
                    id: album_id.to_string(),
                    display_name: album,
                    artist_name: Some(artist).filter(|a| !a.is_empty()),
                    directories,
                    sample_track: Some(PathBuf::from(&first.file_path)),
                }))
            }
            EntityKey::Artist(artist_id) => {
                let Some(name) = metadata::artist_name(conn, artist_id)? else {
                    return Ok(None);
                };
                let directories = metadata::artist_directories(conn, artist_id)?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect();

                Ok(Some(Self {
                    kind: EntityKind::Artist,
                    id: artist_id.to_string(),
                    display_name: name,
                    artist_name: None,
                    directories,
                    sample_track: None,
                }))
            }
        }
    }
}

/// What the decision table says to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Import(LocalImage),
    Reimport(LocalImage),
    FetchRemote,
}

pub fn decide(local: Option<LocalImage>, record: Option<&ArtworkRecord>) -> Decision {
    match (local, record) {
        (Some(local), Some(record)) if record.freshness >= local.modified => Decision::Keep,
        (Some(local), Some(_)) => Decision::Reimport(local),
        (Some(local), None) => Decision::Import(local),
        (None, Some(_)) => Decision::Keep,
        (None, None) => Decision::FetchRemote,
    }
}

/// Result of resolving one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkOutcome {
    Unchanged,
    ImportedLocal,
    ReimportedLocal,
    Fetched {
        source: ArtworkSource,
        provider: String,
    },
    NotFound,
}

impl ArtworkOutcome {
    /// Whether a new image was stored.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Self::ImportedLocal | Self::ReimportedLocal | Self::Fetched { .. }
        )
    }

    /// Where the newly stored image came from.
    pub fn source(&self) -> Option<ArtworkSource> {
        match self {
            Self::ImportedLocal | Self::ReimportedLocal => Some(ArtworkSource::Local),
            Self::Fetched { source, .. } => Some(*source),
            Self::Unchanged | Self::NotFound => None,
        }
    }
}

/// Runs the cascade against the store, the filesystem and the providers.
pub struct ArtworkResolver {
    pool: DbPool,
    storage: ArtworkStorage,
    thumbnails: ThumbnailPool,
    providers: Arc<ProviderRegistry>,
    extractor: Arc<dyn MetadataExtractor>,
    download: reqwest::Client,
    album_image: String,
    artist_image: String,
}

impl ArtworkResolver {
    /// Must be called from within a Tokio runtime; the thumbnail workers are
    /// spawned here.
    pub fn new(
        config: &Config,
        pool: DbPool,
        providers: Arc<ProviderRegistry>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> anyhow::Result<Self> {
        let storage = ArtworkStorage::new(config.data.artwork_dir(), config.artwork.jpeg_quality);
        let thumbnails = ThumbnailPool::new(
            config.scan.thumbnail_workers,
            config.artwork.thumbnail_size,
            config.artwork.jpeg_quality,
        );

        Ok(Self {
            pool,
            storage,
            thumbnails,
            providers,
            extractor,
            download: download_client(USER_AGENT)?,
            album_image: config.artwork.album_image.clone(),
            artist_image: config.artwork.artist_image.clone(),
        })
    }

    pub fn storage(&self) -> &ArtworkStorage {
        &self.storage
    }

    pub fn thumbnails(&self) -> &ThumbnailPool {
        &self.thumbnails
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Resolve artwork for one entity.
    ///
    /// Only persistence errors are returned; everything else is logged and
    /// reported as [`ArtworkOutcome::NotFound`] so a future run retries.
    pub async fn resolve(&self, key: &EntityKey) -> Result<ArtworkOutcome> {
        match self.resolve_inner(key).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_persistence() => Err(e),
            Err(e) => {
                warn!(entity = %key, error = %e, "Artwork resolution failed");
                Ok(ArtworkOutcome::NotFound)
            }
        }
    }

    async fn resolve_inner(&self, key: &EntityKey) -> Result<ArtworkOutcome> {
        let (target, record) = {
            let conn = get_conn(&self.pool)?;
            let target = ArtworkTarget::load(&conn, key)?;
            let record = artwork::get_record(&conn, key.kind(), key.id())?;
            (target, record)
        };

        let Some(target) = target else {
            debug!(entity = %key, "No tracks reference entity");
            return Ok(ArtworkOutcome::NotFound);
        };

        let convention = match target.kind {
            EntityKind::Album => &self.album_image,
            EntityKind::Artist => &self.artist_image,
        };
        let local = find_local_image(&target.directories, convention, &target.display_name);

        match decide(local, record.as_ref()) {
            Decision::Keep => {
                debug!(entity = %key, "Artwork is current");
                Ok(ArtworkOutcome::Unchanged)
            }
            Decision::Import(local) => {
                self.import_local(&target, &local, ArtworkOutcome::ImportedLocal)
                    .await
            }
            Decision::Reimport(local) => {
                self.import_local(&target, &local, ArtworkOutcome::ReimportedLocal)
                    .await
            }
            Decision::FetchRemote => self.fetch_remote(&target).await,
        }
    }

    async fn import_local(
        &self,
        target: &ArtworkTarget,
        local: &LocalImage,
        outcome: ArtworkOutcome,
    ) -> Result<ArtworkOutcome> {
        let bytes = tokio::fs::read(&local.path).await?;
        if image::guess_format(&bytes).is_err() {
            return Err(Error::invalid_input(format!(
                "not an image: {}",
                local.path.display()
            )));
        }

        // A local file stamped in the future must not leave the record
        // looking stale on every later run.
        let freshness = Utc::now().max(local.modified);
        if self.commit(target, &bytes, ArtworkSource::Local, freshness)? {
            info!(entity = %target.id, kind = %target.kind, path = %local.path.display(), "Imported local artwork");
            Ok(outcome)
        } else {
            Ok(ArtworkOutcome::Unchanged)
        }
    }

    async fn fetch_remote(&self, target: &ArtworkTarget) -> Result<ArtworkOutcome> {
        if let (EntityKind::Album, Some(track)) = (target.kind, &target.sample_track) {
            match self.extractor.embedded_artwork(track).await {
                Ok(Some(bytes)) if image::guess_format(&bytes).is_ok() => {
                    return self.store_fetched(target, &bytes, ArtworkSource::Embedded, EMBEDDED_PROVIDER);
                }
                Ok(_) => debug!(track = %track.display(), "No embedded artwork"),
                Err(e) => warn!(track = %track.display(), error = %e, "Embedded artwork extraction failed"),
            }
        }

        if let Some(hit) = self.providers.lookup_canonical(target.kind, &target.id).await {
            if let Some(bytes) = self.download(&hit).await {
                return self.store_fetched(target, &bytes, ArtworkSource::Registry, hit.provider);
            }
        }

        let query = match target.kind {
            EntityKind::Album => target
                .artist_name
                .as_deref()
                .map(|artist| NameQuery::album(&target.display_name, artist)),
            EntityKind::Artist => Some(NameQuery::artist(&target.display_name)),
        };
        if let Some(query) = query {
            if let Some(hit) = self.providers.lookup_name(&query).await {
                if let Some(bytes) = self.download(&hit).await {
                    return self.store_fetched(target, &bytes, ArtworkSource::NameSearch, hit.provider);
                }
            }
        }

        debug!(entity = %target.id, kind = %target.kind, "No artwork source found");
        Ok(ArtworkOutcome::NotFound)
    }

    async fn download(&self, hit: &ProviderHit) -> Option<Vec<u8>> {
        match fetch_image(&self.download, &hit.url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(provider = hit.provider, url = %hit.url, error = %e, "Artwork download failed");
                None
            }
        }
    }

    fn store_fetched(
        &self,
        target: &ArtworkTarget,
        bytes: &[u8],
        source: ArtworkSource,
        provider: &str,
    ) -> Result<ArtworkOutcome> {
        if self.commit(target, bytes, source, Utc::now())? {
            info!(entity = %target.id, kind = %target.kind, %source, provider, "Fetched artwork");
            Ok(ArtworkOutcome::Fetched {
                source,
                provider: provider.to_string(),
            })
        } else {
            Ok(ArtworkOutcome::Unchanged)
        }
    }

    /// Stage the source, write the record, then put the source in place and
    /// queue the thumbnail.
    ///
    /// The record lands before the thumbnail so a duplicate trigger sees the
    /// entity as resolved. When the stored record is already newer the staged
    /// bytes are discarded and the current source stays.
    fn commit(
        &self,
        target: &ArtworkTarget,
        bytes: &[u8],
        source: ArtworkSource,
        freshness: DateTime<Utc>,
    ) -> Result<bool> {
        let staged = self.storage.stage_source(target.kind, &target.id, bytes)?;
        let image_path = self.storage.image_path(target.kind, &target.id)?;

        let record = ArtworkRecord {
            kind: target.kind,
            entity_id: target.id.clone(),
            image_path: image_path.to_string_lossy().to_string(),
            source,
            freshness,
        };
        let written = {
            let conn = get_conn(&self.pool)?;
            artwork::upsert_record(&conn, &record)?
        };

        if written {
            self.thumbnails.submit(ThumbnailJob {
                source: staged.persist()?,
                target: image_path,
            });
        } else {
            debug!(entity = %target.id, "Stored artwork is already newer");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lyrebird_common::{AlbumId, ArtistId};
    use lyrebird_db::models::CatalogEntry;
    use lyrebird_db::pool::init_memory_pool;
    use lyrebird_db::queries::library;
    use std::path::Path;

    use crate::extract::tags::{normalize, RawTags, Technical};

    fn local_at(modified: DateTime<Utc>) -> LocalImage {
        LocalImage {
            path: PathBuf::from("/music/a/folder.jpg"),
            modified,
        }
    }

    fn record_at(freshness: DateTime<Utc>) -> ArtworkRecord {
        ArtworkRecord {
            kind: EntityKind::Album,
            entity_id: "al".into(),
            image_path: "/data/artwork/album/al.jpg".into(),
            source: ArtworkSource::Local,
            freshness,
        }
    }

    #[test]
    fn test_decision_table() {
        let now = Utc::now();
        let older = now - Duration::seconds(10);

        assert_eq!(decide(Some(local_at(older)), Some(&record_at(now))), Decision::Keep);
        assert_eq!(decide(Some(local_at(now)), Some(&record_at(now))), Decision::Keep);
        assert_eq!(
            decide(Some(local_at(now)), Some(&record_at(older))),
            Decision::Reimport(local_at(now))
        );
        assert_eq!(decide(Some(local_at(now)), None), Decision::Import(local_at(now)));
        assert_eq!(decide(None, Some(&record_at(now))), Decision::Keep);
        assert_eq!(decide(None, None), Decision::FetchRemote);
    }

    #[test]
    fn test_outcome_updates() {
        assert!(ArtworkOutcome::ImportedLocal.is_update());
        assert!(ArtworkOutcome::Fetched {
            source: ArtworkSource::Registry,
            provider: "musicbrainz".into()
        }
        .is_update());
        assert!(!ArtworkOutcome::Unchanged.is_update());
        assert!(!ArtworkOutcome::NotFound.is_update());
    }

    fn insert_track(conn: &Connection, path: &str, dir: &str, title: &str) {
        let now = Utc::now();
        let entry = CatalogEntry {
            file_path: path.to_string(),
            dir_path: dir.to_string(),
            modified_at: now,
            first_seen_at: now,
        };
        let tags = RawTags::from_pairs([
            ("title", title),
            ("artist", "Artist A"),
            ("album", "Album B"),
            ("musicbrainz_trackid", title),
            ("musicbrainz_albumid", "album-1"),
            ("musicbrainz_artistid", "artist-1"),
        ]);
        let track = normalize(Path::new(path), &tags, Technical::default()).unwrap();
        library::apply_track(conn, &entry, &track, now).unwrap();
    }

    #[test]
    fn test_album_target_from_store() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_track(&conn, "/music/Artist A/Album B/01.mp3", "/music/Artist A/Album B", "One");
        insert_track(&conn, "/music/Artist A/Album B/02.mp3", "/music/Artist A/Album B", "Two");

        let key = EntityKey::Album(AlbumId::parse("album-1").unwrap());
        let target = ArtworkTarget::load(&conn, &key).unwrap().unwrap();
        assert_eq!(target.kind, EntityKind::Album);
        assert_eq!(target.display_name, "Album B");
        assert_eq!(target.artist_name.as_deref(), Some("Artist A"));
        assert_eq!(target.directories, vec![PathBuf::from("/music/Artist A/Album B")]);
        assert!(target.sample_track.is_some());
    }

    #[test]
    fn test_artist_target_uses_parent_directories() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_track(&conn, "/music/Artist A/Album B/01.mp3", "/music/Artist A/Album B", "One");

        let key = EntityKey::Artist(ArtistId::parse("artist-1").unwrap());
        let target = ArtworkTarget::load(&conn, &key).unwrap().unwrap();
        assert_eq!(target.display_name, "Artist A");
        assert_eq!(target.directories, vec![PathBuf::from("/music/Artist A")]);
        assert!(target.sample_track.is_none());
    }

    #[test]
    fn test_unknown_entity_has_no_target() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let key = EntityKey::Album(AlbumId::parse("nobody").unwrap());
        assert!(ArtworkTarget::load(&conn, &key).unwrap().is_none());
    }
}
