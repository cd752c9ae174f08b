//! Synchronization orchestrator.
//!
//! One run walks the music roots, extracts metadata for new and changed
//! files, resolves artwork once per touched album and artist, sweeps catalog
//! entries whose files vanished and records the outcome.
//!
//! ```text
//! Idle --try_acquire--> Running --> Completed
//!                              \--> Failed (fatal error or cancellation)
//! ```

pub mod dedup;
pub mod lock;
pub mod status;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use lyrebird_common::{EntityKey, ScanState};
use lyrebird_db::models::{CatalogEntry, TrackMetadata};
use lyrebird_db::pool::{get_conn, DbPool};
use lyrebird_db::queries::{artwork, catalog, indexes, library, metadata, scans};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artwork::{ArtworkOutcome, ArtworkResolver};
use crate::config::Config;
use crate::events::{EventBus, SyncEvent};
use crate::extract::{ExtractError, MetadataExtractor};
use crate::providers::ProviderRegistry;
use crate::scanner::walker::{classify, walk_roots, WalkError, WalkItem, WalkOptions};

pub use dedup::DedupSet;
pub use lock::{RunGuard, RunLock};
pub use status::{LiveRun, ScanStatus};

/// Emit a progress event every this many applied files.
const PROGRESS_INTERVAL: u64 = 100;

/// Walk items buffered between the walker thread and the consumer.
const WALK_BUFFER: usize = 1024;

/// Error recorded for a run stopped through its cancellation token.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Why a run did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("a scan is already running")]
    AlreadyRunning(ScanStatus),

    #[error("scan failed: {0}")]
    Fatal(String),

    #[error("scan cancelled")]
    Cancelled,
}

impl From<lyrebird_common::Error> for SyncError {
    fn from(e: lyrebird_common::Error) -> Self {
        Self::Fatal(e.to_string())
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub run_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Audio files observed on disk.
    pub files_seen: u64,
    /// Files whose metadata was applied.
    pub files_processed: u64,
    pub folders_processed: u64,
    /// Files that could not be read or extracted.
    pub files_skipped: u64,
    /// Catalog entries swept because their file vanished.
    pub removed: u64,
    /// Entities that received new artwork.
    pub artwork_updated: u64,
}

/// Counters gathered while a pass runs.
#[derive(Debug, Default)]
struct PassCounts {
    files_seen: u64,
    files_skipped: u64,
    removed: u64,
    artwork_updated: u64,
}

type Extraction = (PathBuf, DateTime<Utc>, Result<TrackMetadata, ExtractError>);

/// The library synchronizer.
pub struct LibrarySync {
    config: Config,
    pool: DbPool,
    extractor: Arc<dyn MetadataExtractor>,
    resolver: ArtworkResolver,
    events: Arc<EventBus>,
    lock: RunLock,
    dedup: DedupSet,
}

impl LibrarySync {
    /// Build the synchronizer.
    ///
    /// Any run left `running` by a previous process is marked failed first.
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: Config,
        pool: DbPool,
        extractor: Arc<dyn MetadataExtractor>,
        providers: Arc<ProviderRegistry>,
        events: Arc<EventBus>,
    ) -> anyhow::Result<Self> {
        {
            let conn = get_conn(&pool)?;
            let recovered = scans::fail_orphaned_runs(&conn, Utc::now())?;
            if recovered > 0 {
                warn!(recovered, "Marked interrupted scan runs as failed");
            }
        }

        let resolver = ArtworkResolver::new(&config, pool.clone(), providers, Arc::clone(&extractor))?;

        Ok(Self {
            config,
            pool,
            extractor,
            resolver,
            events,
            lock: RunLock::new(),
            dedup: DedupSet::new(),
        })
    }

    pub fn resolver(&self) -> &ArtworkResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current run status, or the last finished run when idle.
    pub fn status(&self) -> lyrebird_common::Result<ScanStatus> {
        if let Some(status) = self.lock.current() {
            return Ok(status);
        }
        let conn = get_conn(&self.pool)?;
        Ok(scans::latest_run(&conn)?
            .map(|run| ScanStatus::from_run(&run))
            .unwrap_or_else(ScanStatus::idle))
    }

    /// Run one synchronization to completion.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ScanReport, SyncError> {
        let guard = self
            .lock
            .try_acquire(Utc::now())
            .map_err(SyncError::AlreadyRunning)?;
        self.execute(guard, cancel).await
    }

    /// Start a run in the background and return its initial status.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Result<ScanStatus, SyncError> {
        let guard = self
            .lock
            .try_acquire(Utc::now())
            .map_err(SyncError::AlreadyRunning)?;
        let status = guard.live().status();

        tokio::spawn(async move {
            if let Err(e) = self.execute(guard, cancel).await {
                warn!(error = %e, "Background scan did not complete");
            }
        });
        Ok(status)
    }

    /// Resolve artwork for `key` unless it was already claimed in this run.
    ///
    /// Returns `Ok(None)` for the losers of a concurrent claim.
    pub async fn resolve_artwork_once(
        &self,
        key: &EntityKey,
    ) -> lyrebird_common::Result<Option<ArtworkOutcome>> {
        if !self.dedup.claim(key) {
            debug!(entity = %key, "Artwork already resolved in this run");
            return Ok(None);
        }

        let outcome = self.resolver.resolve(key).await?;
        if let Some(source) = outcome.source() {
            self.events.broadcast(SyncEvent::ArtworkUpdated {
                kind: key.kind(),
                entity_id: key.id().to_string(),
                source,
            });
        }
        Ok(Some(outcome))
    }

    async fn execute(&self, guard: RunGuard, cancel: CancellationToken) -> Result<ScanReport, SyncError> {
        let live = Arc::clone(guard.live());
        self.dedup.clear();

        let run = {
            let conn = get_conn(&self.pool)?;
            scans::insert_run(&conn, live.started_at())?
        };
        self.events.broadcast(SyncEvent::ScanStarted { run_id: run.id });
        info!(
            run_id = run.id,
            roots = ?self.config.library.music_dirs,
            "Starting library scan"
        );

        let mut counts = PassCounts::default();
        let result = self.pass(run.id, &live, &cancel, &mut counts).await;

        let files = live.files_processed();
        let folders = live.folders_processed();
        let completed_at = Utc::now();

        let (state, error) = match &result {
            Ok(()) => (ScanState::Completed, None),
            Err(SyncError::Cancelled) => (ScanState::Failed, Some(CANCELLED_ERROR.to_string())),
            Err(e) => (ScanState::Failed, Some(e.to_string())),
        };

        {
            let conn = get_conn(&self.pool)?;
            scans::finish_run(&conn, run.id, state, files, folders, completed_at, error.as_deref())?;
        }

        match result {
            Ok(()) => {
                info!(
                    run_id = run.id,
                    files_seen = counts.files_seen,
                    files_processed = files,
                    folders_processed = folders,
                    skipped = counts.files_skipped,
                    removed = counts.removed,
                    artwork_updated = counts.artwork_updated,
                    "Library scan complete"
                );
                self.events.broadcast(SyncEvent::ScanCompleted {
                    run_id: run.id,
                    files_processed: files,
                    folders_processed: folders,
                    removed: counts.removed,
                });
                Ok(ScanReport {
                    run_id: run.id,
                    started_at: live.started_at(),
                    completed_at,
                    files_seen: counts.files_seen,
                    files_processed: files,
                    folders_processed: folders,
                    files_skipped: counts.files_skipped,
                    removed: counts.removed,
                    artwork_updated: counts.artwork_updated,
                })
            }
            Err(e) => {
                warn!(run_id = run.id, error = %e, files_processed = files, "Library scan failed");
                self.events.broadcast(SyncEvent::ScanFailed {
                    run_id: run.id,
                    error: error.unwrap_or_default(),
                });
                Err(e)
            }
        }
    }

    async fn pass(
        &self,
        run_id: i64,
        live: &LiveRun,
        cancel: &CancellationToken,
        counts: &mut PassCounts,
    ) -> Result<(), SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let snapshot = {
            let conn = get_conn(&self.pool)?;
            catalog::all_signals(&conn)?
        };

        let mut touched = BTreeSet::new();
        let observed = self
            .walk_and_extract(run_id, live, cancel, &snapshot, &mut touched, counts)
            .await?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        self.resolve_touched(touched, cancel, counts).await?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        counts.removed = self.sweep(&observed)?;

        if live.files_processed() > 0 || counts.removed > 0 {
            let conn = get_conn(&self.pool)?;
            indexes::rebuild_genre_counts(&conn)?;
            self.resolver.providers().clear_caches();
        }
        Ok(())
    }

    /// Stream the walk through classification and bounded extraction.
    /// Returns every observed path.
    async fn walk_and_extract(
        &self,
        run_id: i64,
        live: &LiveRun,
        cancel: &CancellationToken,
        snapshot: &HashMap<String, DateTime<Utc>>,
        touched: &mut BTreeSet<EntityKey>,
        counts: &mut PassCounts,
    ) -> Result<HashSet<String>, SyncError> {
        let roots: Vec<PathBuf> = self
            .config
            .library
            .music_dirs
            .iter()
            .map(|root| root.canonicalize().unwrap_or_else(|_| root.clone()))
            .collect();
        let options = WalkOptions {
            extensions: self.config.library.audio_extensions.clone(),
            follow_links: self.config.library.follow_links,
            image_names: vec![
                self.config.artwork.album_image.clone(),
                self.config.artwork.artist_image.clone(),
            ],
        };

        let (tx, mut rx) = mpsc::channel::<WalkItem>(WALK_BUFFER);
        let walk_cancel = cancel.clone();
        let walker = tokio::task::spawn_blocking(move || {
            walk_roots(&roots, &options, |item| {
                if walk_cancel.is_cancelled() || tx.blocking_send(item).is_err() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
        });

        let semaphore = Arc::new(Semaphore::new(self.config.scan.concurrency));
        let mut tasks: JoinSet<Extraction> = JoinSet::new();
        let mut observed = HashSet::new();
        let mut images = Vec::new();

        while let Some(item) = rx.recv().await {
            match item {
                WalkItem::Observed { path, signal } => {
                    counts.files_seen += 1;
                    let key = path.to_string_lossy().to_string();
                    let change = classify(snapshot.get(&key).copied(), signal);
                    observed.insert(key);

                    if !change.needs_processing() {
                        continue;
                    }
                    debug!(path = %path.display(), ?change, "Queued for extraction");

                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|e| SyncError::Fatal(e.to_string()))?;
                    let extractor = Arc::clone(&self.extractor);
                    tasks.spawn(async move {
                        let _permit = permit;
                        let result = extractor.extract(&path).await;
                        (path, signal, result)
                    });

                    while let Some(joined) = tasks.try_join_next() {
                        self.apply(run_id, live, joined, touched, counts)?;
                    }
                }
                WalkItem::Image { path, signal } => images.push((path, signal)),
                WalkItem::Skipped { path, reason } => {
                    counts.files_skipped += 1;
                    self.events.broadcast(SyncEvent::FileSkipped {
                        path: path.to_string_lossy().to_string(),
                        reason,
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.apply(run_id, live, joined, touched, counts)?;
        }
        self.touch_changed_images(&images, touched)?;

        match walker.await {
            Ok(Ok(summary)) => {
                debug!(observed = summary.observed, skipped = summary.skipped, "Walk finished");
                Ok(observed)
            }
            Ok(Err(WalkError::Interrupted)) if cancel.is_cancelled() => Err(SyncError::Cancelled),
            Ok(Err(e)) => Err(SyncError::Fatal(e.to_string())),
            Err(e) => Err(SyncError::Fatal(format!("walker task failed: {e}"))),
        }
    }

    /// Queue entities whose convention image is newer than their stored
    /// artwork, so a replaced `folder.jpg` is picked up without any track
    /// changing.
    ///
    /// Only images that changed since the last completed run count. An image
    /// that an earlier run already tried and failed to import stays put until
    /// it changes again.
    fn touch_changed_images(
        &self,
        images: &[(PathBuf, DateTime<Utc>)],
        touched: &mut BTreeSet<EntityKey>,
    ) -> Result<(), SyncError> {
        if images.is_empty() {
            return Ok(());
        }
        let conn = get_conn(&self.pool)?;
        let artwork_config = &self.config.artwork;
        let since = scans::latest_completed_run(&conn)?.map(|run| run.started_at);

        for (path, signal) in images {
            if since.is_some_and(|since| *signal <= since) {
                continue;
            }
            let (Some(dir), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str())) else {
                continue;
            };
            let dir = dir.to_string_lossy();

            let mut keys = Vec::new();
            if name.eq_ignore_ascii_case(&artwork_config.album_image) {
                keys.extend(metadata::albums_in_directory(&conn, &dir)?.into_iter().map(EntityKey::Album));
            }
            if name.eq_ignore_ascii_case(&artwork_config.artist_image) {
                keys.extend(metadata::artists_below_directory(&conn, &dir)?.into_iter().map(EntityKey::Artist));
            }

            for key in keys {
                if touched.contains(&key) {
                    continue;
                }
                let stale = artwork::get_record(&conn, key.kind(), key.id())?
                    .map_or(true, |record| record.freshness < *signal);
                if stale {
                    debug!(entity = %key, path = %path.display(), "Local artwork changed");
                    touched.insert(key);
                }
            }
        }
        Ok(())
    }

    /// Persist one extraction result. Only persistence errors escape.
    fn apply(
        &self,
        run_id: i64,
        live: &LiveRun,
        joined: Result<Extraction, JoinError>,
        touched: &mut BTreeSet<EntityKey>,
        counts: &mut PassCounts,
    ) -> Result<(), SyncError> {
        let (path, signal, result) = match joined {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(error = %e, "Extraction task panicked");
                counts.files_skipped += 1;
                return Ok(());
            }
        };

        let track = match result {
            Ok(track) => track,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file");
                counts.files_skipped += 1;
                self.events.broadcast(SyncEvent::FileSkipped {
                    path: path.to_string_lossy().to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let now = Utc::now();
        let dir_path = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let entry = CatalogEntry {
            file_path: path.to_string_lossy().to_string(),
            dir_path: dir_path.clone(),
            modified_at: signal,
            first_seen_at: now,
        };

        {
            let conn = get_conn(&self.pool)?;
            library::apply_track(&conn, &entry, &track, now)?;
        }
        debug!(path = %path.display(), album = %track.album_id, "Applied metadata");

        live.record_file(&dir_path);
        touched.insert(EntityKey::Album(track.album_id));
        touched.insert(EntityKey::Artist(track.artist_id));

        let files = live.files_processed();
        if files % PROGRESS_INTERVAL == 0 {
            let folders = live.folders_processed();
            let conn = get_conn(&self.pool)?;
            scans::update_progress(&conn, run_id, files, folders)?;
            self.events.broadcast(SyncEvent::ScanProgress {
                run_id,
                files_seen: counts.files_seen,
                files_processed: files,
                folders_processed: folders,
            });
        }
        Ok(())
    }

    /// Run the artwork cascade once per touched entity, concurrently.
    async fn resolve_touched(
        &self,
        touched: BTreeSet<EntityKey>,
        cancel: &CancellationToken,
        counts: &mut PassCounts,
    ) -> Result<(), SyncError> {
        if touched.is_empty() {
            return Ok(());
        }
        debug!(entities = touched.len(), "Resolving artwork");

        let mut results = futures::stream::iter(touched)
            .map(|key| async move {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                self.resolve_artwork_once(&key).await
            })
            .buffer_unordered(self.config.scan.concurrency);

        while let Some(result) = results.next().await {
            if let Some(outcome) = result? {
                if outcome.is_update() {
                    counts.artwork_updated += 1;
                }
            }
        }
        Ok(())
    }

    /// Remove every catalog entry whose file was not observed.
    fn sweep(&self, observed: &HashSet<String>) -> Result<u64, SyncError> {
        let conn = get_conn(&self.pool)?;
        let mut removed = 0;
        for path in catalog::all_paths(&conn)? {
            if observed.contains(&path) {
                continue;
            }
            if library::remove_path(&conn, &path)? {
                info!(path = %path, "Removed vanished file from catalog");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
