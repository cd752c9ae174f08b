//! Background thumbnail derivation.
//!
//! The cascade writes the artwork record first and hands the resize to this
//! pool without waiting for it. Until the job lands, readers see the previous
//! thumbnail (or the raw source when there is none yet). `wait_idle` exists so
//! callers and tests can bound that window.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::storage::{decode, encode_jpeg, fit_within, write_atomic};

/// One resize request.
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Fixed pool of resize workers.
///
/// Each worker owns one queue and jobs are routed by a hash of the target
/// path, so two jobs for the same file always run in submission order.
pub struct ThumbnailPool {
    queues: Vec<mpsc::UnboundedSender<ThumbnailJob>>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ThumbnailPool {
    /// Spawn `workers` worker tasks on the current runtime.
    pub fn new(workers: usize, size: u32, quality: u8) -> Self {
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let queues = (0..workers.max(1))
            .map(|worker| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(
                    worker,
                    rx,
                    size,
                    quality,
                    Arc::clone(&pending),
                    Arc::clone(&idle),
                ));
                tx
            })
            .collect();

        Self {
            queues,
            pending,
            idle,
        }
    }

    /// Queue a job. There is no handle to wait on.
    pub fn submit(&self, job: ThumbnailJob) {
        let shard = shard_for(&job.target, self.queues.len());
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.queues[shard].send(job).is_err() {
            warn!(shard, "Thumbnail worker has stopped, dropping job");
            self.finish_one();
        }
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolve once every submitted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

fn shard_for(target: &Path, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    target.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

async fn run_worker(
    worker: usize,
    mut rx: mpsc::UnboundedReceiver<ThumbnailJob>,
    size: u32,
    quality: u8,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) {
    while let Some(job) = rx.recv().await {
        let target = job.target.clone();
        let result = tokio::task::spawn_blocking(move || derive(&job, size, quality)).await;

        match result {
            Ok(Ok(())) => debug!(worker, target = %target.display(), "Thumbnail written"),
            Ok(Err(e)) => warn!(worker, target = %target.display(), error = %e, "Thumbnail failed"),
            Err(e) => warn!(worker, target = %target.display(), error = %e, "Thumbnail task panicked"),
        }

        if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            idle.notify_waiters();
        }
    }
}

fn derive(job: &ThumbnailJob, size: u32, quality: u8) -> lyrebird_common::Result<()> {
    let bytes = std::fs::read(&job.source)?;
    let img = decode(&bytes)?;
    let jpeg = encode_jpeg(&fit_within(&img, size), quality)?;
    write_atomic(&job.target, &jpeg)
}
