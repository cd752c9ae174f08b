//! The run lock: at most one synchronization at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::status::{LiveRun, ScanStatus};

type Slot = Arc<Mutex<Option<Arc<LiveRun>>>>;

/// State token owned by the orchestrator. Holding a [`RunGuard`] is the
/// only way to be the active run.
#[derive(Debug, Default)]
pub struct RunLock {
    active: Slot,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the active run, or get the active run's status.
    pub fn try_acquire(&self, started_at: DateTime<Utc>) -> Result<RunGuard, ScanStatus> {
        let mut active = self.active.lock();
        if let Some(run) = active.as_ref() {
            return Err(run.status());
        }

        let live = Arc::new(LiveRun::new(started_at));
        *active = Some(Arc::clone(&live));
        Ok(RunGuard {
            slot: Arc::clone(&self.active),
            live,
        })
    }

    /// Status of the active run, if any.
    pub fn current(&self) -> Option<ScanStatus> {
        self.active.lock().as_ref().map(|run| run.status())
    }

    pub fn is_held(&self) -> bool {
        self.active.lock().is_some()
    }
}

/// Proof of holding the run lock. Released on drop, including unwinding.
#[derive(Debug)]
pub struct RunGuard {
    slot: Slot,
    live: Arc<LiveRun>,
}

impl RunGuard {
    pub fn live(&self) -> &Arc<LiveRun> {
        &self.live
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}
