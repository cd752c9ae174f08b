//! Scan status as seen by API callers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use lyrebird_common::ScanState;
use lyrebird_db::models::ScanRun;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Snapshot of the current or last synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub running: bool,
    pub files_processed: u64,
    pub folders_processed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ScanState,
}

impl ScanStatus {
    /// Status before any run was ever recorded.
    pub fn idle() -> Self {
        Self {
            running: false,
            files_processed: 0,
            folders_processed: 0,
            started_at: None,
            completed_at: None,
            status: ScanState::Idle,
        }
    }

    pub fn from_run(run: &ScanRun) -> Self {
        Self {
            running: run.status == ScanState::Running,
            files_processed: run.files_processed,
            folders_processed: run.folders_processed,
            started_at: Some(run.started_at),
            completed_at: run.completed_at,
            status: run.status,
        }
    }
}

/// Counters of the run in progress, shared with status readers.
#[derive(Debug)]
pub struct LiveRun {
    started_at: DateTime<Utc>,
    files: AtomicU64,
    folders: AtomicU64,
    seen_dirs: Mutex<HashSet<String>>,
}

impl LiveRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            files: AtomicU64::new(0),
            folders: AtomicU64::new(0),
            seen_dirs: Mutex::new(HashSet::new()),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one applied file in `dir`.
    pub fn record_file(&self, dir: &str) {
        if self.seen_dirs.lock().insert(dir.to_string()) {
            self.folders.fetch_add(1, Ordering::SeqCst);
        }
        self.files.fetch_add(1, Ordering::SeqCst);
    }

    pub fn files_processed(&self) -> u64 {
        self.files.load(Ordering::SeqCst)
    }

    pub fn folders_processed(&self) -> u64 {
        self.folders.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            running: true,
            files_processed: self.files_processed(),
            folders_processed: self.folders_processed(),
            started_at: Some(self.started_at),
            completed_at: None,
            status: ScanState::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(ScanStatus::idle()).unwrap();
        assert_eq!(json["running"], false);
        assert_eq!(json["filesProcessed"], 0);
        assert_eq!(json["foldersProcessed"], 0);
        assert!(json["startedAt"].is_null());
        assert!(json["completedAt"].is_null());
        assert_eq!(json["status"], "idle");
    }

    #[test]
    fn test_live_run_counts_distinct_folders() {
        let live = LiveRun::new(Utc::now());
        live.record_file("/music/a");
        live.record_file("/music/a");
        live.record_file("/music/b");

        let status = live.status();
        assert!(status.running);
        assert_eq!(status.files_processed, 3);
        assert_eq!(status.folders_processed, 2);
        assert_eq!(status.status, ScanState::Running);
    }

    #[test]
    fn test_from_finished_run() {
        let now = Utc::now();
        let run = ScanRun {
            id: 1,
            started_at: now,
            completed_at: Some(now),
            files_processed: 2,
            folders_processed: 1,
            status: ScanState::Completed,
            error: None,
        };
        let status = ScanStatus::from_run(&run);
        assert!(!status.running);
        assert_eq!(status.files_processed, 2);
        assert_eq!(status.completed_at, Some(now));
    }
}
