//! Scan run bookkeeping queries.

use chrono::{DateTime, Utc};
use lyrebird_common::{Error, Result, ScanState};
use rusqlite::Connection;

use crate::models::ScanRun;
use crate::timestamp;

/// Error message recorded on runs left running by a previous process.
pub const ORPHANED_RUN_ERROR: &str = "interrupted before completion";

/// Parse a scan run from a database row.
///
/// Expects columns in order: id, started_at, completed_at, files_processed,
/// folders_processed, status, error.
fn parse_run_row(row: &rusqlite::Row) -> rusqlite::Result<ScanRun> {
    let status: String = row.get(5)?;
    Ok(ScanRun {
        id: row.get(0)?,
        started_at: timestamp::column(row, 1)?,
        completed_at: timestamp::optional_column(row, 2)?,
        files_processed: row.get::<_, i64>(3)?.max(0) as u64,
        folders_processed: row.get::<_, i64>(4)?.max(0) as u64,
        status: status.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        error: row.get(6)?,
    })
}

/// Record the start of a run.
///
/// Fails if another run is still marked `running`.
pub fn insert_run(conn: &Connection, started_at: DateTime<Utc>) -> Result<ScanRun> {
    conn.execute(
        "INSERT INTO scan_runs (started_at, status) VALUES (:started_at, 'running')",
        rusqlite::named_params! { ":started_at": timestamp::format(&started_at) },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let id = conn.last_insert_rowid();
    get_run(conn, id)?.ok_or_else(|| Error::database(format!("scan run {id} vanished after insert")))
}

/// Persist live counters of a running scan.
pub fn update_progress(conn: &Connection, id: i64, files: u64, folders: u64) -> Result<()> {
    conn.execute(
        "UPDATE scan_runs SET files_processed = :files, folders_processed = :folders
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id,
            ":files": files as i64,
            ":folders": folders as i64,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Move a run to a terminal state with its final counts.
pub fn finish_run(
    conn: &Connection,
    id: i64,
    status: ScanState,
    files: u64,
    folders: u64,
    completed_at: DateTime<Utc>,
    error: Option<&str>,
) -> Result<()> {
    if !status.is_terminal() {
        return Err(Error::invalid_input(format!(
            "cannot finish a scan run as {status}"
        )));
    }

    let affected = conn
        .execute(
            "UPDATE scan_runs SET
                status = :status,
                files_processed = :files,
                folders_processed = :folders,
                completed_at = :completed_at,
                error = :error
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id,
                ":status": status.as_str(),
                ":files": files as i64,
                ":folders": folders as i64,
                ":completed_at": timestamp::format(&completed_at),
                ":error": error,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("scan run {id}")));
    }
    Ok(())
}

/// Get a run by id.
pub fn get_run(conn: &Connection, id: i64) -> Result<Option<ScanRun>> {
    let result = conn.query_row(
        "SELECT id, started_at, completed_at, files_processed, folders_processed, status, error
         FROM scan_runs WHERE id = :id",
        rusqlite::named_params! { ":id": id },
        parse_run_row,
    );

    match result {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// The most recently started run, if any.
pub fn latest_run(conn: &Connection) -> Result<Option<ScanRun>> {
    let result = conn.query_row(
        "SELECT id, started_at, completed_at, files_processed, folders_processed, status, error
         FROM scan_runs ORDER BY id DESC LIMIT 1",
        [],
        parse_run_row,
    );

    match result {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// The most recently started run that completed.
pub fn latest_completed_run(conn: &Connection) -> Result<Option<ScanRun>> {
    let result = conn.query_row(
        "SELECT id, started_at, completed_at, files_processed, folders_processed, status, error
         FROM scan_runs WHERE status = 'completed' ORDER BY id DESC LIMIT 1",
        [],
        parse_run_row,
    );

    match result {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Mark every run still `running` as `failed`.
///
/// Called once at startup, before this process can own a run, so any
/// running row belongs to a process that died mid-scan.
///
/// # Returns
///
/// * `Ok(usize)` - Number of runs recovered
pub fn fail_orphaned_runs(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "UPDATE scan_runs SET
            status = 'failed',
            completed_at = :now,
            error = COALESCE(error, :error)
         WHERE status = 'running'",
        rusqlite::named_params! {
            ":now": timestamp::format(&now),
            ":error": ORPHANED_RUN_ERROR,
        },
    )
    .map_err(|e| Error::database(e.to_string()))
}
