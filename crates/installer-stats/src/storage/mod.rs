//! Storage layer for installer-stats.
//!
//! This module provides `SQLite`-based durable storage for run-reports. Records are
//! append-only: the store assigns identifiers and never updates or deletes a row.

pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::report::{sentinel_start_time, Report};

const SELECT_COLUMNS: &str = r"
    SELECT id, start_time, work_mode, elevation_result, download_result,
           download_error, launch_result, received_at, raw_data
    FROM statistics
";

/// Durable store of run-reports.
///
/// A single connection sits behind a mutex, so identifier assignment and the write
/// that backs it happen under one lock. Shared across request handlers via `Arc`.
#[derive(Debug)]
pub struct ReportStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl ReportStore {
    /// Open or create a report database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Opening an already initialized database leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a report and return its assigned identifier.
    ///
    /// Any `id` already set on `report` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; the report is then not stored.
    pub fn insert(&self, report: &Report) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            r"
            INSERT INTO statistics (start_time, work_mode, elevation_result, download_result,
                                    download_error, launch_result, received_at, raw_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                format_timestamp(report.start_time),
                report.work_mode,
                report.elevation_result,
                report.download_result,
                report.download_error,
                report.launch_result,
                format_timestamp(report.received_at),
                report.raw_payload,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted report with id {}", id);
        Ok(id)
    }

    /// Get a report by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<Report>> {
        let conn = self.lock()?;
        let report = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_report,
            )
            .optional()?;
        Ok(report)
    }

    /// All stored reports, newest arrival first.
    ///
    /// Every call reads the table afresh. Rows whose columns cannot be decoded are
    /// logged and left out rather than failing the listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_all(&self) -> Result<Vec<Report>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY received_at DESC, id DESC"))?;

        let mut reports = Vec::new();
        for row in stmt.query_map([], Self::row_to_report)? {
            match row {
                Ok(report) => reports.push(report),
                Err(e @ rusqlite::Error::FromSqlConversionFailure(..)) => {
                    warn!("Skipping unreadable report row: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(reports)
    }

    /// Count stored reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM statistics", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_reports = self.count()?;

        let (oldest, newest): (Option<String>, Option<String>) = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT MIN(received_at), MAX(received_at) FROM statistics",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
        };

        let parse = |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_reports,
            oldest_received: oldest.and_then(parse),
            newest_received: newest.and_then(parse),
            db_size_bytes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    /// Convert a database row to a Report struct.
    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<Report> {
        Ok(Report {
            id: Some(row.get(0)?),
            start_time: start_time_column(row, 1)?,
            work_mode: row.get(2)?,
            elevation_result: row.get(3)?,
            download_result: row.get(4)?,
            download_error: row.get(5)?,
            launch_result: row.get(6)?,
            received_at: parse_timestamp_column(row, 7)?,
            raw_payload: row.get(8)?,
        })
    }
}

/// Destination for newly ingested reports.
pub trait ReportSink {
    /// Durably append `report`, returning its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the report could not be stored.
    fn insert(&self, report: &Report) -> Result<i64>;
}

impl ReportSink for ReportStore {
    fn insert(&self, report: &Report) -> Result<i64> {
        ReportStore::insert(self, report)
    }
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of reports stored.
    pub total_reports: i64,
    /// Arrival time of the oldest report.
    pub oldest_received: Option<DateTime<Utc>>,
    /// Arrival time of the newest report.
    pub newest_received: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Create all tables and indexes that don't exist yet.
fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in schema::SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}

// Fixed precision keeps lexical order equal to chronological order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Client-supplied, so a value that no longer reads back degrades to the sentinel.
fn start_time_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    match DateTime::parse_from_rfc3339(&text) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("Stored start time '{text}' is unreadable ({e}); using sentinel");
            Ok(sentinel_start_time())
        }
    }
}

fn parse_timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use super::*;

    fn create_test_store() -> ReportStore {
        ReportStore::open_in_memory().expect("failed to create test store")
    }

    fn create_test_report(work_mode: &str, received_at: DateTime<Utc>) -> Report {
        let body = format!(
            r#"{{"workMode": "{work_mode}", "downloadResult": true, "launchResult": false}}"#
        );
        Report::decode(&body, received_at).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        let store = ReportStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_insert_and_get() {
        let store = create_test_store();
        let report = create_test_report("interactive", at(9));

        let id = store.insert(&report).unwrap();
        let retrieved = store.get(id).unwrap().unwrap();

        assert_eq!(retrieved.id, Some(id));
        assert_eq!(retrieved.work_mode, "interactive");
        assert!(retrieved.download_result);
        assert!(!retrieved.launch_result);
        assert_eq!(retrieved.received_at, at(9));
        assert_eq!(retrieved.start_time, report.start_time);
        assert_eq!(retrieved.raw_payload, report.raw_payload);
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = create_test_store();

        let first = store.insert(&create_test_report("a", at(1))).unwrap();
        let second = store.insert(&create_test_report("b", at(2))).unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_insert_ignores_preset_id() {
        let store = create_test_store();
        let mut report = create_test_report("a", at(1));
        report.id = Some(500);

        let id = store.insert(&report).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get(99999).unwrap().is_none());
    }

    #[test]
    fn test_list_all_empty() {
        let store = create_test_store();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_list_all_newest_first() {
        let store = create_test_store();

        store.insert(&create_test_report("middle", at(12))).unwrap();
        store.insert(&create_test_report("oldest", at(8))).unwrap();
        store.insert(&create_test_report("newest", at(20))).unwrap();

        let modes: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.work_mode)
            .collect();
        assert_eq!(modes, ["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_list_all_orders_by_subsecond_arrival() {
        let store = create_test_store();
        let base = at(10);

        store
            .insert(&create_test_report("later", base + Duration::milliseconds(900)))
            .unwrap();
        store
            .insert(&create_test_report("earlier", base + Duration::milliseconds(5)))
            .unwrap();

        let listed = store.list_all().unwrap();
        assert_eq!(listed[0].work_mode, "later");
        assert_eq!(listed[1].work_mode, "earlier");
    }

    #[test]
    fn test_count() {
        let store = create_test_store();
        assert_eq!(store.count().unwrap(), 0);

        store.insert(&create_test_report("one", at(1))).unwrap();
        store.insert(&create_test_report("two", at(2))).unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_stats_empty() {
        let store = create_test_store();
        let stats = store.stats().unwrap();

        assert_eq!(stats.total_reports, 0);
        assert!(stats.oldest_received.is_none());
        assert!(stats.newest_received.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let store = create_test_store();

        store.insert(&create_test_report("first", at(3))).unwrap();
        store.insert(&create_test_report("second", at(7))).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_reports, 2);
        assert_eq!(stats.oldest_received, Some(at(3)));
        assert_eq!(stats.newest_received, Some(at(7)));
    }

    #[test]
    fn test_path() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("statistics.db");

        let store = ReportStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_reports_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statistics.db");

        let id = {
            let store = ReportStore::open(&path).unwrap();
            store.insert(&create_test_report("durable", at(5))).unwrap()
        };

        // Second open hits the existing schema and must not fail or wipe data.
        let store = ReportStore::open(&path).unwrap();
        let report = store.get(id).unwrap().unwrap();
        assert_eq!(report.work_mode, "durable");
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_concurrent_inserts_get_distinct_ids() {
        let store = Arc::new(create_test_store());
        let threads = 8;
        let per_thread = 25;

        let mut ids: Vec<i64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|t| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..per_thread)
                            .map(|i| {
                                let report = create_test_report(&format!("t{t}-{i}"), Utc::now());
                                store.insert(&report).unwrap()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), threads * per_thread);
        assert_eq!(store.list_all().unwrap().len(), threads * per_thread);
    }

    #[test]
    fn test_far_future_start_time_stays_listable() {
        let store = create_test_store();
        let body = r#"{"startTime": "+10000-01-01", "downloadResult": true, "launchResult": true}"#;
        let report = Report::decode(body, at(5)).unwrap();

        let id = store.insert(&report).unwrap();

        let stored = store.get(id).unwrap().unwrap();
        assert!(stored.has_sentinel_start_time());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_rows_do_not_break_listing() {
        let store = create_test_store();
        let good = store.insert(&create_test_report("good", at(1))).unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                r"INSERT INTO statistics (start_time, work_mode, elevation_result, download_result,
                                          download_error, launch_result, received_at, raw_data)
                  VALUES ('-0001-01-01T00:00:00.000000Z', 'odd-start', '', 1, '', 1,
                          '2025-06-01T02:00:00.000000Z', '{}')",
                [],
            )
            .unwrap();
            conn.execute(
                r"INSERT INTO statistics (start_time, work_mode, elevation_result, download_result,
                                          download_error, launch_result, received_at, raw_data)
                  VALUES ('2025-06-01T00:00:00.000000Z', 'odd-arrival', '', 1, '', 1,
                          'not a timestamp', '{}')",
                [],
            )
            .unwrap();
        }

        let listed = store.list_all().unwrap();
        let modes: Vec<_> = listed.iter().map(|r| r.work_mode.as_str()).collect();
        assert_eq!(modes, vec!["odd-start", "good"]);
        assert!(listed[0].has_sentinel_start_time());
        assert_eq!(listed[1].id, Some(good));
    }
}
