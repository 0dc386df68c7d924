//! `SQLite` schema definitions for installer-stats.
//!
//! Every statement is idempotent, so running the full set against an existing
//! database is a no-op.

/// SQL statement to create the statistics table.
pub const CREATE_STATISTICS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS statistics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time TEXT NOT NULL,
    work_mode TEXT NOT NULL,
    elevation_result TEXT NOT NULL,
    download_result INTEGER NOT NULL,
    download_error TEXT NOT NULL,
    launch_result INTEGER NOT NULL,
    received_at TEXT NOT NULL,
    raw_data TEXT NOT NULL
)
";

/// SQL statement to create an index on arrival time for listing.
pub const CREATE_RECEIVED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_statistics_received_at ON statistics(received_at DESC)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_STATISTICS_TABLE, CREATE_RECEIVED_AT_INDEX];
