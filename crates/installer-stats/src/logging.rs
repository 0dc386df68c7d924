//! Logging configuration for installer-stats.
//!
//! This module initializes the tracing subscriber and renders store listings for
//! operators.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::report::Report;

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Initialize the logging system.
///
/// This should be called once at application startup. The logging level can be
/// controlled via:
/// 1. The `verbosity` parameter
/// 2. The `RUST_LOG` environment variable (takes precedence)
///
/// # Examples
///
/// ```no_run
/// use installer_stats::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let level = verbosity.to_level_filter();
    let default_filter = format!("installer_stats={level},tower_http={level}");

    // Allow RUST_LOG to override
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore error if already set
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Log a store listing, one event per report.
pub fn log_reports(reports: &[Report]) {
    info!(total = reports.len(), "Stored reports");

    if reports.is_empty() {
        info!("Report store is empty");
        return;
    }

    for report in reports {
        info!("{}", summarize(report));
    }
}

/// One-line operator summary of a report.
#[must_use]
pub fn summarize(report: &Report) -> String {
    let id = report
        .id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "#{id} started={} mode='{}' elevation='{}' download={} download_error='{}' launch={} received={}",
        report.start_time.to_rfc3339(),
        report.work_mode,
        report.elevation_result,
        report.download_result,
        report.download_error,
        report.launch_result,
        report.received_at.to_rfc3339(),
    )
}
