//! `installer-stats` - Telemetry collection for an installer application
//!
//! This library receives installer run-reports, stores them durably in `SQLite`, and
//! serves the 32-bit and 64-bit installer builds over HTTP.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod distribution;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod report;
pub mod server;
pub mod storage;

pub use config::Config;
pub use distribution::{Architecture, Availability, Distributor};
pub use error::{DistributionError, Error, IngestionError, Result};
pub use ingest::{ingest, Acknowledgement};
pub use logging::init_logging;
pub use report::Report;
pub use storage::{ReportSink, ReportStore, StorageStats};
