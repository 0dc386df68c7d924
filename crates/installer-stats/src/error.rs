//! Error types for installer-stats.
//!
//! [`Error`] covers infrastructure failures (database, configuration, I/O, server).
//! [`IngestionError`] and [`DistributionError`] are the request-level taxonomies that
//! the HTTP layer translates into client-visible responses.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for installer-stats operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Server Errors ===
    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    ServerBind {
        /// Address that was requested.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for installer-stats operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}

/// Why an inbound run-report was rejected.
///
/// Nothing is persisted when any of these is returned.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The body is not well-formed JSON, or not a JSON object.
    #[error("{0}")]
    MalformedPayload(String),

    /// A required field is absent or has the wrong type.
    #[error("required field '{0}' is missing or is not a boolean")]
    MissingRequiredField(&'static str),

    /// The body exceeds the accepted size.
    #[error("request body exceeds the {limit}-byte limit")]
    PayloadTooLarge {
        /// Maximum accepted body size in bytes.
        limit: usize,
    },

    /// The store refused or failed the insert.
    #[error("failed to persist report: {0}")]
    PersistenceFailure(#[source] Error),
}

/// Why an installer download could not be served.
#[derive(Error, Debug)]
pub enum DistributionError {
    /// The selector is not one of the recognized architecture tokens.
    #[error("unknown architecture '{0}': specify 32 or 64, e.g. /download/32 or /download/64")]
    InvalidSelector(String),

    /// The resolved installer does not exist on disk.
    #[error(
        "file {file_name} not found.\nSearched here: {}\nMake sure the '{subdir}' directory exists and contains {file_name}",
        .path.display()
    )]
    FileNotFound {
        /// Installer file name.
        file_name: &'static str,
        /// Architecture subdirectory.
        subdir: &'static str,
        /// Absolute path that was searched.
        path: PathBuf,
    },

    /// The installer exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    TransferFailure {
        /// Path being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}
