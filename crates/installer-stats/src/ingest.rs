//! Report ingestion.
//!
//! Turns a raw request body into a stored [`Report`]: decode and validate, stamp the
//! server arrival time, persist, acknowledge. A body either ends up as exactly one
//! stored record or produces an [`IngestionError`] and leaves the store untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::IngestionError;
use crate::report::Report;
use crate::storage::ReportSink;

/// Message returned with every successful ingestion.
pub const SAVED_MESSAGE: &str = "Statistics saved";

/// Response body for a stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Human-readable confirmation.
    pub message: String,
    /// Identifier assigned by the store.
    pub id: i64,
}

impl Acknowledgement {
    fn saved(id: i64) -> Self {
        Self {
            message: SAVED_MESSAGE.to_string(),
            id,
        }
    }
}

/// Ingest one request body, using the current server time as arrival time.
///
/// # Errors
///
/// See [`ingest_at`].
pub fn ingest<S: ReportSink + ?Sized>(
    sink: &S,
    body: &str,
) -> Result<Acknowledgement, IngestionError> {
    ingest_at(sink, body, Utc::now())
}

/// Ingest one request body with an explicit arrival time.
///
/// # Errors
///
/// Returns [`IngestionError::MalformedPayload`] or
/// [`IngestionError::MissingRequiredField`] when the body fails validation, and
/// [`IngestionError::PersistenceFailure`] when the sink rejects the insert.
pub fn ingest_at<S: ReportSink + ?Sized>(
    sink: &S,
    body: &str,
    received_at: DateTime<Utc>,
) -> Result<Acknowledgement, IngestionError> {
    debug!(bytes = body.len(), "Decoding report");
    let report = Report::decode(body, received_at)?;

    let id = sink
        .insert(&report)
        .map_err(IngestionError::PersistenceFailure)?;

    info!(
        id,
        work_mode = %report.work_mode,
        download_result = report.download_result,
        launch_result = report.launch_result,
        "Report stored"
    );
    Ok(Acknowledgement::saved(id))
}
