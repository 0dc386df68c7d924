//! Installer run-report model.
//!
//! A [`Report`] is one telemetry record describing a single installer run. Inbound
//! bodies are turned into reports by [`Report::decode`], which either yields a fully
//! populated value or an [`IngestionError`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::IngestionError;

/// Wire names of the report fields.
pub mod fields {
    /// Client-side start time.
    pub const START_TIME: &str = "startTime";
    /// Installer work mode label.
    pub const WORK_MODE: &str = "workMode";
    /// Outcome of the elevation prompt.
    pub const ELEVATION_RESULT: &str = "elevationResult";
    /// Whether the payload download succeeded.
    pub const DOWNLOAD_RESULT: &str = "downloadResult";
    /// Download failure description.
    pub const DOWNLOAD_ERROR: &str = "downloadError";
    /// Whether the downloaded payload launched.
    pub const LAUNCH_RESULT: &str = "launchResult";
}

/// Naive layouts accepted for `startTime`, read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Years a stored timestamp can carry.
const RFC3339_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// One stored installer run-report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Identifier assigned by the store (`None` until inserted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// When the installer run started, per the client.
    pub start_time: DateTime<Utc>,

    /// Free-form work mode label.
    pub work_mode: String,

    /// Elevation outcome label.
    pub elevation_result: String,

    /// Whether the download succeeded.
    pub download_result: bool,

    /// Download error text, empty on success.
    pub download_error: String,

    /// Whether the launch succeeded.
    pub launch_result: bool,

    /// Server clock at ingestion.
    pub received_at: DateTime<Utc>,

    /// The request body exactly as received.
    pub raw_payload: String,
}

impl Report {
    /// Decode and validate a request body into a report.
    ///
    /// `received_at` is the server-side arrival time; the body is kept verbatim as
    /// `raw_payload`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::MalformedPayload`] if the body is not a JSON object and
    /// [`IngestionError::MissingRequiredField`] if `downloadResult` or `launchResult`
    /// is absent or not a boolean.
    pub fn decode(body: &str, received_at: DateTime<Utc>) -> Result<Self, IngestionError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| IngestionError::MalformedPayload(e.to_string()))?;

        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(IngestionError::MalformedPayload(format!(
                    "expected a JSON object, found {}",
                    json_type(&other)
                )))
            }
        };

        Ok(Self {
            id: None,
            start_time: object
                .get(fields::START_TIME)
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .unwrap_or_else(sentinel_start_time),
            work_mode: optional_string(&object, fields::WORK_MODE),
            elevation_result: optional_string(&object, fields::ELEVATION_RESULT),
            download_result: required_bool(&object, fields::DOWNLOAD_RESULT)?,
            download_error: optional_string(&object, fields::DOWNLOAD_ERROR),
            launch_result: required_bool(&object, fields::LAUNCH_RESULT)?,
            received_at,
            raw_payload: body.to_string(),
        })
    }

    /// Whether the start time fell back to the sentinel.
    #[must_use]
    pub fn has_sentinel_start_time(&self) -> bool {
        self.start_time == sentinel_start_time()
    }
}

/// The start time recorded when the client sends none or an unreadable one.
#[must_use]
pub fn sentinel_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Parse a client timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]`, `YYYY-MM-DD HH:MM:SS[.fff]` and
/// `YYYY-MM-DD`. Values without an offset are taken as UTC. Instants whose UTC year
/// falls outside `0000..=9999` are rejected, since RFC 3339 cannot represent them.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    parse_any_timestamp(text.trim()).filter(|dt| RFC3339_YEARS.contains(&dt.year()))
}

fn parse_any_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn required_bool(object: &Map<String, Value>, field: &'static str) -> Result<bool, IngestionError> {
    object
        .get(field)
        .and_then(Value::as_bool)
        .ok_or(IngestionError::MissingRequiredField(field))
}

fn optional_string(object: &Map<String, Value>, field: &'static str) -> String {
    match object.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            warn!(
                field,
                "expected a string, found {}; storing empty value",
                json_type(other)
            );
            String::new()
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
