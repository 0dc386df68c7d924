//! HTTP surface.
//!
//! | Route                        | Behavior                                  |
//! |------------------------------|-------------------------------------------|
//! | `GET /`                      | informational text                        |
//! | `POST /api/stats`            | ingest one run-report                     |
//! | `GET /download`              | installer availability report             |
//! | `GET /download/{32,64}`      | installer binary as an attachment         |
//!
//! `/download/7zip` and `/download/7zip/{32,64}` are kept as aliases of the download
//! routes for installers built against the older URL layout.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::distribution::{Availability, Distributor, DOWNLOAD_ROUTE};
use crate::error::{DistributionError, Error, IngestionError, Result};
use crate::ingest::{ingest, Acknowledgement};
use crate::logging::log_reports;
use crate::storage::ReportStore;

/// Legacy prefix of the download routes.
const LEGACY_DOWNLOAD_ROUTE: &str = "/download/7zip";

/// Largest accepted run-report body.
pub const MAX_REPORT_BYTES: usize = 2 * 1024 * 1024;

const INDEX_TEXT: &str =
    "Installer statistics server is running. POST reports to /api/stats, download installers from /download";

/// Shared state of the request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    store: Arc<ReportStore>,
    distributor: Arc<Distributor>,
}

impl AppState {
    /// Bundle a store and a distributor for the router.
    #[must_use]
    pub fn new(store: ReportStore, distributor: Distributor) -> Self {
        Self {
            store: Arc::new(store),
            distributor: Arc::new(distributor),
        }
    }

    /// The report store.
    #[must_use]
    pub fn store(&self) -> &Arc<ReportStore> {
        &self.store
    }

    /// The installer distributor.
    #[must_use]
    pub fn distributor(&self) -> &Arc<Distributor> {
        &self.distributor
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/api/stats",
            post(submit_report).layer(DefaultBodyLimit::max(MAX_REPORT_BYTES)),
        )
        .route(DOWNLOAD_ROUTE, get(list_installers))
        .route(&format!("{DOWNLOAD_ROUTE}/:selector"), get(download_installer))
        .route(LEGACY_DOWNLOAD_ROUTE, get(list_installers))
        .route(
            &format!("{LEGACY_DOWNLOAD_ROUTE}/:selector"),
            get(download_installer),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, bind the listener and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, the address cannot be bound,
/// or the server fails while running.
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let store = ReportStore::open(config.database_path())?;
    let distributor = Distributor::new(config.distribution_dir());

    info!(
        "Installers are served from {}",
        distributor.base_dir().display()
    );
    let state = AppState::new(store, distributor);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::ServerBind {
            addr: addr.to_string(),
            source,
        })?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn index() -> &'static str {
    INDEX_TEXT
}

async fn submit_report(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<Acknowledgement>, IngestionError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IngestionError::PayloadTooLarge {
                limit: MAX_REPORT_BYTES,
            }
        } else {
            IngestionError::MalformedPayload(rejection.body_text())
        }
    })?;
    let body = String::from_utf8(body.to_vec()).map_err(|e| {
        IngestionError::MalformedPayload(format!("request body is not valid UTF-8: {e}"))
    })?;

    let store = Arc::clone(&state.store);
    let ack = tokio::task::spawn_blocking(move || ingest(&*store, &body))
        .await
        .map_err(|e| {
            IngestionError::PersistenceFailure(Error::internal(format!(
                "ingestion task failed: {e}"
            )))
        })??;

    spawn_store_listing(Arc::clone(&state.store));
    Ok(Json(ack))
}

/// Log the whole store in the background; the caller never waits on it.
fn spawn_store_listing(store: Arc<ReportStore>) {
    tokio::task::spawn_blocking(move || match store.list_all() {
        Ok(reports) => log_reports(&reports),
        Err(e) => warn!("Failed to list stored reports: {e}"),
    });
}

async fn list_installers(State(state): State<AppState>) -> Json<Availability> {
    Json(state.distributor.list_available().await)
}

async fn download_installer(
    State(state): State<AppState>,
    Path(selector): Path<String>,
) -> std::result::Result<Response, DistributionError> {
    let download = state.distributor.fetch(&selector).await?;
    let disposition = download.content_disposition();

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.content,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for IngestionError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MalformedPayload(_) | Self::MissingRequiredField(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Report ingestion failed: {self}");
        } else {
            warn!("Report rejected: {self}");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for DistributionError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidSelector(_) => StatusCode::BAD_REQUEST,
            Self::FileNotFound { .. } => StatusCode::NOT_FOUND,
            Self::TransferFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Installer transfer failed: {self}");
        } else {
            warn!("Installer request refused: {self}");
        }

        let message = match &self {
            Self::TransferFailure { .. } => format!("Internal server error: {self}"),
            _ => format!("Error: {self}"),
        };
        (status, message).into_response()
    }
}
