//! HTTP server for the remote blob protocol
//!
//! Provides /health, and POST/GET (plus HEAD via GET) on /blobs/{id}.
//! Responses carry the metadata headers the client side of the protocol
//! parses: `File-Length`, `Content-Type`, and `Content-Disposition`.

use crate::types::HealthResponse;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use blob_store::{BlobStore, StoreError};
use chrono::{DateTime, Utc};
use file_blob_store::FileBlobStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub store: FileBlobStore,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(store: FileBlobStore) -> Self {
        Self {
            store,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Acknowledgement for a stored blob
#[derive(Serialize)]
struct StoredResponse {
    id: String,
    size: u64,
}

/// Create the HTTP router
pub fn create_router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/blobs/{id}", post(store_blob).get(get_blob))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(
    state: SharedState,
    port: u16,
    max_upload_bytes: usize,
) -> std::io::Result<()> {
    let router = create_router(state, max_upload_bytes);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let store = state.store.stats().await.unwrap_or_default();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        store,
    })
}

/// Accept a multipart upload for one blob
async fn store_blob(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty blob identifier");
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = match field.bytes().await {
            Ok(data) => data.to_vec(),
            Err(e) => {
                warn!(id = %id, error = %e, "could not read upload body");
                return error_response(StatusCode::BAD_REQUEST, "unreadable upload body");
            }
        };
        let size = data.len() as u64;

        return match state.store.store_bytes(&id, data, &filename, &mime_type).await {
            Ok(()) => {
                info!(id = %id, size, filename = %filename, "stored blob");
                (StatusCode::CREATED, Json(StoredResponse { id, size })).into_response()
            }
            Err(StoreError::AlreadyExists(_)) => {
                error_response(StatusCode::CONFLICT, "blob already exists")
            }
            Err(e) => {
                warn!(id = %id, error = %e, "failed to store blob");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to store blob")
            }
        };
    }

    error_response(StatusCode::BAD_REQUEST, "missing file field")
}

/// Serve a blob with its metadata headers (axum answers HEAD from this
/// route with the same headers and an empty body)
async fn get_blob(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let meta = match state.store.metadata(&id).await {
        Ok(Some(meta)) => meta,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "blob not found"),
        Err(e) => {
            warn!(id = %id, error = %e, "failed to read blob metadata");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read blob");
        }
    };

    match state.store.fetch_data(&id).await {
        Ok(Some(data)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, meta.mime_type)
            .header("File-Length", meta.size.to_string())
            .header(
                header::CONTENT_DISPOSITION,
                format!("form-data; filename=\"{}\"", meta.filename),
            )
            .body(Body::from(data))
            .unwrap(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "blob not found"),
        Err(e) => {
            warn!(id = %id, error = %e, "failed to read blob data");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read blob")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
