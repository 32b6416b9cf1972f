//! HTTP front end for the observer.
//!
//! `GET /extract-urls` observes the configured page, `POST /extract-urls`
//! observes a JSON array of pages (the list `apiscout crawl --post-to`
//! sends). Both answer with the same `{"status": ..., ...}` envelope.

use anyhow::Context;
use apiscout_core::merge::merge_all;
use apiscout_scanner::{NetworkObserver, ScanError};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_PAGE_URL: &str = "https://open.dosm.gov.my/";

pub struct ExtractState<O> {
    pub observer: O,
    /// Page observed by `GET /extract-urls`, and the prefix every result must start with
    pub page_url: String,
}

impl<O> ExtractState<O> {
    pub fn new(observer: O, page_url: impl Into<String>) -> Self {
        Self {
            observer,
            page_url: page_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractResponse {
    Success { data: Vec<String> },
    Error { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExtractError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ExtractError::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ExtractResponse::Error {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn extract_default<O: NetworkObserver + 'static>(
    State(state): State<Arc<ExtractState<O>>>,
) -> Result<Json<ExtractResponse>, ExtractError> {
    let pages = [state.page_url.clone()];
    extract(&state, &pages).await
}

pub async fn extract_posted<O: NetworkObserver + 'static>(
    State(state): State<Arc<ExtractState<O>>>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<ExtractResponse>, ExtractError> {
    let Json(pages) = payload.map_err(|e| ExtractError::InvalidRequest(e.body_text()))?;
    if pages.is_empty() {
        return Err(ExtractError::InvalidRequest(
            "expected a non-empty JSON array of page URLs".to_string(),
        ));
    }

    extract(&state, &pages).await
}

async fn extract<O: NetworkObserver>(
    state: &ExtractState<O>,
    pages: &[String],
) -> Result<Json<ExtractResponse>, ExtractError> {
    info!("Extracting API calls from {} pages", pages.len());

    let observations = state
        .observer
        .observe(pages)
        .await
        .inspect_err(|e| warn!("Extraction failed: {}", e))?;
    let data = merge_all(&observations, &state.page_url);

    info!("Returning {} URLs under {}", data.len(), state.page_url);
    Ok(Json(ExtractResponse::Success { data }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// Router Configuration
// ============================================================================

pub fn extract_router<O: NetworkObserver + 'static>(state: Arc<ExtractState<O>>) -> Router {
    Router::new()
        .route(
            "/extract-urls",
            get(extract_default::<O>).post(extract_posted::<O>),
        )
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve<O: NetworkObserver + 'static>(
    addr: SocketAddr,
    state: Arc<ExtractState<O>>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, extract_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
