//! HTTP Server - Exposition, Swap Board and Probes
//!
//! Serves the published metrics snapshot on `/metrics`, the reconciled
//! swap board on `/htlcs`, the service's own registry on
//! `/internal/metrics`, and the health probes, via axum 0.7.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::adapters::metrics::{HealthState, ServiceMetrics, health};
use crate::domain::exposition::{self, TEXT_CONTENT_TYPE};
use crate::usecases::aggregator::MetricsHolder;
use crate::usecases::swap_board::SwapBoardService;

use super::render;

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Published metrics snapshot.
    pub holder: Arc<MetricsHolder>,
    /// On-demand swap reconciliation.
    pub swap_board: Arc<SwapBoardService>,
    /// Service self-metrics.
    pub metrics: Arc<ServiceMetrics>,
    /// Archethic node URL, used for explorer links.
    pub explorer: Arc<str>,
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let health = HealthState::new(Arc::clone(&state.holder), Arc::clone(&state.metrics));

    Router::new()
        .route("/metrics", get(metrics))
        .route("/htlcs", get(htlcs))
        .route("/internal/metrics", get(internal_metrics))
        .with_state(state)
        .merge(health::routes(health))
}

/// Axum HTTP server.
pub struct HttpServer {
    state: AppState,
    bind_address: String,
}

impl HttpServer {
    pub fn new(state: AppState, bind_address: String) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    /// Serve until a shutdown signal is broadcast.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "HTTP server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("html"))
}

/// Current snapshot in the exposition format.
async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let snapshot = state.holder.current();
    let text = exposition::format(&snapshot.samples);

    if wants_html(&headers) {
        Html(exposition::wrap_html(&text)).into_response()
    } else {
        ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], text).into_response()
    }
}

/// Freshly reconciled swap board, JSON or HTML.
async fn htlcs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.swap_board.build().await {
        Ok(board) if wants_html(&headers) => {
            Html(render::swap_table(&board, &state.explorer)).into_response()
        }
        Ok(board) => Json(board).into_response(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Swap board unavailable");
            (StatusCode::BAD_GATEWAY, "swap board unavailable").into_response()
        }
    }
}

/// The service's own Prometheus registry.
async fn internal_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.gather_text() {
        Ok(text) => ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode service metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
