//! Health Checks - Liveness and Readiness Probes
//!
//! `/live` answers as long as the process runs. `/ready` answers once a
//! snapshot has been published and the most recent tick succeeded, so
//! orchestrators can tell a stale exposition from a fresh one.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::usecases::aggregator::MetricsHolder;

use super::prometheus::ServiceMetrics;

/// Shared health state polled by readiness probes.
#[derive(Clone)]
pub struct HealthState {
    /// Published metrics snapshot.
    pub holder: Arc<MetricsHolder>,
    /// Tick outcomes.
    pub metrics: Arc<ServiceMetrics>,
}

impl HealthState {
    pub fn new(holder: Arc<MetricsHolder>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { holder, metrics }
    }

    /// Check if the exposition is fresh enough to serve.
    pub fn is_ready(&self) -> bool {
        self.holder.has_published() && self.metrics.last_tick_succeeded()
    }
}

/// Routes for `/live` and `/ready`.
pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: returns 200 only after a successful tick.
async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
