// HTTP + WebSocket routes (report query surface)

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::metrics::MetricRegistry;
use crate::models::Sample;
use crate::report::Reporter;
use crate::store::Store;
use crate::worker::WorkerStats;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) sample_tx: broadcast::Sender<Sample>,
    pub(crate) store: Arc<Store>,
    pub(crate) registry: Arc<MetricRegistry>,
    pub(crate) reporter: Arc<Reporter>,
    pub(crate) ws_sample_connections: Arc<AtomicUsize>,
    pub(crate) stats: Arc<WorkerStats>,
}

pub fn app(
    sample_tx: broadcast::Sender<Sample>,
    store: Arc<Store>,
    registry: Arc<MetricRegistry>,
    reporter: Arc<Reporter>,
    ws_sample_connections: Arc<AtomicUsize>,
    stats: Arc<WorkerStats>,
) -> Router {
    let state = AppState {
        sample_tx,
        store,
        registry,
        reporter,
        ws_sample_connections,
        stats,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/metrics", get(http::metrics_handler)) // GET /api/metrics
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .route(
            "/api/report/parameter-changes",
            get(http::parameter_changes_handler),
        ) // GET /api/report/parameter-changes?hours=N
        .route("/api/report/{window}", get(http::report_handler)) // GET /api/report/{sample|hour|day}?hours=N
        .route("/api/alerts/conditions", get(http::conditions_handler)) // GET /api/alerts/conditions
        .route("/api/alerts/pending", get(http::pending_handler)) // GET /api/alerts/pending
        .route("/api/alerts/occurrences", get(http::occurrences_handler)) // GET /api/alerts/occurrences?limit=N
        .route("/ws/samples", get(ws::ws_samples)) // WS /ws/samples
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
