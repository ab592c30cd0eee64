// HTTP + WebSocket report API (read-only)

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::models::{CycleReport, Probe};
use crate::store::TimeseriesStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<TimeseriesStore>,
    pub(crate) hostname: Arc<str>,
    pub(crate) probes: Arc<Vec<Probe>>,
    pub(crate) latest_rx: watch::Receiver<Option<CycleReport>>,
    pub(crate) cycles_tx: broadcast::Sender<CycleReport>,
    pub(crate) config: AppConfig,
}

pub fn app(
    store: Arc<TimeseriesStore>,
    hostname: &str,
    latest_rx: watch::Receiver<Option<CycleReport>>,
    cycles_tx: broadcast::Sender<CycleReport>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        store,
        hostname: Arc::from(hostname),
        probes: Arc::new(config.probes.clone()),
        latest_rx,
        cycles_tx,
        config,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/runtime", get(http::runtime_handler)) // GET /api/runtime
        .route("/ws/cycles", get(ws::ws_cycles)) // WS /ws/cycles
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
