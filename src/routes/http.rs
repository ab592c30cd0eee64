// GET handlers: version, api/runtime

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use std::time::Instant;

use super::AppState;
use crate::models::as_millis_f64;

/// GET /version: package name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/runtime: last cycle timings plus one dataset per probe over the report window.
pub(super) async fn runtime_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let started = Instant::now();
    let now = Utc::now();
    let since = now
        .checked_sub_signed(state.config.report_window())
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut datasets = Vec::with_capacity(state.probes.len());
    for probe in state.probes.iter() {
        let dataset = state
            .store
            .read_dataset(&state.hostname, probe, since)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, operation = "read_dataset", probe = %probe.describe(), "Dataset query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            })?;
        datasets.push(serde_json::json!({ "probe": probe, "dataset": dataset }));
    }
    let last_cycle = state.latest_rx.borrow().clone();

    Ok(Json(serde_json::json!({
        "hostname": state.hostname.as_ref(),
        "intervalSecs": state.config.collector.interval_secs,
        "reportWindowHours": state.config.collector.report_window_hours,
        "generatedTms": now,
        "since": since,
        "lastCycle": last_cycle,
        "datasets": datasets,
        "queryMs": as_millis_f64(started.elapsed()),
    })))
}
