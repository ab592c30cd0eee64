// Per-cycle runtime figures exposed to the report layer

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Elapsed phase durations, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleTimings {
    pub collect_ms: f64,
    pub persist_ms: f64,
    pub report_ms: f64,
    /// Only set on cycles that ran retention and maintenance.
    pub maintain_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycle: u64,
    pub collect_tms: DateTime<Utc>,
    pub samples_persisted: usize,
    pub timings: CycleTimings,
}

pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
