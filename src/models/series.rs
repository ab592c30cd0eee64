// Computed samples: the persisted time-series points

use chrono::{DateTime, Utc};
use std::fmt;

/// `probe_type` column of the series table. Distinct from the configuration [`super::ProbeType`]:
/// one probe fans out to one or more series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Load1m,
    Load5m,
    Load15m,
    Cpu,
    Mem,
    Swap,
    Cache,
    NetTx,
    NetRx,
    DiskRead,
    DiskWrite,
    Gpu,
}

impl SeriesKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKind::Load1m => "load1m",
            SeriesKind::Load5m => "load5m",
            SeriesKind::Load15m => "load15m",
            SeriesKind::Cpu => "cpu",
            SeriesKind::Mem => "mem",
            SeriesKind::Swap => "swap",
            SeriesKind::Cache => "cache",
            SeriesKind::NetTx => "net_tx",
            SeriesKind::NetRx => "net_rx",
            SeriesKind::DiskRead => "disk_read",
            SeriesKind::DiskWrite => "disk_write",
            SeriesKind::Gpu => "gpu",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of a series. The hostname is attached by the store on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedSample {
    pub kind: SeriesKind,
    pub device: Option<String>,
    pub sample_tms: DateTime<Utc>,
    pub value: f64,
}

impl ComputedSample {
    pub fn new(kind: SeriesKind, sample_tms: DateTime<Utc>, value: f64) -> Self {
        Self {
            kind,
            device: None,
            sample_tms,
            value,
        }
    }

    pub fn for_device(
        kind: SeriesKind,
        device: &str,
        sample_tms: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            kind,
            device: Some(device.to_string()),
            sample_tms,
            value,
        }
    }
}
