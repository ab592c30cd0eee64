// Chart datasets read back from the series table, one row shape per probe family

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRow {
    pub sample_tms: DateTime<Utc>,
    pub load1m: Option<f64>,
    pub load5m: Option<f64>,
    pub load15m: Option<f64>,
}

/// Single-value series (cpu, gpu).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRow {
    pub sample_tms: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemRow {
    pub sample_tms: DateTime<Utc>,
    pub mem: Option<f64>,
    pub swap: Option<f64>,
    pub cache: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetRow {
    pub sample_tms: DateTime<Utc>,
    pub tx: Option<f64>,
    pub rx: Option<f64>,
}

/// Disk and zfs probes share the same series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskRow {
    pub sample_tms: DateTime<Utc>,
    pub read: Option<f64>,
    pub write: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", content = "rows", rename_all = "lowercase")]
pub enum Dataset {
    Load(Vec<LoadRow>),
    Cpu(Vec<ValueRow>),
    Mem(Vec<MemRow>),
    Net(Vec<NetRow>),
    Disk(Vec<DiskRow>),
    Gpu(Vec<ValueRow>),
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Load(rows) => rows.len(),
            Dataset::Cpu(rows) | Dataset::Gpu(rows) => rows.len(),
            Dataset::Mem(rows) => rows.len(),
            Dataset::Net(rows) => rows.len(),
            Dataset::Disk(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
