// Raw samples: values read straight from the OS, one per probe per cycle

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    Load {
        load1: f64,
        load5: f64,
        load15: f64,
    },
    /// Since-boot tick counters.
    Cpu { total_time: u64, idle_time: u64 },
    /// Instantaneous byte counts.
    Mem {
        mem_used: u64,
        cache_used: u64,
        swap_used: u64,
    },
    Net {
        device: String,
        rx_bytes: u64,
        tx_bytes: u64,
    },
    /// Block device or ZFS pool byte counters.
    Disk {
        device: String,
        read_bytes: u64,
        write_bytes: u64,
    },
    /// Utilization averaged across all detected GPUs.
    Gpu { load_percent: f64 },
}

impl RawSample {
    pub fn kind(&self) -> &'static str {
        match self {
            RawSample::Load { .. } => "load",
            RawSample::Cpu { .. } => "cpu",
            RawSample::Mem { .. } => "mem",
            RawSample::Net { .. } => "net",
            RawSample::Disk { .. } => "disk",
            RawSample::Gpu { .. } => "gpu",
        }
    }
}

/// One collection cycle: timestamp plus raw samples aligned 1:1 with the configured probes.
#[derive(Debug, Clone)]
pub struct CollectResult {
    pub collect_tms: DateTime<Utc>,
    pub raw_samples: Vec<RawSample>,
}

impl CollectResult {
    pub fn new(collect_tms: DateTime<Utc>, raw_samples: Vec<RawSample>) -> Self {
        Self {
            collect_tms,
            raw_samples,
        }
    }
}
