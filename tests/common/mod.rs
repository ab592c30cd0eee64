// Shared test helpers

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use hostmetrics::store::TimeseriesStore;
use std::path::Path;
use tempfile::TempDir;

pub const HOST: &str = "testhost";

pub fn tms(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Fresh store in a temp dir. Keep the `TempDir` alive for the duration of the test.
pub async fn temp_store() -> (TempDir, TimeseriesStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("samples.db");
    let store = TimeseriesStore::connect(path.to_str().unwrap(), 2)
        .await
        .unwrap();
    store.init().await.unwrap();
    (dir, store)
}

/// Minimal fake procfs: every file the Linux probes read.
pub fn write_fake_proc(root: &Path, cpu_total_idle: (u64, u64), net_rx_tx: (u64, u64), disk_sectors: (u64, u64)) {
    std::fs::create_dir_all(root.join("net")).unwrap();
    std::fs::write(root.join("loadavg"), "0.50 0.40 0.30 1/100 4242\n").unwrap();
    let (total, idle) = cpu_total_idle;
    // user nice system idle iowait: total = user + idle
    std::fs::write(
        root.join("stat"),
        format!("cpu  {} 0 0 {} 0 0 0 0 0 0\ncpu0 1 1 1 1 1\n", total - idle, idle),
    )
    .unwrap();
    std::fs::write(
        root.join("meminfo"),
        "MemTotal: 2097152 kB\nMemAvailable: 1048576 kB\nBuffers: 0 kB\nCached: 102400 kB\nSReclaimable: 0 kB\nSwapTotal: 0 kB\nSwapFree: 0 kB\n",
    )
    .unwrap();
    let (rx, tx) = net_rx_tx;
    std::fs::write(
        root.join("net").join("dev"),
        format!(
            "Inter-|   Receive |  Transmit\n face |bytes packets|bytes packets\n  eth0: {} 0 0 0 0 0 0 0 {} 0 0 0 0 0 0 0\n",
            rx, tx
        ),
    )
    .unwrap();
    let (read, write) = disk_sectors;
    std::fs::write(
        root.join("diskstats"),
        format!("   8       0 sda 0 0 {} 0 0 0 {} 0 0 0 0\n   8      16 sdb 0 0 {} 0 0 0 {} 0 0 0 0\n", read, write, read, write),
    )
    .unwrap();
}
