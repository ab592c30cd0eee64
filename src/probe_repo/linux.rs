// Linux probes: /proc virtual filesystem. All values normalized to bytes here.

use std::path::PathBuf;
use tracing::instrument;

use crate::error::CollectError;
use crate::models::{RawSample, split_devices};

/// Bytes per sector in /proc/diskstats, fixed at 512 regardless of the device's real sector size.
const SECTOR_SIZE: u64 = 512;
/// /proc/meminfo reports "kB" that are really KiB.
const KIB: u64 = 1024;

#[derive(Debug, Clone)]
pub struct LinuxProbes {
    proc_root: PathBuf,
}

impl Default for LinuxProbes {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl LinuxProbes {
    /// Reads from `root` instead of `/proc` (e.g. a container bind mount).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }

    async fn read(&self, relative: &str) -> Result<String, CollectError> {
        let path = self.proc_root.join(relative);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CollectError::Io {
                path: path.display().to_string(),
                source,
            })
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_load"))]
    pub async fn load(&self) -> Result<RawSample, CollectError> {
        parse_loadavg(&self.read("loadavg").await?)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_cpu"))]
    pub async fn cpu(&self) -> Result<RawSample, CollectError> {
        parse_stat(&self.read("stat").await?)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_mem"))]
    pub async fn mem(&self) -> Result<RawSample, CollectError> {
        parse_meminfo(&self.read("meminfo").await?)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_net"))]
    pub async fn net(&self, device: &str) -> Result<RawSample, CollectError> {
        parse_net_dev(&self.read("net/dev").await?, device)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_disk"))]
    pub async fn disk(&self, device: &str) -> Result<RawSample, CollectError> {
        parse_diskstats(&self.read("diskstats").await?, device)
    }
}

fn parse_u64(source: &str, token: &str) -> Result<u64, CollectError> {
    token
        .parse::<u64>()
        .map_err(|e| CollectError::parse(source, format!("'{}': {}", token, e)))
}

/// `0.34 0.24 0.20 1/144 40571`
pub(crate) fn parse_loadavg(content: &str) -> Result<RawSample, CollectError> {
    let fields: Vec<&str> = content.split_whitespace().take(3).collect();
    let [load1, load5, load15] = fields[..] else {
        return Err(CollectError::parse("/proc/loadavg", "expected three load averages"));
    };
    let parse = |t: &str| {
        t.parse::<f64>()
            .map_err(|e| CollectError::parse("/proc/loadavg", format!("'{}': {}", t, e)))
    };
    Ok(RawSample::Load {
        load1: parse(load1)?,
        load5: parse(load5)?,
        load15: parse(load15)?,
    })
}

/// Aggregate `cpu` line: user nice system idle iowait irq softirq ... (ticks).
/// Idle time includes iowait.
pub(crate) fn parse_stat(content: &str) -> Result<RawSample, CollectError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CollectError::parse("/proc/stat", "missing aggregate cpu line"))?;
    let ticks = line
        .split_whitespace()
        .skip(1)
        .map(|t| parse_u64("/proc/stat", t))
        .collect::<Result<Vec<_>, _>>()?;
    if ticks.len() < 4 {
        return Err(CollectError::parse(
            "/proc/stat",
            format!("expected at least 4 cpu fields, got {}", ticks.len()),
        ));
    }
    let total_time = ticks.iter().sum();
    let idle_time = ticks[3] + ticks.get(4).copied().unwrap_or(0);
    Ok(RawSample::Cpu {
        total_time,
        idle_time,
    })
}

/// used = MemTotal - MemAvailable, cache = Cached + Buffers + SReclaimable, swap = SwapTotal - SwapFree.
pub(crate) fn parse_meminfo(content: &str) -> Result<RawSample, CollectError> {
    let (mut total, mut available, mut buffers, mut cached, mut reclaimable) = (0, 0, 0, 0, 0);
    let (mut swap_total, mut swap_free) = (0, 0);
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total,
            "MemAvailable" => &mut available,
            "Buffers" => &mut buffers,
            "Cached" => &mut cached,
            "SReclaimable" => &mut reclaimable,
            "SwapTotal" => &mut swap_total,
            "SwapFree" => &mut swap_free,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| CollectError::parse("/proc/meminfo", format!("no value for {}", key)))?;
        *slot = parse_u64("/proc/meminfo", value)? * KIB;
    }
    Ok(RawSample::Mem {
        mem_used: total.saturating_sub(available),
        cache_used: cached + buffers + reclaimable,
        swap_used: swap_total.saturating_sub(swap_free),
    })
}

/// Sums rx/tx bytes over every interface named in `device`; unknown names count as zero.
pub(crate) fn parse_net_dev(content: &str, device: &str) -> Result<RawSample, CollectError> {
    let wanted = split_devices(device);
    let (mut rx_bytes, mut tx_bytes) = (0, 0);
    for line in content.lines() {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        if !wanted.contains(&name.trim()) {
            continue;
        }
        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < 9 {
            return Err(CollectError::parse(
                "/proc/net/dev",
                format!("short line for {}", name.trim()),
            ));
        }
        rx_bytes += parse_u64("/proc/net/dev", fields[0])?;
        tx_bytes += parse_u64("/proc/net/dev", fields[8])?;
    }
    Ok(RawSample::Net {
        device: device.to_string(),
        rx_bytes,
        tx_bytes,
    })
}

/// Field 3 is the device name, field 6 sectors read, field 10 sectors written.
pub(crate) fn parse_diskstats(content: &str, device: &str) -> Result<RawSample, CollectError> {
    let wanted = split_devices(device);
    let (mut read_bytes, mut write_bytes) = (0, 0);
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !wanted.contains(&fields[2]) {
            continue;
        }
        read_bytes += parse_u64("/proc/diskstats", fields[5])? * SECTOR_SIZE;
        write_bytes += parse_u64("/proc/diskstats", fields[9])? * SECTOR_SIZE;
    }
    Ok(RawSample::Disk {
        device: device.to_string(),
        read_bytes,
        write_bytes,
    })
}
