// FreeBSD probes: sysctl, swapinfo, netstat and iostat output.

use tracing::instrument;

use super::command::{CommandRunner, SystemRunner};
use crate::error::CollectError;
use crate::models::{RawSample, split_devices};

const KIB: u64 = 1024;

/// Page-based memory counters, in the order they are requested from sysctl.
const VM_OIDS: [&str; 8] = [
    "vm.stats.vm.v_page_size",
    "vm.stats.vm.v_active_count",
    "vm.stats.vm.v_inactive_count",
    "vm.stats.vm.v_laundry_count",
    "vm.stats.vm.v_wire_count",
    "vm.stats.vm.v_cache_count",
    "vfs.bufspace",
    "kstat.zfs.misc.arcstats.size",
];

#[derive(Debug, Clone, Default)]
pub struct FreeBsdProbes {
    runner: SystemRunner,
}

impl FreeBsdProbes {
    #[instrument(skip(self), fields(repo = "probe", operation = "collect_load"))]
    pub async fn load(&self) -> Result<RawSample, CollectError> {
        let out = self.runner.run_checked("sysctl", &["vm.loadavg"]).await?;
        parse_loadavg(&out)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_cpu"))]
    pub async fn cpu(&self) -> Result<RawSample, CollectError> {
        let out = self.runner.run_checked("sysctl", &["kern.cp_time"]).await?;
        parse_cp_time(&out)
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_mem"))]
    pub async fn mem(&self) -> Result<RawSample, CollectError> {
        collect_mem(&self.runner).await
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_net"))]
    pub async fn net(&self, device: &str) -> Result<RawSample, CollectError> {
        collect_net(&self.runner, device).await
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_disk"))]
    pub async fn disk(&self, device: &str) -> Result<RawSample, CollectError> {
        collect_disk(&self.runner, device).await
    }

    #[instrument(skip(self), fields(repo = "probe", operation = "collect_zfs"))]
    pub async fn zfs(&self, device: &str) -> Result<RawSample, CollectError> {
        collect_zfs(&self.runner, device).await
    }
}

async fn collect_mem(runner: &impl CommandRunner) -> Result<RawSample, CollectError> {
    // sysctl exits non-zero on an unknown oid (no ZFS module), but still prints the other values
    let vm = runner.run("sysctl", &VM_OIDS).await?;
    let (mem_used, cache_used) = parse_vm_counters(&vm.stdout)?;
    let swap = runner.run_checked("swapinfo", &["-k"]).await?;
    Ok(RawSample::Mem {
        mem_used,
        cache_used,
        swap_used: parse_swapinfo(&swap)?,
    })
}

/// One `netstat` call per interface; counters are summed.
async fn collect_net(runner: &impl CommandRunner, device: &str) -> Result<RawSample, CollectError> {
    let (mut rx_bytes, mut tx_bytes) = (0, 0);
    for interface in split_devices(device) {
        let out = runner
            .run_checked("netstat", &["-b", "-n", "-I", interface])
            .await?;
        let (rx, tx) = parse_netstat(&out, interface)?;
        rx_bytes += rx;
        tx_bytes += tx;
    }
    Ok(RawSample::Net {
        device: device.to_string(),
        rx_bytes,
        tx_bytes,
    })
}

/// A single `iostat` call covering every device.
async fn collect_disk(runner: &impl CommandRunner, device: &str) -> Result<RawSample, CollectError> {
    let devices = split_devices(device);
    let mut args = vec!["-Ix"];
    args.extend(devices.iter().copied());
    let out = runner.run_checked("iostat", &args).await?;
    let (read_bytes, write_bytes) = parse_iostat(&out, &devices)?;
    Ok(RawSample::Disk {
        device: device.to_string(),
        read_bytes,
        write_bytes,
    })
}

async fn collect_zfs(runner: &impl CommandRunner, device: &str) -> Result<RawSample, CollectError> {
    let (mut read_bytes, mut write_bytes) = (0, 0);
    for pool in split_devices(device) {
        let oid = format!("kstat.zfs.{}.dataset", pool);
        // an unknown pool is an unknown oid: lenient, contributes zero
        let out = runner.run("sysctl", &[oid.as_str()]).await?;
        let (read, write) = parse_zfs_dataset(&out.stdout, pool)?;
        read_bytes += read;
        write_bytes += write;
    }
    Ok(RawSample::Disk {
        device: device.to_string(),
        read_bytes,
        write_bytes,
    })
}

fn parse_u64(source: &str, token: &str) -> Result<u64, CollectError> {
    token
        .parse::<u64>()
        .map_err(|e| CollectError::parse(source, format!("'{}': {}", token, e)))
}

fn parse_f64(source: &str, token: &str) -> Result<f64, CollectError> {
    token
        .parse::<f64>()
        .map_err(|e| CollectError::parse(source, format!("'{}': {}", token, e)))
}

/// `vm.loadavg: { 0.34 0.24 0.20 }`
pub(crate) fn parse_loadavg(content: &str) -> Result<RawSample, CollectError> {
    let values: Vec<&str> = content
        .split_whitespace()
        .filter(|t| !t.ends_with(':') && *t != "{" && *t != "}")
        .collect();
    if values.len() < 3 {
        return Err(CollectError::parse("vm.loadavg", content.trim()));
    }
    Ok(RawSample::Load {
        load1: parse_f64("vm.loadavg", values[0])?,
        load5: parse_f64("vm.loadavg", values[1])?,
        load15: parse_f64("vm.loadavg", values[2])?,
    })
}

/// `kern.cp_time: user nice system interrupt idle`
pub(crate) fn parse_cp_time(content: &str) -> Result<RawSample, CollectError> {
    let ticks = content
        .split_whitespace()
        .skip(1)
        .map(|t| parse_u64("kern.cp_time", t))
        .collect::<Result<Vec<_>, _>>()?;
    if ticks.len() != 5 {
        return Err(CollectError::parse(
            "kern.cp_time",
            format!("expected 5 values, got {}", ticks.len()),
        ));
    }
    Ok(RawSample::Cpu {
        total_time: ticks.iter().sum(),
        idle_time: ticks[4],
    })
}

/// Returns `(mem_used, cache_used)` in bytes. The ARC is moved from wired memory to cache;
/// an `unknown oid` line (ZFS not loaded) counts as zero.
pub(crate) fn parse_vm_counters(content: &str) -> Result<(u64, u64), CollectError> {
    let mut values = [0u64; VM_OIDS.len()];
    for line in content.lines() {
        if line.contains("unknown oid") {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if let Some(i) = VM_OIDS.iter().position(|oid| *oid == name.trim()) {
            values[i] = parse_u64("sysctl vm.stats", value.trim())?;
        }
    }
    let [page_size, active, inactive, laundry, wire, cache, bufspace, arc] = values;
    if page_size == 0 {
        return Err(CollectError::parse("sysctl vm.stats", "missing page size"));
    }
    let mem_used = ((active + inactive + laundry + wire) * page_size).saturating_sub(arc);
    let cache_used = cache * page_size + bufspace + arc;
    Ok((mem_used, cache_used))
}

/// Sum of the `Used` column (KiB) over every swap device.
pub(crate) fn parse_swapinfo(content: &str) -> Result<u64, CollectError> {
    let mut used = 0;
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = fields.first() else {
            continue;
        };
        // header row and the multi-device "Total" row
        if first.eq_ignore_ascii_case("device") || first.eq_ignore_ascii_case("total") {
            continue;
        }
        let column = fields
            .get(2)
            .ok_or_else(|| CollectError::parse("swapinfo", format!("short line '{}'", line)))?;
        used += parse_u64("swapinfo", column)? * KIB;
    }
    Ok(used)
}

/// Link-level row of `netstat -b -n -I <if>`: Ibytes is column 8, Obytes column 11.
pub(crate) fn parse_netstat(content: &str, interface: &str) -> Result<(u64, u64), CollectError> {
    let Some(row) = content.lines().find(|l| {
        l.split_whitespace().next() == Some(interface) && l.contains("<Link")
    }) else {
        return Ok((0, 0));
    };
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 11 {
        return Err(CollectError::parse("netstat", format!("short line '{}'", row)));
    }
    Ok((
        parse_u64("netstat", fields[7])?,
        parse_u64("netstat", fields[10])?,
    ))
}

/// `iostat -Ix`: kr/i and kw/i (KiB, decimal) are columns 4 and 5.
pub(crate) fn parse_iostat(content: &str, devices: &[&str]) -> Result<(u64, u64), CollectError> {
    let (mut read, mut write) = (0, 0);
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 || !devices.contains(&fields[0]) {
            continue;
        }
        read += kib_to_bytes(parse_f64("iostat", fields[3])?);
        write += kib_to_bytes(parse_f64("iostat", fields[4])?);
    }
    Ok((read, write))
}

fn kib_to_bytes(kib: f64) -> u64 {
    (kib * KIB as f64).round().max(0.0) as u64
}

/// Sums `.nread` and `.nwritten` over every dataset of `pool`.
pub(crate) fn parse_zfs_dataset(content: &str, pool: &str) -> Result<(u64, u64), CollectError> {
    let prefix = format!("kstat.zfs.{}.dataset", pool);
    let (mut read, mut write) = (0, 0);
    for line in content.lines() {
        if !line.starts_with(&prefix) {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.ends_with(".nread") {
            read += parse_u64("kstat.zfs", value.trim())?;
        } else if name.ends_with(".nwritten") {
            write += parse_u64("kstat.zfs", value.trim())?;
        }
    }
    Ok((read, write))
}
