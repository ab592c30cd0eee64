// Probe collection: one raw sample per configured probe, read from the host OS

mod command;
mod freebsd;
mod gpu;
mod linux;

pub use freebsd::FreeBsdProbes;
pub use linux::LinuxProbes;

use std::fmt;

use crate::error::CollectError;
use command::SystemRunner;
use crate::models::{Probe, ProbeType, RawSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    FreeBsd,
}

impl Platform {
    /// Platform of the running binary.
    pub fn detect() -> anyhow::Result<Self> {
        match std::env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "freebsd" => Ok(Platform::FreeBsd),
            other => anyhow::bail!("unsupported operating system '{}'", other),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Linux => "linux",
            Platform::FreeBsd => "freebsd",
        })
    }
}

/// Platform strategy, selected once at startup.
#[derive(Debug, Clone)]
pub enum ProbeCollector {
    Linux(LinuxProbes),
    FreeBsd(FreeBsdProbes),
}

impl ProbeCollector {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Linux => ProbeCollector::Linux(LinuxProbes::default()),
            Platform::FreeBsd => ProbeCollector::FreeBsd(FreeBsdProbes::default()),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            ProbeCollector::Linux(_) => Platform::Linux,
            ProbeCollector::FreeBsd(_) => Platform::FreeBsd,
        }
    }

    /// Rejects probes this platform cannot read, or that lack a required device.
    pub fn check_supported(&self, probe: &Probe) -> Result<(), CollectError> {
        if probe.probe_type.requires_device() && probe.devices().is_empty() {
            return Err(CollectError::MissingDevice(probe.probe_type));
        }
        if matches!(self, ProbeCollector::Linux(_)) && probe.probe_type == ProbeType::Zfs {
            return Err(CollectError::Unsupported {
                probe: probe.probe_type,
                platform: self.platform(),
            });
        }
        Ok(())
    }

    /// Reads one raw sample. Errors are not retried.
    pub async fn collect(&self, probe: &Probe) -> Result<RawSample, CollectError> {
        self.check_supported(probe)?;
        let device = probe.device.as_deref().unwrap_or_default();
        let sample = match (self, probe.probe_type) {
            (_, ProbeType::Gpu) => gpu::collect(&SystemRunner::default()).await?,
            (ProbeCollector::Linux(p), ProbeType::Load) => p.load().await?,
            (ProbeCollector::Linux(p), ProbeType::Cpu) => p.cpu().await?,
            (ProbeCollector::Linux(p), ProbeType::Mem) => p.mem().await?,
            (ProbeCollector::Linux(p), ProbeType::Net) => p.net(device).await?,
            (ProbeCollector::Linux(p), ProbeType::Disk) => p.disk(device).await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Load) => p.load().await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Cpu) => p.cpu().await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Mem) => p.mem().await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Net) => p.net(device).await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Disk) => p.disk(device).await?,
            (ProbeCollector::FreeBsd(p), ProbeType::Zfs) => p.zfs(device).await?,
            (ProbeCollector::Linux(_), ProbeType::Zfs) => {
                return Err(CollectError::Unsupported {
                    probe: ProbeType::Zfs,
                    platform: Platform::Linux,
                });
            }
        };
        tracing::debug!(probe = %probe.probe_type, ?sample, "Collected sample");
        Ok(sample)
    }
}
