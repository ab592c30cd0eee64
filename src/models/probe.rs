// Probe configuration: what to sample, on which device, and how it is charted

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used to aggregate several underlying devices into one logical probe (e.g. "sda+sdb").
const DEVICE_SEPARATOR: char = '+';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeType {
    Load,
    Cpu,
    Mem,
    Net,
    Disk,
    Zfs,
    Gpu,
}

impl ProbeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeType::Load => "load",
            ProbeType::Cpu => "cpu",
            ProbeType::Mem => "mem",
            ProbeType::Net => "net",
            ProbeType::Disk => "disk",
            ProbeType::Zfs => "zfs",
            ProbeType::Gpu => "gpu",
        }
    }

    /// Net, disk and zfs probes read per-device counters and need a device name.
    pub fn requires_device(self) -> bool {
        matches!(self, ProbeType::Net | ProbeType::Disk | ProbeType::Zfs)
    }
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSize {
    #[default]
    Full,
    Half,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    #[serde(rename = "type")]
    pub probe_type: ProbeType,
    #[serde(default)]
    pub size: ChartSize,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Probe {
    pub fn new(probe_type: ProbeType) -> Self {
        Self {
            probe_type,
            size: ChartSize::Full,
            device: None,
            label: None,
        }
    }

    pub fn with_device(probe_type: ProbeType, device: &str) -> Self {
        Self {
            probe_type,
            size: ChartSize::Full,
            device: Some(device.to_string()),
            label: Some(device.to_string()),
        }
    }

    /// Underlying device names, split on `+`. Empty when the probe has no device.
    pub fn devices(&self) -> Vec<&str> {
        self.device
            .as_deref()
            .map(split_devices)
            .unwrap_or_default()
    }

    pub fn describe(&self) -> String {
        match (&self.device, &self.label) {
            (Some(device), Some(label)) => format!(
                "type: {}, size: {:?}, device: {}, label: {}",
                self.probe_type, self.size, device, label
            ),
            (Some(device), None) => format!(
                "type: {}, size: {:?}, device: {}",
                self.probe_type, self.size, device
            ),
            _ => format!("type: {}, size: {:?}", self.probe_type, self.size),
        }
    }
}

pub fn split_devices(device: &str) -> Vec<&str> {
    device
        .split(DEVICE_SEPARATOR)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect()
}
