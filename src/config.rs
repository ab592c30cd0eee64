use crate::models::{Probe, ProbeType, split_devices};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Longest accepted collection interval: one day.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// Longest accepted retention or report window: one hundred years.
pub const MAX_HOURS: i64 = 100 * 365 * 24;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    /// Chart order follows this list.
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Defaults to the OS host name.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_report_window_hours")]
    pub report_window_hours: u32,
    /// Negative disables retention pruning.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_report_window_hours() -> u32 {
    12
}

fn default_retention_hours() -> i64 {
    24 * 30
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

fn default_max_pool_size() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of cycle reports kept in the broadcast channel for /ws/cycles (slow clients may lag).
    pub broadcast_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse, normalize and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Trims device names; device probes without a label are labelled with their device.
    fn normalize(&mut self) {
        for probe in &mut self.probes {
            if let Some(device) = probe.device.as_mut() {
                *device = device.trim().to_string();
            }
            if probe.device.as_deref() == Some("") {
                probe.device = None;
            }
            if probe.label.is_none() && probe.probe_type.requires_device() {
                probe.label = probe.device.clone();
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_INTERVAL_SECS).contains(&self.collector.interval_secs),
            "collector.interval_secs must be between 1 and {}, got {}",
            MAX_INTERVAL_SECS,
            self.collector.interval_secs
        );
        anyhow::ensure!(
            (1..=MAX_HOURS).contains(&i64::from(self.collector.report_window_hours)),
            "collector.report_window_hours must be between 1 and {}, got {}",
            MAX_HOURS,
            self.collector.report_window_hours
        );
        anyhow::ensure!(
            self.collector.retention_hours <= MAX_HOURS,
            "collector.retention_hours must be at most {} (negative disables pruning), got {}",
            MAX_HOURS,
            self.collector.retention_hours
        );
        if let Some(hostname) = &self.collector.hostname {
            anyhow::ensure!(
                !hostname.trim().is_empty(),
                "collector.hostname must be non-empty when set"
            );
        }
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            !self.server.enabled || self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(!self.probes.is_empty(), "at least one [[probes]] entry is required");

        let mut seen: HashSet<(ProbeType, Option<&str>)> = HashSet::new();
        for (i, probe) in self.probes.iter().enumerate() {
            if probe.probe_type.requires_device() {
                let device = probe.device.as_deref().unwrap_or_default();
                anyhow::ensure!(
                    !split_devices(device).is_empty(),
                    "probes[{}]: type {} requires a device",
                    i,
                    probe.probe_type
                );
            }
            anyhow::ensure!(
                seen.insert((probe.probe_type, probe.device.as_deref())),
                "probes[{}]: duplicate probe {}",
                i,
                probe.describe()
            );
        }
        Ok(())
    }

    /// Configured hostname, else the OS host name, else "localhost".
    pub fn resolved_hostname(&self) -> String {
        self.collector
            .hostname
            .as_ref()
            .map(|h| h.trim().to_string())
            .or_else(sysinfo::System::host_name)
            .unwrap_or_else(|| "localhost".into())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collector.interval_secs)
    }

    /// `None` when retention is disabled.
    pub fn retention(&self) -> Option<chrono::Duration> {
        Some(self.collector.retention_hours)
            .filter(|hours| *hours >= 0)
            .and_then(chrono::TimeDelta::try_hours)
    }

    pub fn report_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.collector.report_window_hours))
    }
}
