// Config loading and validation tests

use hostmetrics::config::AppConfig;
use hostmetrics::models::{ChartSize, ProbeType};

const VALID_CONFIG: &str = r#"
[collector]
hostname = "nas"
interval_secs = 30
report_window_hours = 6
retention_hours = 48

[database]
path = "data/samples.db"
max_pool_size = 2

[server]
port = 8081
host = "127.0.0.1"

[publishing]
broadcast_capacity = 8

[[probes]]
type = "load"

[[probes]]
type = "cpu"
size = "half"

[[probes]]
type = "net"
device = " eth0 "

[[probes]]
type = "disk"
device = "sda+sdb"
label = "Mirror"
"#;

const MINIMAL_CONFIG: &str = r#"
[collector]

[database]
path = "samples.db"

[[probes]]
type = "mem"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.collector.hostname.as_deref(), Some("nas"));
    assert_eq!(config.collector.interval_secs, 30);
    assert_eq!(config.interval(), std::time::Duration::from_secs(30));
    assert_eq!(config.report_window(), chrono::Duration::hours(6));
    assert_eq!(config.retention(), Some(chrono::Duration::hours(48)));
    assert_eq!(config.database.max_pool_size, 2);
    assert_eq!(config.server.port, 8081);
    assert!(config.server.enabled);
    assert_eq!(config.publishing.broadcast_capacity, 8);
    assert_eq!(config.resolved_hostname(), "nas");
}

#[test]
fn test_probe_order_and_normalization() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    let types: Vec<_> = config.probes.iter().map(|p| p.probe_type).collect();
    assert_eq!(
        types,
        vec![ProbeType::Load, ProbeType::Cpu, ProbeType::Net, ProbeType::Disk]
    );
    assert_eq!(config.probes[1].size, ChartSize::Half);
    assert_eq!(config.probes[0].size, ChartSize::Full);
    // device trimmed, label defaults to device
    assert_eq!(config.probes[2].device.as_deref(), Some("eth0"));
    assert_eq!(config.probes[2].label.as_deref(), Some("eth0"));
    assert_eq!(config.probes[3].label.as_deref(), Some("Mirror"));
    assert_eq!(config.probes[3].devices(), vec!["sda", "sdb"]);
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).unwrap();
    assert_eq!(config.collector.interval_secs, 60);
    assert_eq!(config.collector.report_window_hours, 12);
    assert_eq!(config.collector.retention_hours, 720);
    assert_eq!(config.database.max_pool_size, 4);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.publishing.broadcast_capacity, 16);
    assert!(!config.resolved_hostname().is_empty());
}

#[test]
fn test_negative_retention_disables_pruning() {
    let cfg = MINIMAL_CONFIG.replace("[collector]", "[collector]\nretention_hours = -1");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(config.retention(), None);
}

#[test]
fn test_config_validation_rejects_zero_interval() {
    let bad = VALID_CONFIG.replace("interval_secs = 30", "interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collector.interval_secs"));
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_zero_broadcast_capacity() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 8", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("publishing.broadcast_capacity"));
}

#[test]
fn test_config_rejects_missing_device() {
    let bad = format!("{}\n[[probes]]\ntype = \"zfs\"\n", VALID_CONFIG);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("requires a device"));

    let blank = VALID_CONFIG.replace("device = \"sda+sdb\"", "device = \" + \"");
    let err = AppConfig::load_from_str(&blank).unwrap_err();
    assert!(err.to_string().contains("requires a device"));
}

#[test]
fn test_config_rejects_duplicate_probe() {
    let bad = format!("{}\n[[probes]]\ntype = \"net\"\ndevice = \"eth0\"\n", VALID_CONFIG);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("duplicate probe"));
}

#[test]
fn test_config_rejects_unknown_probe_type() {
    let bad = format!("{}\n[[probes]]\ntype = \"temperature\"\n", VALID_CONFIG);
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_requires_probes() {
    let bad = "probes = []\n[collector]\n[database]\npath = \"x.db\"\n";
    assert!(AppConfig::load_from_str(bad).is_err());
}

#[test]
fn test_config_rejects_out_of_range_retention() {
    let bad = VALID_CONFIG.replace("retention_hours = 48", "retention_hours = 10000000000");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collector.retention_hours"));

    let max = VALID_CONFIG.replace(
        "retention_hours = 48",
        &format!("retention_hours = {}", hostmetrics::config::MAX_HOURS),
    );
    let config = AppConfig::load_from_str(&max).unwrap();
    assert_eq!(
        config.retention(),
        Some(chrono::Duration::hours(hostmetrics::config::MAX_HOURS))
    );
}

#[test]
fn test_config_rejects_out_of_range_interval_and_window() {
    let bad = VALID_CONFIG.replace("interval_secs = 30", "interval_secs = 86401");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collector.interval_secs"));

    let bad = VALID_CONFIG.replace("report_window_hours = 6", "report_window_hours = 4000000000");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collector.report_window_hours"));
}
