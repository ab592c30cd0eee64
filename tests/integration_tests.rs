// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum_test::TestServer;
use common::{HOST, temp_store, tms};
use hostmetrics::config::AppConfig;
use hostmetrics::models::{ComputedSample, CycleReport, CycleTimings, SeriesKind};
use hostmetrics::routes;
use hostmetrics::store::TimeseriesStore;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{broadcast, watch};

const TEST_CONFIG: &str = r#"
[collector]
hostname = "testhost"
interval_secs = 60
report_window_hours = 12

[database]
path = "data/test.db"
max_pool_size = 2

[server]
port = 8081
host = "0.0.0.0"

[publishing]
broadcast_capacity = 10

[[probes]]
type = "cpu"

[[probes]]
type = "net"
device = "eth0"
"#;

struct TestApp {
    app: axum::Router,
    store: Arc<TimeseriesStore>,
    latest_tx: watch::Sender<Option<CycleReport>>,
    cycles_tx: broadcast::Sender<CycleReport>,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let (dir, store) = temp_store().await;
    let store = Arc::new(store);
    let (cycles_tx, _) = broadcast::channel(config.publishing.broadcast_capacity);
    let (latest_tx, latest_rx) = watch::channel(None);
    let app = routes::app(
        store.clone(),
        &config.resolved_hostname(),
        latest_rx,
        cycles_tx.clone(),
        config,
    );
    TestApp {
        app,
        store,
        latest_tx,
        cycles_tx,
        _dir: dir,
    }
}

fn report(cycle: u64) -> CycleReport {
    CycleReport {
        cycle,
        collect_tms: tms(60 * cycle as i64),
        samples_persisted: 3,
        timings: CycleTimings {
            collect_ms: 1.5,
            persist_ms: 2.5,
            report_ms: 0.1,
            maintain_ms: None,
        },
    }
}

#[tokio::test]
async fn test_version_endpoint() {
    let t = test_app().await;
    let server = TestServer::new(t.app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("hostmetrics")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_runtime_endpoint_before_first_cycle() {
    let t = test_app().await;
    let server = TestServer::new(t.app);
    let response = server.get("/api/runtime").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["hostname"], "testhost");
    assert_eq!(json["intervalSecs"], 60);
    assert!(json["lastCycle"].is_null());
    let datasets = json["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["probe"]["type"], "cpu");
    assert_eq!(datasets[0]["dataset"]["family"], "cpu");
    assert_eq!(datasets[1]["probe"]["device"], "eth0");
    assert!(datasets[1]["dataset"]["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_runtime_endpoint_serves_recent_points() {
    let t = test_app().await;
    let now = chrono::Utc::now();
    let old = now - chrono::Duration::hours(13);
    let mut session = t.store.session().await.unwrap();
    session
        .insert_batch(
            HOST,
            &[
                ComputedSample::new(SeriesKind::Cpu, old, 99.0),
                ComputedSample::new(SeriesKind::Cpu, now, 42.0),
                ComputedSample::for_device(SeriesKind::NetTx, "eth0", now, 0.5),
                ComputedSample::for_device(SeriesKind::NetRx, "eth0", now, 1.0),
            ],
        )
        .await
        .unwrap();
    drop(session);
    t.latest_tx.send_replace(Some(report(7)));

    let server = TestServer::new(t.app);
    let json: serde_json::Value = server.get("/api/runtime").await.json();
    assert_eq!(json["lastCycle"]["cycle"], 7);
    assert_eq!(json["lastCycle"]["timings"]["persistMs"], 2.5);

    let cpu_rows = json["datasets"][0]["dataset"]["rows"].as_array().unwrap();
    assert_eq!(cpu_rows.len(), 1, "rows outside the report window are excluded");
    assert_eq!(cpu_rows[0]["value"], 42.0);
    let net_rows = json["datasets"][1]["dataset"]["rows"].as_array().unwrap();
    assert_eq!(net_rows[0]["tx"], 0.5);
    assert_eq!(net_rows[0]["rx"], 1.0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let t = test_app().await;
    let server = TestServer::new(t.app);
    server.get("/api/nothing").await.assert_status_not_found();
}

// --- WebSocket message tests (require http_transport + ws feature) ---
// Receive until we get a JSON message of the wanted type (server may send Ping first).

async fn receive_json_of_type(ws: &mut axum_test::TestWebSocket, kind: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text)
            && v["type"] == kind
        {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} message",
            kind
        );
    }
}

#[tokio::test]
async fn test_ws_cycles_sends_latest_then_stream() {
    let t = test_app().await;
    t.latest_tx.send_replace(Some(report(1)));
    let server = TestServer::builder().http_transport().build(t.app);
    let mut ws = server
        .get_websocket("/ws/cycles")
        .await
        .into_websocket()
        .await;

    let latest = receive_json_of_type(&mut ws, "latest").await;
    assert_eq!(latest["report"]["cycle"], 1);

    let tx = t.cycles_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let _ = tx.send(report(2));
    });
    let cycle = receive_json_of_type(&mut ws, "cycle").await;
    assert_eq!(cycle["report"]["cycle"], 2);
    assert_eq!(cycle["report"]["samplesPersisted"], 3);
}
