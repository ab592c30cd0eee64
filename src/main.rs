use anyhow::Result;
use hostmetrics::*;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let hostname = app_config.resolved_hostname();
    let platform = probe_repo::Platform::detect()?;
    for probe in &app_config.probes {
        tracing::info!(probe = %probe.describe(), "Configured probe");
    }

    let store = Arc::new(
        store::TimeseriesStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    store.init().await?;

    let (cycles_tx, _) =
        broadcast::channel::<models::CycleReport>(app_config.publishing.broadcast_capacity);
    let (latest_tx, latest_rx) = watch::channel::<Option<models::CycleReport>>(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = scheduler::Scheduler::new(
        scheduler::SchedulerDeps {
            collector: probe_repo::ProbeCollector::for_platform(platform),
            store: store.clone(),
            probes: Arc::new(app_config.probes.clone()),
            report_tx: cycles_tx.clone(),
            latest_tx,
            shutdown_rx,
        },
        scheduler::SchedulerConfig {
            hostname: hostname.clone(),
            interval: app_config.interval(),
            retention: app_config.retention(),
            maintenance_interval: scheduler::DEFAULT_MAINTENANCE_INTERVAL,
        },
    )?;
    let mut scheduler_handle = scheduler::spawn(scheduler);

    if app_config.server.enabled {
        let app = routes::app(
            store.clone(),
            &hostname,
            latest_rx,
            cycles_tx,
            app_config.clone(),
        );
        let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Listening on http://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });
    }

    let joined = tokio::select! {
        joined = &mut scheduler_handle => joined,
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            scheduler_handle.await
        }
    };
    let result = joined.map_err(|e| anyhow::anyhow!("scheduler task: {}", e))?;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Scheduler failed, exiting");
    }
    result
}
