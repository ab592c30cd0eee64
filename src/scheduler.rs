// Collection scheduler: wakes on interval boundaries of the wall clock, collects every probe,
// maps against the previous cycle, persists in one transaction, publishes a report and
// runs retention + maintenance at most once per maintenance interval.

use crate::mapper;
use crate::models::{
    CollectResult, ComputedSample, CycleReport, CycleTimings, Probe, as_millis_f64,
};
use crate::probe_repo::ProbeCollector;
use crate::store::TimeseriesStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::{Duration, Instant};
use tracing::Instrument;

/// Rate limit for the "no receivers" log line.
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Collector, store, channels and shutdown for the scheduler.
pub struct SchedulerDeps {
    pub collector: ProbeCollector,
    pub store: Arc<TimeseriesStore>,
    pub probes: Arc<Vec<Probe>>,
    pub report_tx: broadcast::Sender<CycleReport>,
    pub latest_tx: watch::Sender<Option<CycleReport>>,
    /// `true` requests a prompt stop. A dropped sender is treated the same way.
    pub shutdown_rx: watch::Receiver<bool>,
}

pub struct SchedulerConfig {
    pub hostname: String,
    pub interval: Duration,
    /// `None` disables retention pruning.
    pub retention: Option<chrono::Duration>,
    pub maintenance_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Shutdown was requested before the cycle finished; nothing past the last phase boundary ran.
    Cancelled,
    /// First cycle: raw samples retained, nothing computed or persisted.
    Baseline,
    Completed(CycleReport),
}

pub struct Scheduler {
    collector: ProbeCollector,
    store: Arc<TimeseriesStore>,
    probes: Arc<Vec<Probe>>,
    report_tx: broadcast::Sender<CycleReport>,
    latest_tx: watch::Sender<Option<CycleReport>>,
    shutdown_rx: watch::Receiver<bool>,
    config: SchedulerConfig,
    interval_ms: i64,
    prev: Option<CollectResult>,
    cur: Option<CollectResult>,
    cycle: u64,
    last_tick_ms: Option<i64>,
    /// Maintenance clock starts at the first collected cycle.
    last_maintenance: Option<DateTime<Utc>>,
    last_no_receivers_warn: Option<Instant>,
}

impl Scheduler {
    /// Fails fast on probes the platform collector cannot serve.
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.interval.is_zero(), "interval must be > 0");
        let interval_ms = i64::try_from(config.interval.as_millis())
            .with_context(|| format!("interval {:?} is out of range", config.interval))?;
        anyhow::ensure!(!deps.probes.is_empty(), "at least one probe is required");
        for probe in deps.probes.iter() {
            deps.collector
                .check_supported(probe)
                .with_context(|| format!("probe {}", probe.describe()))?;
        }
        Ok(Self {
            collector: deps.collector,
            store: deps.store,
            probes: deps.probes,
            report_tx: deps.report_tx,
            latest_tx: deps.latest_tx,
            shutdown_rx: deps.shutdown_rx,
            config,
            interval_ms,
            prev: None,
            cur: None,
            cycle: 0,
            last_tick_ms: None,
            last_maintenance: None,
            last_no_receivers_warn: None,
        })
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Loops until shutdown is requested. Any collection, mapping or persistence error ends the
    /// loop with that error.
    pub async fn run(self) -> anyhow::Result<()> {
        let span = tracing::debug_span!(
            "scheduler",
            hostname = %self.config.hostname,
            interval_secs = self.config.interval.as_secs()
        );
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) -> anyhow::Result<()> {
        tracing::info!(
            probes = self.probes.len(),
            platform = %self.collector.platform(),
            interval_secs = self.config.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if self.is_cancelled() {
                break;
            }
            let now_ms = Utc::now().timestamp_millis();
            let tick_ms = next_tick_ms(now_ms, self.interval_ms, self.last_tick_ms);
            let sleep = Duration::from_millis((tick_ms - now_ms).max(0) as u64);

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown sender dropped");
                        break;
                    }
                    // re-check the flag and recompute the tick
                    continue;
                }
            }

            self.last_tick_ms = Some(tick_ms);
            let collect_tms = round_to_second(Utc::now());
            if self.run_cycle(collect_tms).await? == CycleOutcome::Cancelled {
                break;
            }
        }
        tracing::info!(cycles = self.cycle, "Scheduler stopped");
        Ok(())
    }

    /// One full cycle at `collect_tms`. Exposed so tests can drive cycles without waiting.
    pub async fn run_cycle(&mut self, collect_tms: DateTime<Utc>) -> anyhow::Result<CycleOutcome> {
        if self.is_cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }
        self.last_maintenance.get_or_insert(collect_tms);
        let started = Instant::now();
        let mut raw_samples = Vec::with_capacity(self.probes.len());
        for probe in self.probes.iter() {
            let sample = self
                .collector
                .collect(probe)
                .await
                .with_context(|| format!("collecting {}", probe.describe()))?;
            raw_samples.push(sample);
        }
        let collect_elapsed = started.elapsed();

        // exactly two generations alive: previous and current
        self.prev = self.cur.take();
        self.cur = Some(CollectResult::new(collect_tms, raw_samples));
        self.cycle += 1;

        let (Some(prev), Some(cur)) = (&self.prev, &self.cur) else {
            tracing::debug!(
                collect_ms = as_millis_f64(collect_elapsed),
                "Baseline collected, nothing to compute yet"
            );
            return Ok(CycleOutcome::Baseline);
        };
        let computed = compute(prev, cur)?;

        if self.is_cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }
        let persist_start = Instant::now();
        let mut session = self.store.session().await?;
        session.ensure_schema().await?;
        let samples_persisted = session
            .insert_batch(&self.config.hostname, &computed)
            .await
            .with_context(|| format!("persisting cycle {}", collect_tms))?;
        let persist_elapsed = persist_start.elapsed();

        if self.is_cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }
        let mut report = CycleReport {
            cycle: self.cycle,
            collect_tms,
            samples_persisted,
            timings: CycleTimings {
                collect_ms: as_millis_f64(collect_elapsed),
                persist_ms: as_millis_f64(persist_elapsed),
                report_ms: 0.0,
                maintain_ms: None,
            },
        };
        let report_start = Instant::now();
        self.latest_tx.send_replace(Some(report.clone()));
        report.timings.report_ms = as_millis_f64(report_start.elapsed());
        tracing::debug!(
            cycle = report.cycle,
            samples = samples_persisted,
            collect_ms = report.timings.collect_ms,
            persist_ms = report.timings.persist_ms,
            "Cycle completed"
        );

        if !self.is_cancelled() && self.maintenance_due(collect_tms) {
            let maintain_start = Instant::now();
            if let Some(retention) = self.config.retention {
                let cutoff = collect_tms.checked_sub_signed(retention).with_context(|| {
                    format!("retention {} reaches before the earliest timestamp", retention)
                })?;
                let deleted = session
                    .delete_older_than(&self.config.hostname, cutoff)
                    .await?;
                tracing::debug!(operation = "delete_older_than", deleted, %cutoff, "Retention applied");
            }
            session.maintain().await?;
            self.last_maintenance = Some(collect_tms);
            report.timings.maintain_ms = Some(as_millis_f64(maintain_start.elapsed()));
            tracing::debug!(
                operation = "maintain",
                maintain_ms = report.timings.maintain_ms,
                "Store maintenance done"
            );
        }

        // streamed once every phase of the cycle is timed
        self.publish(report.clone());
        Ok(CycleOutcome::Completed(report))
    }

    fn maintenance_due(&self, collect_tms: DateTime<Utc>) -> bool {
        let Some(last) = self.last_maintenance else {
            return false;
        };
        (collect_tms - last)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.config.maintenance_interval)
    }

    /// Non-blocking: replaces the latest value and sends on the broadcast stream.
    fn publish(&mut self, report: CycleReport) {
        self.latest_tx.send_replace(Some(report.clone()));
        if self.report_tx.send(report).is_err() {
            let should_warn = self
                .last_no_receivers_warn
                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
            if should_warn {
                tracing::debug!(
                    operation = "broadcast_cycle",
                    "No active WebSocket clients; broadcast channel has no receivers"
                );
                self.last_no_receivers_warn = Some(Instant::now());
            }
        }
    }
}

/// Maps every probe's current raw sample against its previous one, in probe order.
fn compute(prev: &CollectResult, cur: &CollectResult) -> anyhow::Result<Vec<ComputedSample>> {
    anyhow::ensure!(
        prev.raw_samples.len() == cur.raw_samples.len(),
        "raw sample count changed between cycles ({} -> {})",
        prev.raw_samples.len(),
        cur.raw_samples.len()
    );
    let mut out = Vec::new();
    for (c, p) in cur.raw_samples.iter().zip(&prev.raw_samples) {
        out.extend(mapper::map(cur.collect_tms, c, prev.collect_tms, p)?);
    }
    Ok(out)
}

/// Time until the next multiple of `interval_ms` since the Unix epoch. Zero on a boundary.
pub fn sleep_duration(now_ms: i64, interval_ms: i64) -> i64 {
    (interval_ms - now_ms.rem_euclid(interval_ms)).rem_euclid(interval_ms)
}

/// Next boundary to serve, never one already served.
pub fn next_tick_ms(now_ms: i64, interval_ms: i64, last_tick_ms: Option<i64>) -> i64 {
    let tick = now_ms + sleep_duration(now_ms, interval_ms);
    match last_tick_ms {
        Some(last) if tick <= last => last + interval_ms,
        _ => tick,
    }
}

pub fn round_to_second(tms: DateTime<Utc>) -> DateTime<Utc> {
    let ms = tms.timestamp_millis();
    let rounded = (ms + 500).div_euclid(1000) * 1000;
    DateTime::from_timestamp_millis(rounded).unwrap_or(tms)
}

pub fn spawn(scheduler: Scheduler) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(scheduler.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wake_lands_on_interval_boundary() {
        let interval = 60_000;
        let mut now: i64 = 1_700_000_000_123;
        for step in 0..2_000 {
            now += 7_919 + step;
            let wake = now + sleep_duration(now, interval);
            assert_eq!(wake % interval, 0, "now = {}", now);
            assert!(wake >= now && wake - now < interval);
        }
    }

    #[test]
    fn on_boundary_sleeps_zero() {
        assert_eq!(sleep_duration(120_000, 60_000), 0);
        assert_eq!(sleep_duration(120_001, 60_000), 59_999);
        assert_eq!(sleep_duration(0, 1_000), 0);
    }

    #[test]
    fn boundary_is_never_served_twice() {
        assert_eq!(next_tick_ms(119_990, 60_000, None), 120_000);
        // woke a little early for 120_000, already served
        assert_eq!(next_tick_ms(119_999, 60_000, Some(120_000)), 180_000);
        assert_eq!(next_tick_ms(120_000, 60_000, Some(120_000)), 180_000);
        assert_eq!(next_tick_ms(150_000, 60_000, Some(120_000)), 180_000);
    }

    #[test]
    fn collect_timestamp_rounds_to_nearest_second() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t = base + chrono::Duration::milliseconds(499);
        assert_eq!(round_to_second(t), base);
        let t = base + chrono::Duration::milliseconds(500);
        assert_eq!(round_to_second(t), base + chrono::Duration::seconds(1));
        let t = base - chrono::Duration::milliseconds(3);
        assert_eq!(round_to_second(t), base);
    }
}
