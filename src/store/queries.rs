// Per-family chart reads: one row per sample timestamp, ascending, newer than `since`.

use super::{TimeseriesStore, format_tms, parse_tms};
use crate::models::{
    Dataset, DiskRow, LoadRow, MemRow, NetRow, Probe, ProbeType, SeriesKind, ValueRow,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::instrument;

/// `SELECT sample_tms, MAX(CASE ...) AS <kind>...` pivoting the given series into columns.
fn pivot_sql(kinds: &[SeriesKind], by_device: bool) -> String {
    let columns = kinds
        .iter()
        .map(|k| {
            format!(
                "MAX(CASE WHEN probe_type = '{0}' THEN sample_value END) AS {0}",
                k.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let types = kinds
        .iter()
        .map(|k| format!("'{}'", k.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let (device_filter, since_param) = if by_device {
        ("device = $2", "$3")
    } else {
        ("device IS NULL", "$2")
    };
    format!(
        "SELECT sample_tms, {columns} FROM tb_probe_series \
         WHERE hostname = $1 AND {device_filter} AND sample_tms > {since_param} AND probe_type IN ({types}) \
         GROUP BY sample_tms ORDER BY sample_tms"
    )
}

/// Maps rows, skipping any whose timestamp does not parse.
fn map_rows<T>(
    rows: Vec<SqliteRow>,
    f: impl Fn(DateTime<Utc>, &SqliteRow) -> Result<T, sqlx::Error>,
) -> anyhow::Result<Vec<T>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: String = row.try_get("sample_tms")?;
        let Some(tms) = parse_tms(&raw) else {
            tracing::debug!(sample_tms = %raw, "Skipping row with unparsable timestamp");
            continue;
        };
        out.push(f(tms, &row)?);
    }
    Ok(out)
}

impl TimeseriesStore {
    async fn fetch_pivot(
        &self,
        kinds: &[SeriesKind],
        hostname: &str,
        device: Option<&str>,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SqliteRow>> {
        let sql = pivot_sql(kinds, device.is_some());
        let mut query = sqlx::query(&sql).bind(hostname);
        if let Some(device) = device {
            query = query.bind(device);
        }
        let rows = query.bind(format_tms(&since)).fetch_all(self.pool()).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(repo = "store", operation = "read_load"))]
    pub async fn read_load(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LoadRow>> {
        let kinds = [SeriesKind::Load1m, SeriesKind::Load5m, SeriesKind::Load15m];
        let rows = self.fetch_pivot(&kinds, hostname, None, since).await?;
        map_rows(rows, |sample_tms, row| {
            Ok(LoadRow {
                sample_tms,
                load1m: row.try_get("load1m")?,
                load5m: row.try_get("load5m")?,
                load15m: row.try_get("load15m")?,
            })
        })
    }

    #[instrument(skip(self), fields(repo = "store", operation = "read_cpu"))]
    pub async fn read_cpu(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ValueRow>> {
        self.read_single(SeriesKind::Cpu, hostname, since).await
    }

    #[instrument(skip(self), fields(repo = "store", operation = "read_gpu"))]
    pub async fn read_gpu(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ValueRow>> {
        self.read_single(SeriesKind::Gpu, hostname, since).await
    }

    async fn read_single(
        &self,
        kind: SeriesKind,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ValueRow>> {
        let rows = sqlx::query(
            "SELECT sample_tms, sample_value FROM tb_probe_series \
             WHERE hostname = $1 AND device IS NULL AND probe_type = $2 AND sample_tms > $3 \
             ORDER BY sample_tms",
        )
        .bind(hostname)
        .bind(kind.as_str())
        .bind(format_tms(&since))
        .fetch_all(self.pool())
        .await?;
        map_rows(rows, |sample_tms, row| {
            Ok(ValueRow {
                sample_tms,
                value: row.try_get("sample_value")?,
            })
        })
    }

    #[instrument(skip(self), fields(repo = "store", operation = "read_mem"))]
    pub async fn read_mem(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MemRow>> {
        let kinds = [SeriesKind::Mem, SeriesKind::Swap, SeriesKind::Cache];
        let rows = self.fetch_pivot(&kinds, hostname, None, since).await?;
        map_rows(rows, |sample_tms, row| {
            Ok(MemRow {
                sample_tms,
                mem: row.try_get("mem")?,
                swap: row.try_get("swap")?,
                cache: row.try_get("cache")?,
            })
        })
    }

    #[instrument(skip(self), fields(repo = "store", operation = "read_net"))]
    pub async fn read_net(
        &self,
        hostname: &str,
        device: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<NetRow>> {
        let kinds = [SeriesKind::NetTx, SeriesKind::NetRx];
        let rows = self
            .fetch_pivot(&kinds, hostname, Some(device), since)
            .await?;
        map_rows(rows, |sample_tms, row| {
            Ok(NetRow {
                sample_tms,
                tx: row.try_get("net_tx")?,
                rx: row.try_get("net_rx")?,
            })
        })
    }

    /// Disk and zfs probes.
    #[instrument(skip(self), fields(repo = "store", operation = "read_disk"))]
    pub async fn read_disk(
        &self,
        hostname: &str,
        device: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<DiskRow>> {
        let kinds = [SeriesKind::DiskRead, SeriesKind::DiskWrite];
        let rows = self
            .fetch_pivot(&kinds, hostname, Some(device), since)
            .await?;
        map_rows(rows, |sample_tms, row| {
            Ok(DiskRow {
                sample_tms,
                read: row.try_get("disk_read")?,
                write: row.try_get("disk_write")?,
            })
        })
    }

    /// Chart data for one configured probe.
    pub async fn read_dataset(
        &self,
        hostname: &str,
        probe: &Probe,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Dataset> {
        let device = probe.device.as_deref().unwrap_or_default();
        Ok(match probe.probe_type {
            ProbeType::Load => Dataset::Load(self.read_load(hostname, since).await?),
            ProbeType::Cpu => Dataset::Cpu(self.read_cpu(hostname, since).await?),
            ProbeType::Mem => Dataset::Mem(self.read_mem(hostname, since).await?),
            ProbeType::Net => Dataset::Net(self.read_net(hostname, device, since).await?),
            ProbeType::Disk | ProbeType::Zfs => {
                Dataset::Disk(self.read_disk(hostname, device, since).await?)
            }
            ProbeType::Gpu => Dataset::Gpu(self.read_gpu(hostname, since).await?),
        })
    }
}
