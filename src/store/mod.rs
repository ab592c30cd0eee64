// SQLite timeseries store. One row per computed sample; one transaction per cycle.

mod queries;
mod schema;

use crate::models::ComputedSample;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct TimeseriesStore {
    pool: SqlitePool,
}

impl TimeseriesStore {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        self.session().await?.ensure_schema().await
    }

    /// Acquires the single connection a cycle uses for all of its writes.
    pub async fn session(&self) -> anyhow::Result<StoreSession> {
        Ok(StoreSession {
            conn: self.pool.acquire().await?,
        })
    }

    pub async fn count_points(&self, hostname: &str) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(schema::COUNT_POINTS)
            .bind(hostname)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Write handle held for the duration of one cycle.
pub struct StoreSession {
    conn: PoolConnection<Sqlite>,
}

impl StoreSession {
    pub async fn ensure_schema(&mut self) -> anyhow::Result<()> {
        for statement in schema::SCHEMA {
            sqlx::query(statement).execute(&mut *self.conn).await?;
        }
        Ok(())
    }

    /// Inserts a whole cycle atomically: every row commits or none does.
    /// A duplicate `(hostname, probe_type, device, sample_tms)` fails the batch.
    #[instrument(skip(self, samples), fields(repo = "store", operation = "insert_batch", samples_count = samples.len()))]
    pub async fn insert_batch(
        &mut self,
        hostname: &str,
        samples: &[ComputedSample],
    ) -> anyhow::Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut tx = self.conn.begin().await?;
        for s in samples {
            sqlx::query(schema::INSERT_SAMPLE)
                .bind(hostname)
                .bind(s.kind.as_str())
                .bind(s.device.as_deref())
                .bind(format_tms(&s.sample_tms))
                .bind(s.value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(samples.len())
    }

    /// Removes every row of `hostname` at or before `cutoff`.
    #[instrument(skip(self), fields(repo = "store", operation = "delete_older_than"))]
    pub async fn delete_older_than(
        &mut self,
        hostname: &str,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let r = sqlx::query(schema::DELETE_OLDER_THAN)
            .bind(hostname)
            .bind(format_tms(&cutoff))
            .execute(&mut *self.conn)
            .await?;
        Ok(r.rows_affected())
    }

    /// Compaction and statistics refresh.
    #[instrument(skip(self), fields(repo = "store", operation = "maintain"))]
    pub async fn maintain(&mut self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&mut *self.conn).await?;
        sqlx::query("ANALYZE").execute(&mut *self.conn).await?;
        Ok(())
    }
}

/// Fixed-width UTC text (`2024-05-01T12:00:00.000Z`): lexicographic order is time order.
pub fn format_tms(tms: &DateTime<Utc>) -> String {
    tms.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_tms(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(format_tms(&b), "2024-01-10T00:00:00.000Z");
        assert!(format_tms(&a) < format_tms(&b));
        assert_eq!(parse_tms(&format_tms(&a)), Some(a));
        assert_eq!(parse_tms("yesterday"), None);
    }
}
