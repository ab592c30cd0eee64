// Series table layout. This is the durable contract read by the report layer.

/// Statements applied in order by `StoreSession::ensure_schema`. All idempotent.
pub(super) const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS tb_probe_series (
        id_sample INTEGER PRIMARY KEY,
        hostname TEXT NOT NULL,
        probe_type TEXT NOT NULL,
        device TEXT,
        sample_tms TEXT NOT NULL,
        sample_value REAL NOT NULL
    )
    "#,
    // NULL devices compare equal here, so host-wide series reject duplicates too
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_probe_series_key ON tb_probe_series (hostname, probe_type, COALESCE(device, ''), sample_tms)",
    "CREATE INDEX IF NOT EXISTS ix_probe_series_host_tms ON tb_probe_series (hostname, sample_tms)",
];

pub(super) const INSERT_SAMPLE: &str = "INSERT INTO tb_probe_series (hostname, probe_type, device, sample_tms, sample_value) VALUES ($1, $2, $3, $4, $5)";

pub(super) const DELETE_OLDER_THAN: &str =
    "DELETE FROM tb_probe_series WHERE hostname = $1 AND sample_tms <= $2";

pub(super) const COUNT_POINTS: &str = "SELECT COUNT(*) FROM tb_probe_series WHERE hostname = $1";
