// Raw → computed samples. Pure functions: no I/O, no state.
// Rates are computed in exact integer arithmetic and rounded half-up to the series scale.

use chrono::{DateTime, Utc};

use crate::error::MapError;
use crate::models::{ComputedSample, RawSample, SeriesKind};

const MIB: i128 = 1024 * 1024;
const MS_PER_SEC: i128 = 1000;
const BITS_PER_BYTE: i128 = 8;
const BITS_PER_MEGABIT: i128 = 1_000_000;

/// Decimal places kept for percentages and throughput.
const RATE_SCALE: u32 = 1;

/// Maps the current raw sample of a probe against the previous one of the same probe.
pub fn map(
    cur_tms: DateTime<Utc>,
    cur: &RawSample,
    prev_tms: DateTime<Utc>,
    prev: &RawSample,
) -> Result<Vec<ComputedSample>, MapError> {
    let elapsed_ms = (cur_tms - prev_tms).num_milliseconds();
    let samples = match (cur, prev) {
        (
            RawSample::Load {
                load1,
                load5,
                load15,
            },
            RawSample::Load { .. },
        ) => vec![
            ComputedSample::new(SeriesKind::Load1m, cur_tms, *load1),
            ComputedSample::new(SeriesKind::Load5m, cur_tms, *load5),
            ComputedSample::new(SeriesKind::Load15m, cur_tms, *load15),
        ],
        (
            RawSample::Cpu {
                total_time,
                idle_time,
            },
            RawSample::Cpu {
                total_time: prev_total,
                idle_time: prev_idle,
            },
        ) => {
            let diff_total = i128::from(*total_time) - i128::from(*prev_total);
            let diff_idle = i128::from(*idle_time) - i128::from(*prev_idle);
            vec![ComputedSample::new(
                SeriesKind::Cpu,
                cur_tms,
                cpu_percent(diff_total, diff_idle),
            )]
        }
        (
            RawSample::Mem {
                mem_used,
                cache_used,
                swap_used,
            },
            RawSample::Mem { .. },
        ) => vec![
            ComputedSample::new(SeriesKind::Mem, cur_tms, mebibytes(*mem_used)),
            ComputedSample::new(SeriesKind::Swap, cur_tms, mebibytes(*swap_used)),
            ComputedSample::new(SeriesKind::Cache, cur_tms, mebibytes(*cache_used)),
        ],
        (
            RawSample::Net {
                device,
                rx_bytes,
                tx_bytes,
            },
            RawSample::Net {
                rx_bytes: prev_rx,
                tx_bytes: prev_tx,
                ..
            },
        ) => vec![
            ComputedSample::for_device(
                SeriesKind::NetTx,
                device,
                cur_tms,
                megabits_per_sec(*tx_bytes, *prev_tx, elapsed_ms),
            ),
            ComputedSample::for_device(
                SeriesKind::NetRx,
                device,
                cur_tms,
                megabits_per_sec(*rx_bytes, *prev_rx, elapsed_ms),
            ),
        ],
        (
            RawSample::Disk {
                device,
                read_bytes,
                write_bytes,
            },
            RawSample::Disk {
                read_bytes: prev_read,
                write_bytes: prev_write,
                ..
            },
        ) => vec![
            ComputedSample::for_device(
                SeriesKind::DiskRead,
                device,
                cur_tms,
                mebibytes_per_sec(*read_bytes, *prev_read, elapsed_ms),
            ),
            ComputedSample::for_device(
                SeriesKind::DiskWrite,
                device,
                cur_tms,
                mebibytes_per_sec(*write_bytes, *prev_write, elapsed_ms),
            ),
        ],
        (RawSample::Gpu { load_percent }, RawSample::Gpu { .. }) => {
            vec![ComputedSample::new(SeriesKind::Gpu, cur_tms, *load_percent)]
        }
        _ => {
            return Err(MapError::Mismatch {
                current: cur.kind(),
                previous: prev.kind(),
            });
        }
    };
    Ok(samples)
}

/// Busy share of the elapsed ticks, 1 decimal, always within [0, 100].
pub fn cpu_percent(diff_total: i128, diff_idle: i128) -> f64 {
    if diff_total <= 0 {
        return 0.0;
    }
    let busy = (diff_total - diff_idle).clamp(0, diff_total);
    div_round_half_up(busy * 100, diff_total, RATE_SCALE)
}

/// Bytes → whole mebibytes.
pub fn mebibytes(bytes: u64) -> f64 {
    div_round_half_up(i128::from(bytes), MIB, 0)
}

pub fn megabits_per_sec(cur: u64, prev: u64, elapsed_ms: i64) -> f64 {
    counter_rate(cur, prev, elapsed_ms, BITS_PER_BYTE * MS_PER_SEC, BITS_PER_MEGABIT)
}

pub fn mebibytes_per_sec(cur: u64, prev: u64, elapsed_ms: i64) -> f64 {
    counter_rate(cur, prev, elapsed_ms, MS_PER_SEC, MIB)
}

/// `(cur - prev) * factor / (elapsed_ms * divisor)`, 1 decimal.
/// Zero when no time elapsed or when the counter went backwards (reset, wraparound).
pub fn counter_rate(cur: u64, prev: u64, elapsed_ms: i64, factor: i128, divisor: i128) -> f64 {
    if elapsed_ms <= 0 {
        return 0.0;
    }
    let diff = i128::from(cur) - i128::from(prev);
    if diff < 0 {
        return 0.0;
    }
    div_round_half_up(diff * factor, i128::from(elapsed_ms) * divisor, RATE_SCALE)
}

fn div_round_half_up(num: i128, den: i128, scale: u32) -> f64 {
    debug_assert!(den > 0);
    let pow = 10i128.pow(scale);
    let scaled = num * pow;
    let mut quotient = scaled / den;
    let remainder = scaled % den;
    if 2 * remainder.abs() >= den {
        quotient += scaled.signum();
    }
    quotient as f64 / pow as f64
}
