// Domain models: probes, raw and computed samples, datasets, cycle reports

mod dataset;
mod probe;
mod runtime;
mod sample;
mod series;

pub use dataset::{Dataset, DiskRow, LoadRow, MemRow, NetRow, ValueRow};
pub use probe::{ChartSize, Probe, ProbeType, split_devices};
pub use runtime::{CycleReport, CycleTimings, as_millis_f64};
pub use sample::{CollectResult, RawSample};
pub use series::{ComputedSample, SeriesKind};
