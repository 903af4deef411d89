// Domain models: volume identity, capacity samples, cycle reports

mod report;
mod sample;
mod volume;

pub use report::{CycleReport, VolumeReport};
pub use sample::{GIB, SizeSample, Trend, change_rate, format_bytes, trend_of};
pub use volume::{LocalVolume, NetworkVolume, Volume, VolumeClass, VolumeKey};

use std::collections::BTreeMap;

/// Per-volume sample histories keyed by [`Volume::key`], each ascending by timestamp.
pub type VolumeRecords = BTreeMap<VolumeKey, Vec<SizeSample>>;
