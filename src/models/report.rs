// Per-cycle snapshot handed to consumers (rendering boundary)

use serde::{Deserialize, Serialize};

use super::{SizeSample, Trend, Volume, VolumeClass, VolumeKey};

/// One known volume with its latest sample and full retained history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeReport {
    pub key: VolumeKey,
    pub volume: Volume,
    pub selected: bool,
    pub latest: Option<SizeSample>,
    pub history: Vec<SizeSample>,
    pub trend: Trend,
    /// Free-space change over the last few samples, bytes/sec.
    pub change_bytes_per_sec: f64,
}

/// Immutable result of one completed poll cycle for one volume class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub class: VolumeClass,
    /// Shared sample timestamp of the cycle (epoch seconds).
    pub timestamp: f64,
    /// Known volumes, largest total capacity first.
    pub volumes: Vec<VolumeReport>,
    /// Seconds between the oldest and newest retained sample across all volumes.
    pub span_seconds: f64,
}

impl CycleReport {
    pub fn volume(&self, key: &str) -> Option<&VolumeReport> {
        self.volumes.iter().find(|v| v.key == key)
    }
}
