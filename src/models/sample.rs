// Capacity samples and derived sizes

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
/// One gibibyte; thresholds and spoken free-space figures are whole GiB.
pub const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// One capacity reading for one volume at one instant.
///
/// `important` is space usable without the OS reclaiming caches; `opportunistic`
/// also counts reclaimable space and overstates what is durably free.
/// `important <= opportunistic <= total` is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct SizeSample {
    pub important_capacity_bytes: u64,
    pub opportunistic_capacity_bytes: u64,
    pub total_capacity_bytes: u64,
    /// Epoch seconds, shared by every volume sampled in the same poll cycle.
    pub timestamp: f64,
}

impl SizeSample {
    pub fn new(important: u64, opportunistic: u64, total: u64, timestamp: f64) -> Self {
        Self {
            important_capacity_bytes: important,
            opportunistic_capacity_bytes: opportunistic,
            total_capacity_bytes: total,
            timestamp,
        }
    }

    pub fn free_bytes(&self) -> u64 {
        self.important_capacity_bytes
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_capacity_bytes
            .saturating_sub(self.opportunistic_capacity_bytes)
    }

    pub fn free_gigs(&self) -> u64 {
        self.free_bytes() / GIB
    }

    pub fn used_gigs(&self) -> u64 {
        self.used_bytes() / GIB
    }

    pub fn total_gigs(&self) -> u64 {
        self.total_capacity_bytes / GIB
    }

    /// False when the reading violates `important <= opportunistic <= total`.
    pub fn is_consistent(&self) -> bool {
        self.important_capacity_bytes <= self.opportunistic_capacity_bytes
            && self.opportunistic_capacity_bytes <= self.total_capacity_bytes
    }

    /// 0.0 is empty, 1.0 is full. None for a zero-sized volume.
    pub fn fraction_full(&self) -> Option<f64> {
        if self.total_capacity_bytes == 0 {
            return None;
        }
        let total = self.total_capacity_bytes as f64;
        Some(((total - self.free_bytes() as f64) / total).clamp(0.0, 1.0))
    }

    pub fn fraction_empty(&self) -> Option<f64> {
        self.fraction_full().map(|full| 1.0 - full)
    }

    pub fn free_size(&self) -> String {
        format_bytes(self.free_bytes())
    }
}

/// Human readable size with two decimals: `512.00K`, `1.50G`, `2.00T`.
pub fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes < MIB {
        format!("{:.2}K", b / KIB as f64)
    } else if bytes < GIB {
        format!("{:.2}M", b / MIB as f64)
    } else if bytes < TIB {
        format!("{:.2}G", b / GIB as f64)
    } else {
        format!("{:.2}T", b / TIB as f64)
    }
}

/// Direction of free space over the most recent samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Absolute change of free space between two samples, in bytes per second.
/// Zero when the samples share a timestamp.
pub fn change_rate(old: &SizeSample, new: &SizeSample) -> f64 {
    let dt = (new.timestamp - old.timestamp).abs();
    if dt == 0.0 {
        return 0.0;
    }
    new.free_bytes().abs_diff(old.free_bytes()) as f64 / dt
}

/// Trend and change rate over the last three samples (or two, when that is all there is).
pub fn trend_of(series: &[SizeSample]) -> (Trend, f64) {
    let n = series.len();
    if n < 2 {
        return (Trend::Flat, 0.0);
    }
    let old = if n > 2 { &series[n - 3] } else { &series[n - 2] };
    let new = &series[n - 1];
    let trend = match new.free_bytes().cmp(&old.free_bytes()) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Flat,
    };
    (trend, change_rate(old, new))
}
