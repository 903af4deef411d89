// Low free-space hysteresis, one evaluator per threshold tier.
// A volume is announced once when it drops below the threshold and once when it recovers.

use crate::models::{SizeSample, VolumeKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdTier {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningEvent {
    CrossedBelow {
        tier: ThresholdTier,
        key: VolumeKey,
        name: String,
        free_gigs: u64,
    },
    Recovered {
        tier: ThresholdTier,
        key: VolumeKey,
        name: String,
        free_gigs: u64,
    },
}

impl WarningEvent {
    pub fn tier(&self) -> ThresholdTier {
        match self {
            WarningEvent::CrossedBelow { tier, .. } | WarningEvent::Recovered { tier, .. } => *tier,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            WarningEvent::CrossedBelow { key, .. } | WarningEvent::Recovered { key, .. } => key,
        }
    }

    /// Text handed to the announcer.
    pub fn message(&self) -> String {
        match self {
            WarningEvent::CrossedBelow {
                tier: ThresholdTier::Warning,
                name,
                free_gigs,
                ..
            } => format!(
                "Low Disk Space Warning.  {} is running low on free space.  It now has only {} gigabytes of free space left.",
                name, free_gigs
            ),
            WarningEvent::CrossedBelow {
                tier: ThresholdTier::Error,
                name,
                free_gigs,
                ..
            } => format!(
                "Disk Space Error.  {} is almost out of free space.  It now has only {} gigabytes of free space left.",
                name, free_gigs
            ),
            WarningEvent::Recovered {
                name, free_gigs, ..
            } => format!(
                "{} is no longer low on free space.  It now has {} gigabytes of free space left.",
                name, free_gigs
            ),
        }
    }
}

/// Tracks which volumes are currently below one tier's threshold.
#[derive(Debug, Clone)]
pub struct WarningEvaluator {
    tier: ThresholdTier,
    low: HashSet<VolumeKey>,
}

impl WarningEvaluator {
    pub fn new(tier: ThresholdTier) -> Self {
        Self {
            tier,
            low: HashSet::new(),
        }
    }

    pub fn tier(&self) -> ThresholdTier {
        self.tier
    }

    pub fn is_low(&self, key: &str) -> bool {
        self.low.contains(key)
    }

    /// Drops the low mark, e.g. when a volume is deselected.
    pub fn forget(&mut self, key: &str) {
        self.low.remove(key);
    }

    /// Compares a volume's previous and new sample against `threshold_gigs`.
    pub fn evaluate(
        &mut self,
        key: &str,
        name: &str,
        previous: Option<&SizeSample>,
        new: &SizeSample,
        threshold_gigs: u64,
    ) -> Option<WarningEvent> {
        let free = new.free_gigs();
        if self.low.contains(key) {
            if free > threshold_gigs {
                self.low.remove(key);
                return Some(WarningEvent::Recovered {
                    tier: self.tier,
                    key: key.to_string(),
                    name: name.to_string(),
                    free_gigs: free,
                });
            }
            return None;
        }

        let crossed = match previous {
            Some(prev) => prev.free_gigs() >= threshold_gigs && free < threshold_gigs,
            None => free < threshold_gigs,
        };
        if !crossed {
            return None;
        }
        self.low.insert(key.to_string());
        Some(WarningEvent::CrossedBelow {
            tier: self.tier,
            key: key.to_string(),
            name: name.to_string(),
            free_gigs: free,
        })
    }
}
