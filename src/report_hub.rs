// Consumer boundary: pollers publish one CycleReport per completed cycle.

use crate::models::{CycleReport, VolumeClass};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Receives every completed cycle's report. Must not block the poller.
pub trait ReportSink: Send + Sync {
    fn publish(&self, report: CycleReport);
}

/// Keeps the latest report per class and fans reports out to subscribers.
pub struct ReportHub {
    latest: RwLock<BTreeMap<VolumeClass, CycleReport>>,
    tx: broadcast::Sender<CycleReport>,
}

impl ReportHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: RwLock::new(BTreeMap::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.tx.subscribe()
    }

    pub fn latest(&self, class: VolumeClass) -> Option<CycleReport> {
        match self.latest.read() {
            Ok(guard) => guard.get(&class).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&class).cloned(),
        }
    }

    pub fn latest_all(&self) -> Vec<CycleReport> {
        match self.latest.read() {
            Ok(guard) => guard.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }
}

impl ReportSink for ReportHub {
    fn publish(&self, report: CycleReport) {
        match self.latest.write() {
            Ok(mut guard) => {
                guard.insert(report.class, report.clone());
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(report.class, report.clone());
            }
        }
        // No receivers just means nobody is watching right now.
        let _ = self.tx.send(report);
    }
}
