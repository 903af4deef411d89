// Volume poller: one independent loop per volume class.
// discover -> sample (one shared timestamp) -> merge + publish + hand off to the writer -> sleep.
// Persistence runs in a dedicated record writer task (channel) so a slow save never delays a cycle.

use crate::announcer::Announcer;
use crate::history::{RecordStore, TimeSeriesStore, data_span};
use crate::models::{
    CycleReport, SizeSample, Volume, VolumeClass, VolumeKey, VolumeRecords, VolumeReport, trend_of,
};
use crate::preferences::{Preferences, PreferencesStore};
use crate::report_hub::ReportSink;
use crate::volume_source::VolumeSource;
use crate::warning::{ThresholdTier, WarningEvaluator};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;

/// Where a poller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Discovering,
    Sampling,
    MergingAndPersisting,
    Sleeping,
    Cancelled,
}

/// Counters for one poller and its record writer.
#[derive(Debug, Default)]
pub struct PollerStats {
    pub cycles_completed: AtomicU64,
    pub samples_recorded: AtomicU64,
    pub sample_failures: AtomicU64,
    pub discovery_failures: AtomicU64,
    /// Readings violating `important <= opportunistic <= total`; stored as-is.
    pub malformed_readings: AtomicU64,
    pub snapshots_saved: AtomicU64,
    pub save_failures: AtomicU64,
}

impl PollerStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Collaborators shared with the rest of the application.
pub struct PollerDeps<S> {
    pub source: Arc<S>,
    pub preferences: Arc<PreferencesStore>,
    pub sink: Arc<dyn ReportSink>,
    pub announcer: Arc<dyn Announcer>,
    pub write_tx: mpsc::Sender<VolumeRecords>,
    pub stats: Arc<PollerStats>,
}

pub struct Poller<S> {
    class: VolumeClass,
    source: Arc<S>,
    preferences: Arc<PreferencesStore>,
    sink: Arc<dyn ReportSink>,
    announcer: Arc<dyn Announcer>,
    write_tx: mpsc::Sender<VolumeRecords>,
    stats: Arc<PollerStats>,
    store: TimeSeriesStore,
    volumes: Vec<Volume>,
    warning_tier: WarningEvaluator,
    error_tier: WarningEvaluator,
    state: PollState,
}

/// Current wall clock as epoch seconds.
pub fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0.0
        })
}

impl<S: VolumeSource> Poller<S> {
    pub fn new(class: VolumeClass, deps: PollerDeps<S>) -> Self {
        let retention = deps.preferences.current().retention();
        Self {
            class,
            source: deps.source,
            preferences: deps.preferences,
            sink: deps.sink,
            announcer: deps.announcer,
            write_tx: deps.write_tx,
            stats: deps.stats,
            store: TimeSeriesStore::new(retention),
            volumes: Vec::new(),
            warning_tier: WarningEvaluator::new(ThresholdTier::Warning),
            error_tier: WarningEvaluator::new(ThresholdTier::Error),
            state: PollState::Idle,
        }
    }

    pub fn class(&self) -> VolumeClass {
        self.class
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Seeds the store with persisted history. Nothing is saved or published.
    pub fn restore(&mut self, records: VolumeRecords, now: f64) {
        self.store.set_retention(self.preferences.current().retention());
        let restored = self.store.restore(records, now);
        tracing::info!(
            class = %self.class,
            volumes = restored.len(),
            samples = self.store.sample_count(),
            "restored stored records"
        );
    }

    /// One full discover / sample / merge pass at `now`.
    /// Returns None when `cancel` is set before the merge; nothing is published then.
    pub async fn run_cycle(
        &mut self,
        now: f64,
        cancel: &watch::Receiver<bool>,
    ) -> Option<CycleReport> {
        self.cycle(|| now, cancel).await
    }

    /// The timestamp is taken from `clock` once discovery is done.
    async fn cycle(
        &mut self,
        clock: impl Fn() -> f64,
        cancel: &watch::Receiver<bool>,
    ) -> Option<CycleReport> {
        if *cancel.borrow() {
            return None;
        }
        self.state = PollState::Discovering;
        self.discover().await;
        if *cancel.borrow() {
            return None;
        }
        self.state = PollState::Sampling;
        let timestamp = clock();
        let batch = self.sample(timestamp).await;
        if *cancel.borrow() {
            return None;
        }
        self.state = PollState::MergingAndPersisting;
        Some(self.merge_and_publish(batch, timestamp))
    }

    /// Refreshes the volume list; on failure the previous list is kept.
    pub async fn discover(&mut self) {
        let result: Result<Vec<Volume>, _> = match self.class {
            VolumeClass::Local => self.source.enumerate_local_volumes().await.map(|vols| {
                vols.into_iter()
                    .filter(|v| v.is_browsable)
                    .map(Volume::Local)
                    .collect()
            }),
            VolumeClass::Network => self
                .source
                .enumerate_network_volumes()
                .await
                .map(|vols| vols.into_iter().map(Volume::Network).collect()),
        };
        match result {
            Ok(mut volumes) => {
                // Identity is the key; the first descriptor wins.
                let mut seen = std::collections::HashSet::new();
                volumes.retain(|v| seen.insert(v.key()));
                if volumes.len() != self.volumes.len() {
                    tracing::debug!(class = %self.class, count = volumes.len(), "volume list changed");
                }
                self.volumes = volumes;
            }
            Err(e) => {
                PollerStats::bump(&self.stats.discovery_failures);
                tracing::warn!(
                    class = %self.class,
                    error = %e,
                    operation = "discover",
                    "volume discovery failed, keeping previous volume list"
                );
            }
        }
    }

    /// Samples every known volume at one shared `timestamp`. Failed volumes are skipped.
    pub async fn sample(&self, timestamp: f64) -> VolumeRecords {
        let results = join_all(self.volumes.iter().map(|volume| async move {
            let path = volume.mount_path();
            let result = match volume {
                Volume::Local(_) => self.source.sample_capacity(path, timestamp).await,
                Volume::Network(_) => self.source.sample_capacity_network(path, timestamp).await,
            };
            (volume, result)
        }))
        .await;

        let mut batch = VolumeRecords::new();
        for (volume, result) in results {
            match result {
                Ok(mut sample) => {
                    sample.timestamp = timestamp;
                    if !sample.is_consistent() {
                        PollerStats::bump(&self.stats.malformed_readings);
                        tracing::warn!(
                            class = %self.class,
                            volume = %volume.key(),
                            important = sample.important_capacity_bytes,
                            opportunistic = sample.opportunistic_capacity_bytes,
                            total = sample.total_capacity_bytes,
                            "malformed capacity reading, stored as-is"
                        );
                    }
                    PollerStats::bump(&self.stats.samples_recorded);
                    batch.insert(volume.key(), vec![sample]);
                }
                Err(e) => {
                    PollerStats::bump(&self.stats.sample_failures);
                    tracing::warn!(
                        class = %self.class,
                        volume = %volume.key(),
                        error = %e,
                        operation = "sample_capacity",
                        "no sample this cycle"
                    );
                }
            }
        }
        batch
    }

    /// Merges the batch, runs warnings, publishes the report and queues the snapshot for saving.
    pub fn merge_and_publish(&mut self, batch: VolumeRecords, now: f64) -> CycleReport {
        let prefs = self.preferences.current();
        self.store.set_retention(prefs.retention());

        let previous: HashMap<VolumeKey, SizeSample> = batch
            .keys()
            .filter_map(|k| self.store.last_sample(k).map(|s| (k.clone(), *s)))
            .collect();
        let latest: Vec<(VolumeKey, SizeSample)> = batch
            .iter()
            .filter_map(|(k, samples)| samples.last().map(|s| (k.clone(), *s)))
            .collect();

        let merged = self.store.merge(batch, now);

        for (key, new) in &latest {
            self.evaluate_warnings(key, previous.get(key), new, &prefs);
        }

        let report = self.build_report(&merged, now, &prefs);
        self.sink.publish(report.clone());
        self.persist(merged);
        PollerStats::bump(&self.stats.cycles_completed);
        report
    }

    fn evaluate_warnings(
        &mut self,
        key: &str,
        previous: Option<&SizeSample>,
        new: &SizeSample,
        prefs: &Preferences,
    ) {
        if !prefs.is_selected(self.class, key) {
            self.warning_tier.forget(key);
            self.error_tier.forget(key);
            return;
        }
        let name = self
            .volumes
            .iter()
            .find(|v| v.key() == key)
            .map(Volume::display_name)
            .unwrap_or_else(|| key.to_string());

        // A muted tier still tracks its low marks so unmuting never replays or hides a crossing.
        for evaluator in [&mut self.warning_tier, &mut self.error_tier] {
            let tier = evaluator.tier();
            let Some(event) =
                evaluator.evaluate(key, &name, previous, new, prefs.threshold_gigs(tier))
            else {
                continue;
            };
            let muted = !prefs.tier_enabled(tier);
            tracing::info!(
                class = %self.class,
                volume = %key,
                tier = ?tier,
                free = %new.free_size(),
                muted,
                "low space threshold crossed"
            );
            if !muted {
                self.announcer
                    .announce(event.message(), prefs.voice(tier).clone());
            }
        }
    }

    fn build_report(&self, merged: &VolumeRecords, now: f64, prefs: &Preferences) -> CycleReport {
        let mut volumes: Vec<VolumeReport> = self
            .volumes
            .iter()
            .map(|volume| {
                let key = volume.key();
                let history = merged.get(&key).cloned().unwrap_or_default();
                let (trend, change_bytes_per_sec) = trend_of(&history);
                VolumeReport {
                    selected: prefs.is_selected(self.class, &key),
                    latest: history.last().copied(),
                    key,
                    volume: volume.clone(),
                    history,
                    trend,
                    change_bytes_per_sec,
                }
            })
            .collect();
        volumes.sort_by_key(|v| {
            std::cmp::Reverse(v.latest.map(|s| s.total_capacity_bytes).unwrap_or(0))
        });
        CycleReport {
            class: self.class,
            timestamp: now,
            volumes,
            span_seconds: data_span(merged),
        }
    }

    /// Hands the snapshot to the writer without waiting. A full queue skips this
    /// snapshot; the next one carries everything.
    fn persist(&self, merged: VolumeRecords) {
        match self.write_tx.try_send(merged) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(class = %self.class, "record writer busy, snapshot skipped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(class = %self.class, "record writer channel closed");
            }
        }
    }

    /// Runs cycles until `cancel` flips to true (or its sender is dropped).
    /// The first cycle does not sleep afterwards so initial data shows up right away.
    pub async fn run(&mut self, mut cancel: watch::Receiver<bool>) {
        let mut first = true;
        loop {
            if self.cycle(now_epoch_secs, &cancel).await.is_none() || *cancel.borrow() {
                break;
            }
            self.state = PollState::Sleeping;
            if !first {
                let interval: Duration = self.preferences.current().poll_interval(self.class);
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                    }
                }
            }
            first = false;
        }
        self.state = PollState::Cancelled;
        tracing::debug!(class = %self.class, "poller shutting down");
    }
}

/// Spawns a poller: load the class's records, restore them, then run until cancelled.
pub fn spawn<S: VolumeSource>(
    mut poller: Poller<S>,
    records: Arc<RecordStore>,
    cancel: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match records.load().await {
            Ok(stored) => poller.restore(stored, now_epoch_secs()),
            Err(e) => {
                tracing::warn!(
                    class = %poller.class(),
                    error = %e,
                    operation = "load_records",
                    "cannot load stored records, starting with empty history"
                );
            }
        }
        poller.run(cancel).await;
    })
}

/// Spawns the task that saves merged snapshots for one class.
/// Only the newest queued snapshot is written (each one is complete). When every
/// sender is dropped the task saves what is still queued and exits.
pub fn spawn_record_writer(
    mut write_rx: mpsc::Receiver<VolumeRecords>,
    records: Arc<RecordStore>,
    stats: Arc<PollerStats>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut snapshot) = write_rx.recv().await {
            while let Ok(newer) = write_rx.try_recv() {
                snapshot = newer;
            }
            match records.save(&snapshot).await {
                Ok(()) => {
                    PollerStats::bump(&stats.snapshots_saved);
                    tracing::debug!(
                        operation = "save_records",
                        volumes = snapshot.len(),
                        path = %records.path().display(),
                        "records saved"
                    );
                }
                Err(e) => {
                    PollerStats::bump(&stats.save_failures);
                    tracing::warn!(error = %e, operation = "save_records", "cannot save volume records");
                }
            }
        }
        tracing::debug!(path = %records.path().display(), "record writer shutting down");
    })
}

/// Logs every poller's counters at INFO every `interval` until cancelled.
pub fn spawn_stats_logger(
    pollers: Vec<(VolumeClass, Arc<PollerStats>)>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; there is nothing to report yet.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for (class, stats) in &pollers {
                        tracing::info!(
                            class = %class,
                            cycles = PollerStats::get(&stats.cycles_completed),
                            samples = PollerStats::get(&stats.samples_recorded),
                            sample_failures = PollerStats::get(&stats.sample_failures),
                            discovery_failures = PollerStats::get(&stats.discovery_failures),
                            malformed_readings = PollerStats::get(&stats.malformed_readings),
                            snapshots_saved = PollerStats::get(&stats.snapshots_saved),
                            save_failures = PollerStats::get(&stats.save_failures),
                            "poller stats"
                        );
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
