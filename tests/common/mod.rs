// Shared test helpers: scripted volume source, collecting sink and announcer.
#![allow(dead_code)]

use diskfree::announcer::Announcer;
use diskfree::error::SourceError;
use diskfree::models::*;
use diskfree::poller::{Poller, PollerDeps, PollerStats};
use diskfree::preferences::{Preferences, PreferencesStore, VoiceId};
use diskfree::report_hub::ReportSink;
use diskfree::volume_source::VolumeSource;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

pub fn local_volume(name: &str, mount: &str) -> LocalVolume {
    LocalVolume {
        name: name.into(),
        mount_point: PathBuf::from(mount),
        user_visible_mount_point: PathBuf::from(mount),
        is_internal: true,
        is_ejectable: false,
        is_browsable: true,
    }
}

pub fn network_volume(host: &str, mount: &str) -> NetworkVolume {
    NetworkVolume {
        username: "admin".into(),
        remote_host: host.into(),
        remote_path: "/share".into(),
        local_mount: PathBuf::from(mount),
        share_type: "smbfs".into(),
    }
}

/// Sample with `free_gigs` free out of `total_gigs`.
pub fn sample(free_gigs: u64, total_gigs: u64, timestamp: f64) -> SizeSample {
    let free = free_gigs * GIB;
    SizeSample::new(free, free, total_gigs * GIB, timestamp)
}

/// Volume source whose answers are set by the test.
pub struct FakeVolumeSource {
    /// `Err` makes discovery fail.
    pub local: Mutex<Result<Vec<LocalVolume>, String>>,
    pub network: Mutex<Result<Vec<NetworkVolume>, String>>,
    /// mount -> (important, opportunistic, total) bytes; a missing mount fails to sample.
    pub capacities: Mutex<HashMap<PathBuf, (u64, u64, u64)>>,
    pub discoveries: AtomicUsize,
}

impl Default for FakeVolumeSource {
    fn default() -> Self {
        Self {
            local: Mutex::new(Ok(Vec::new())),
            network: Mutex::new(Ok(Vec::new())),
            capacities: Mutex::new(HashMap::new()),
            discoveries: AtomicUsize::new(0),
        }
    }
}

impl FakeVolumeSource {
    pub fn with_local(volumes: Vec<LocalVolume>) -> Self {
        let source = Self::default();
        *source.local.lock().unwrap() = Ok(volumes);
        source
    }

    pub fn with_network(volumes: Vec<NetworkVolume>) -> Self {
        let source = Self::default();
        *source.network.lock().unwrap() = Ok(volumes);
        source
    }

    pub fn set_free_gigs(&self, mount: &str, free_gigs: u64, total_gigs: u64) {
        let free = free_gigs * GIB;
        self.set_capacity(mount, free, free, total_gigs * GIB);
    }

    pub fn set_capacity(&self, mount: &str, important: u64, opportunistic: u64, total: u64) {
        self.capacities
            .lock()
            .unwrap()
            .insert(PathBuf::from(mount), (important, opportunistic, total));
    }

    pub fn unmount(&self, mount: &str) {
        self.capacities.lock().unwrap().remove(Path::new(mount));
    }

    pub fn fail_discovery(&self) {
        *self.local.lock().unwrap() = Err("discovery unavailable".into());
        *self.network.lock().unwrap() = Err("discovery unavailable".into());
    }

    fn read(&self, mount_path: &Path, timestamp: f64) -> Result<SizeSample, SourceError> {
        self.capacities
            .lock()
            .unwrap()
            .get(mount_path)
            .map(|&(i, o, t)| SizeSample::new(i, o, t, timestamp))
            .ok_or_else(|| SourceError::Sample {
                mount: mount_path.to_path_buf(),
                details: "not mounted".into(),
            })
    }
}

impl VolumeSource for FakeVolumeSource {
    async fn enumerate_local_volumes(&self) -> Result<Vec<LocalVolume>, SourceError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        self.local
            .lock()
            .unwrap()
            .clone()
            .map_err(|details| SourceError::Discovery { details })
    }

    async fn enumerate_network_volumes(&self) -> Result<Vec<NetworkVolume>, SourceError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        self.network
            .lock()
            .unwrap()
            .clone()
            .map_err(|details| SourceError::Discovery { details })
    }

    async fn sample_capacity(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> Result<SizeSample, SourceError> {
        self.read(mount_path, timestamp)
    }

    async fn sample_capacity_network(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> Result<SizeSample, SourceError> {
        self.read(mount_path, timestamp)
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub reports: Mutex<Vec<CycleReport>>,
}

impl ReportSink for CollectingSink {
    fn publish(&self, report: CycleReport) {
        self.reports.lock().unwrap().push(report);
    }
}

#[derive(Default)]
pub struct CollectingAnnouncer {
    pub messages: Mutex<Vec<(String, VoiceId)>>,
}

impl CollectingAnnouncer {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }
}

impl Announcer for CollectingAnnouncer {
    fn announce(&self, message: String, voice: VoiceId) {
        self.messages.lock().unwrap().push((message, voice));
    }
}

/// A poller wired to in-memory collaborators.
pub struct Harness {
    pub poller: Poller<FakeVolumeSource>,
    pub source: Arc<FakeVolumeSource>,
    pub preferences: Arc<PreferencesStore>,
    pub sink: Arc<CollectingSink>,
    pub announcer: Arc<CollectingAnnouncer>,
    pub write_rx: mpsc::Receiver<VolumeRecords>,
    pub stats: Arc<PollerStats>,
    pub cancel_tx: watch::Sender<bool>,
    pub cancel: watch::Receiver<bool>,
}

impl Harness {
    /// Runs one uncancelled cycle at `now`.
    pub async fn cycle(&mut self, now: f64) -> CycleReport {
        self.poller
            .run_cycle(now, &self.cancel)
            .await
            .expect("cycle was cancelled")
    }
}

pub fn harness(
    class: VolumeClass,
    source: FakeVolumeSource,
    preferences: Preferences,
    prefs_path: &Path,
) -> Harness {
    let source = Arc::new(source);
    let preferences = Arc::new(PreferencesStore::new(prefs_path, preferences));
    let sink = Arc::new(CollectingSink::default());
    let announcer = Arc::new(CollectingAnnouncer::default());
    let stats = Arc::new(PollerStats::default());
    let (write_tx, write_rx) = mpsc::channel(4);
    let (cancel_tx, cancel) = watch::channel(false);
    let poller = Poller::new(
        class,
        PollerDeps {
            source: source.clone(),
            preferences: preferences.clone(),
            sink: sink.clone(),
            announcer: announcer.clone(),
            write_tx,
            stats: stats.clone(),
        },
    );
    Harness {
        poller,
        source,
        preferences,
        sink,
        announcer,
        write_rx,
        stats,
        cancel_tx,
        cancel,
    }
}
