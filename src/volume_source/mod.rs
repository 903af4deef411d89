// Volume discovery and capacity sampling.
// Local disks come from sysinfo; network shares from `mount` + `df -k`.

pub mod df;
pub mod mount_table;
mod shell;

use crate::error::SourceError;
use crate::models::{LocalVolume, NetworkVolume, SizeSample};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::Disks;
use tracing::instrument;

/// OS-facing collaborator queried by the pollers.
///
/// Timestamps are supplied by the caller so that every volume sampled in one
/// cycle shares the same instant.
pub trait VolumeSource: Send + Sync + 'static {
    /// Mounted, browsable, writable local volumes.
    fn enumerate_local_volumes(
        &self,
    ) -> impl Future<Output = Result<Vec<LocalVolume>, SourceError>> + Send;

    /// Currently active network mounts. A share that vanished simply stops appearing.
    fn enumerate_network_volumes(
        &self,
    ) -> impl Future<Output = Result<Vec<NetworkVolume>, SourceError>> + Send;

    fn sample_capacity(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> impl Future<Output = Result<SizeSample, SourceError>> + Send;

    fn sample_capacity_network(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> impl Future<Output = Result<SizeSample, SourceError>> + Send;
}

const PSEUDO_FS_TYPES: &[&str] = &[
    "tmpfs", "devtmpfs", "devfs", "overlay", "squashfs", "proc", "sysfs", "autofs", "ramfs",
    "nullfs",
];

const HIDDEN_MOUNT_PREFIXES: &[&str] = &["/dev", "/proc", "/sys", "/run", "/snap", "/boot", "/private/var/vm"];

const MACOS_DATA_VOLUME: &str = "/System/Volumes/Data";

/// False for mounts a user never browses: pseudo file systems, system partitions,
/// and macOS system sub-volumes other than the data volume.
pub fn is_browsable(mount_point: &Path, fs_type: &str) -> bool {
    if PSEUDO_FS_TYPES.contains(&fs_type) {
        return false;
    }
    if mount_point.starts_with("/System/Volumes") && mount_point != Path::new(MACOS_DATA_VOLUME) {
        return false;
    }
    !HIDDEN_MOUNT_PREFIXES
        .iter()
        .any(|prefix| mount_point.starts_with(prefix))
}

/// Maps the macOS data volume onto the root the user sees (`/System/Volumes/Data/x` → `/x`).
pub fn user_visible_mount_point(mount_point: &Path) -> PathBuf {
    match mount_point.strip_prefix(MACOS_DATA_VOLUME) {
        Ok(rest) => Path::new("/").join(rest),
        Err(_) => mount_point.to_path_buf(),
    }
}

/// Production [`VolumeSource`].
pub struct SystemVolumeSource {
    disks: Arc<Mutex<Disks>>,
    command_timeout: Duration,
}

impl SystemVolumeSource {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            command_timeout,
        }
    }
}

impl VolumeSource for SystemVolumeSource {
    #[instrument(skip(self), fields(source = "sysinfo", operation = "enumerate_local_volumes"))]
    async fn enumerate_local_volumes(&self) -> Result<Vec<LocalVolume>, SourceError> {
        let disks = self.disks.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = disks.lock().map_err(|e| SourceError::Discovery {
                details: format!("disks lock poisoned: {}", e),
            })?;
            *guard = Disks::new_with_refreshed_list();

            let mut out: Vec<LocalVolume> = Vec::new();
            for d in guard.list() {
                let mount_point = d.mount_point().to_path_buf();
                let fs_type = d.file_system().to_string_lossy().into_owned();
                if d.is_read_only() || mount_table::is_network_fs_type(&fs_type) {
                    continue;
                }
                let is_browsable = is_browsable(&mount_point, &fs_type);
                if !is_browsable {
                    continue;
                }
                let name = match d.name().to_string_lossy().into_owned() {
                    n if n.is_empty() => mount_point.display().to_string(),
                    n => n,
                };
                if out.iter().any(|v| v.name == name) {
                    continue;
                }
                out.push(LocalVolume {
                    name,
                    user_visible_mount_point: user_visible_mount_point(&mount_point),
                    mount_point,
                    is_internal: !d.is_removable(),
                    is_ejectable: d.is_removable(),
                    is_browsable,
                });
            }
            Ok(out)
        })
        .await?
    }

    #[instrument(skip(self), fields(source = "mount", operation = "enumerate_network_volumes"))]
    async fn enumerate_network_volumes(&self) -> Result<Vec<NetworkVolume>, SourceError> {
        let output = shell::run_command("mount", &[], self.command_timeout)
            .await
            .map_err(|e| SourceError::Discovery {
                details: e.to_string(),
            })?;
        Ok(mount_table::parse_mount_output(&output))
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "sample_capacity"))]
    async fn sample_capacity(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> Result<SizeSample, SourceError> {
        let disks = self.disks.clone();
        let mount = mount_path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut guard = disks.lock().map_err(|e| SourceError::Sample {
                mount: mount.clone(),
                details: format!("disks lock poisoned: {}", e),
            })?;
            guard.refresh(false);
            let disk = guard
                .list()
                .iter()
                .find(|d| d.mount_point() == mount.as_path())
                .ok_or_else(|| SourceError::Sample {
                    mount: mount.clone(),
                    details: "not mounted".into(),
                })?;
            // The portable API has no separate reclaimable figure.
            let available = disk.available_space();
            Ok(SizeSample::new(
                available,
                available,
                disk.total_space(),
                timestamp,
            ))
        })
        .await?
    }

    #[instrument(skip(self), fields(source = "df", operation = "sample_capacity_network"))]
    async fn sample_capacity_network(
        &self,
        mount_path: &Path,
        timestamp: f64,
    ) -> Result<SizeSample, SourceError> {
        let mount = mount_path.to_string_lossy();
        let output = shell::run_command("df", &["-k", mount.as_ref()], self.command_timeout)
            .await
            .map_err(|e| SourceError::Sample {
                mount: mount_path.to_path_buf(),
                details: e.to_string(),
            })?;
        let reading = df::parse_df_output(&output)?;
        let available = reading.available_bytes();
        Ok(SizeSample::new(
            available,
            available,
            reading.total_bytes(),
            timestamp,
        ))
    }
}
