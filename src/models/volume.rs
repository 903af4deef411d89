// Volume identity: local disks and network shares

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Stable string key used for histories, selection sets and warning state.
pub type VolumeKey = String;

/// Volume class; each class runs its own poll loop with its own interval and record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeClass {
    Local,
    Network,
}

impl VolumeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeClass::Local => "local",
            VolumeClass::Network => "network",
        }
    }
}

impl fmt::Display for VolumeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mounted local volume. Two local volumes are the same volume iff their names match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolume {
    pub name: String,
    /// Real mount path, used for sampling.
    pub mount_point: PathBuf,
    /// Mount path as the user sees it (e.g. `/System/Volumes/Data` shows as `/`).
    pub user_visible_mount_point: PathBuf,
    pub is_internal: bool,
    pub is_ejectable: bool,
    pub is_browsable: bool,
}

impl PartialEq for LocalVolume {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for LocalVolume {}

impl Hash for LocalVolume {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A mounted network share. Identity is the full tuple: the same host mounted at two
/// paths is two volumes, as is one path reused by a different host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkVolume {
    pub username: String,
    pub remote_host: String,
    pub remote_path: String,
    pub local_mount: PathBuf,
    /// Share protocol / file system type (smbfs, afpfs, nfs, cifs, ...).
    pub share_type: String,
}

impl PartialOrd for NetworkVolume {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NetworkVolume {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local_mount
            .cmp(&other.local_mount)
            .then_with(|| self.remote_host.cmp(&other.remote_host))
            .then_with(|| self.remote_path.cmp(&other.remote_path))
            .then_with(|| self.username.cmp(&other.username))
            .then_with(|| self.share_type.cmp(&other.share_type))
    }
}

impl NetworkVolume {
    /// `//user@host/path on /mount (type)`; user is omitted when unknown.
    pub fn key(&self) -> VolumeKey {
        let user = if self.username.is_empty() {
            String::new()
        } else {
            format!("{}@", self.username)
        };
        format!(
            "//{}{}{} on {} ({})",
            user,
            self.remote_host,
            self.remote_path,
            self.local_mount.display(),
            self.share_type
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Volume {
    Local(LocalVolume),
    Network(NetworkVolume),
}

impl Volume {
    pub fn key(&self) -> VolumeKey {
        match self {
            Volume::Local(v) => v.name.clone(),
            Volume::Network(v) => v.key(),
        }
    }

    pub fn class(&self) -> VolumeClass {
        match self {
            Volume::Local(_) => VolumeClass::Local,
            Volume::Network(_) => VolumeClass::Network,
        }
    }

    /// Path handed to the capacity query.
    pub fn mount_path(&self) -> &Path {
        match self {
            Volume::Local(v) => &v.mount_point,
            Volume::Network(v) => &v.local_mount,
        }
    }

    /// Label used in announcements and logs.
    pub fn display_name(&self) -> String {
        match self {
            Volume::Local(v) => v.name.clone(),
            Volume::Network(v) => v.local_mount.display().to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        match self {
            Volume::Local(v) => v.is_internal,
            Volume::Network(_) => false,
        }
    }
}

impl From<LocalVolume> for Volume {
    fn from(v: LocalVolume) -> Self {
        Volume::Local(v)
    }
}

impl From<NetworkVolume> for Volume {
    fn from(v: NetworkVolume) -> Self {
        Volume::Network(v)
    }
}
