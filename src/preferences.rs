// Durable user preferences (JSON). Read-mostly configuration for the pollers;
// a missing or unreadable file falls back to defaults and never blocks startup.

use crate::models::{VolumeClass, VolumeKey};
use crate::warning::ThresholdTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

/// Identifier of a speech voice, passed through to the announcer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub String);

impl VoiceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        VoiceId("Ellen".into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub local_volumes_to_show: BTreeSet<VolumeKey>,
    pub local_poll_interval_seconds: u64,
    pub network_volumes_to_show: BTreeSet<VolumeKey>,
    pub network_poll_interval_seconds: u64,
    pub sound_voice_on_warnings: bool,
    pub sound_voice_on_errors: bool,
    pub warning_voice: VoiceId,
    pub error_voice: VoiceId,
    pub low_space_warning_threshold_gigs: u64,
    pub low_space_error_threshold_gigs: u64,
    pub max_data_age_minutes: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            local_volumes_to_show: BTreeSet::new(),
            local_poll_interval_seconds: 4,
            network_volumes_to_show: BTreeSet::new(),
            network_poll_interval_seconds: 30,
            sound_voice_on_warnings: true,
            sound_voice_on_errors: true,
            warning_voice: VoiceId::default(),
            error_voice: VoiceId::default(),
            low_space_warning_threshold_gigs: 100,
            low_space_error_threshold_gigs: 20,
            max_data_age_minutes: 60.0,
        }
    }
}

impl Preferences {
    pub fn poll_interval(&self, class: VolumeClass) -> Duration {
        let secs = match class {
            VolumeClass::Local => self.local_poll_interval_seconds,
            VolumeClass::Network => self.network_poll_interval_seconds,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::try_from_secs_f64((self.max_data_age_minutes * 60.0).max(0.0))
            .unwrap_or(Duration::MAX)
    }

    pub fn selected(&self, class: VolumeClass) -> &BTreeSet<VolumeKey> {
        match class {
            VolumeClass::Local => &self.local_volumes_to_show,
            VolumeClass::Network => &self.network_volumes_to_show,
        }
    }

    fn selected_mut(&mut self, class: VolumeClass) -> &mut BTreeSet<VolumeKey> {
        match class {
            VolumeClass::Local => &mut self.local_volumes_to_show,
            VolumeClass::Network => &mut self.network_volumes_to_show,
        }
    }

    pub fn is_selected(&self, class: VolumeClass, key: &str) -> bool {
        self.selected(class).contains(key)
    }

    pub fn tier_enabled(&self, tier: ThresholdTier) -> bool {
        match tier {
            ThresholdTier::Warning => self.sound_voice_on_warnings,
            ThresholdTier::Error => self.sound_voice_on_errors,
        }
    }

    pub fn threshold_gigs(&self, tier: ThresholdTier) -> u64 {
        match tier {
            ThresholdTier::Warning => self.low_space_warning_threshold_gigs,
            ThresholdTier::Error => self.low_space_error_threshold_gigs,
        }
    }

    pub fn voice(&self, tier: ThresholdTier) -> &VoiceId {
        match tier {
            ThresholdTier::Warning => &self.warning_voice,
            ThresholdTier::Error => &self.error_voice,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.local_poll_interval_seconds > 0,
            "localPollIntervalSeconds must be > 0, got {}",
            self.local_poll_interval_seconds
        );
        anyhow::ensure!(
            self.network_poll_interval_seconds > 0,
            "networkPollIntervalSeconds must be > 0, got {}",
            self.network_poll_interval_seconds
        );
        anyhow::ensure!(
            self.max_data_age_minutes.is_finite() && self.max_data_age_minutes > 0.0,
            "maxDataAgeMinutes must be > 0, got {}",
            self.max_data_age_minutes
        );
        Ok(())
    }
}

/// Shared, file-backed holder of the current [`Preferences`].
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    current: RwLock<Preferences>,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(preferences),
        }
    }

    /// Loads `path`; a missing, unreadable or invalid file yields defaults.
    #[instrument(fields(store = "preferences", operation = "load"))]
    pub async fn load(path: &Path) -> Self {
        let preferences = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<Preferences>(&bytes) {
                Ok(p) => match p.validate() {
                    Ok(()) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, path = %path.display(), "invalid preferences, using defaults");
                        Preferences::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "cannot parse preferences, using defaults");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no preferences file, using defaults");
                Preferences::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "cannot read preferences, using defaults");
                Preferences::default()
            }
        };
        Self::new(path, preferences)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Preferences {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F: FnOnce(&mut Preferences)>(&self, f: F) {
        match self.current.write() {
            Ok(mut guard) => f(&mut *guard),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }

    /// Adds or removes a volume from the class's selection set.
    pub fn set_selected(&self, class: VolumeClass, key: &str, selected: bool) {
        self.update(|p| {
            let set = p.selected_mut(class);
            if selected {
                set.insert(key.to_string());
            } else {
                set.remove(key);
            }
        });
    }

    #[instrument(skip(self), fields(store = "preferences", operation = "save"))]
    pub async fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(&self.current())?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
