use crate::history::RecordFormat;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub announcer: AnnouncerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the record files and, by default, Preferences.json.
    pub data_dir: PathBuf,
    #[serde(default)]
    pub record_format: RecordFormat,
    /// Overrides `<data_dir>/Preferences.json`.
    #[serde(default)]
    pub preferences_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of cycle reports kept in the broadcast channel for /ws/volumes (slow clients may lag).
    pub broadcast_capacity: usize,
    /// Pending snapshots per class waiting for the record writer.
    pub writer_channel_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            writer_channel_capacity: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log poller stats at INFO level.
    pub stats_log_interval_secs: u64,
    /// Upper bound for `mount` / `df` invocations; a stalled share must not hang its loop.
    pub command_timeout_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 300,
            command_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncerConfig {
    pub enabled: bool,
    /// Speech program invoked as `<command> -v <voice> <message>`.
    pub command: String,
    pub timeout_secs: u64,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(target_os = "macos"),
            command: "say".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8089,
                host: "127.0.0.1".into(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
                record_format: RecordFormat::default(),
                preferences_file: None,
            },
            publishing: PublishingConfig::default(),
            monitoring: MonitoringConfig::default(),
            announcer: AnnouncerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`). A missing default file yields
    /// [`AppConfig::default`]; an explicitly named file must exist.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var("CONFIG_FILE").ok();
        let path = explicit.clone().unwrap_or_else(|| "config.toml".into());
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::load_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                tracing::info!(path = %path, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("config {}: {}", path, e)),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.storage
            .preferences_file
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("Preferences.json"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.server.host.is_empty(),
            "server.host must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.data_dir.as_os_str().is_empty(),
            "storage.data_dir must be non-empty"
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.publishing.writer_channel_capacity > 0,
            "publishing.writer_channel_capacity must be > 0, got {}",
            self.publishing.writer_channel_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.command_timeout_secs > 0,
            "monitoring.command_timeout_secs must be > 0, got {}",
            self.monitoring.command_timeout_secs
        );
        if self.announcer.enabled {
            anyhow::ensure!(
                !self.announcer.command.is_empty(),
                "announcer.command must be non-empty when the announcer is enabled"
            );
            anyhow::ensure!(
                self.announcer.timeout_secs > 0,
                "announcer.timeout_secs must be > 0, got {}",
                self.announcer.timeout_secs
            );
        }
        Ok(())
    }
}
