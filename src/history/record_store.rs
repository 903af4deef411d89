// Durable per-class snapshot of volume records.
// Missing file loads as empty. Saves go to a synced temp sibling, then rename over the target.

use super::blob;
use crate::error::RecordError;
use crate::models::{SizeSample, VolumeClass, VolumeRecords};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use wincode::{SchemaRead, SchemaWrite};

/// On-disk encoding of a record file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Keyed JSON object: `{ "<volume key>": [ {importantCapacityBytes, ...}, ... ] }`.
    #[default]
    Json,
    /// Version-prefixed wincode list of `{key, samples}` entries.
    Binary,
}

impl RecordFormat {
    fn extension(&self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Binary => "bin",
        }
    }
}

#[derive(Debug, Clone, SchemaRead, SchemaWrite)]
struct RecordEntry {
    key: String,
    samples: Vec<SizeSample>,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    format: RecordFormat,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, format: RecordFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// `LocalVolumeRecords.<ext>` / `NetworkVolumeRecords.<ext>` under `dir`.
    pub fn for_class(dir: &Path, class: VolumeClass, format: RecordFormat) -> Self {
        let stem = match class {
            VolumeClass::Local => "LocalVolumeRecords",
            VolumeClass::Network => "NetworkVolumeRecords",
        };
        Self::new(dir.join(format!("{}.{}", stem, format.extension())), format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    #[instrument(skip(self), fields(store = "records", operation = "load", path = %self.path.display()))]
    pub async fn load(&self) -> Result<VolumeRecords, RecordError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(VolumeRecords::new());
            }
            Err(source) => {
                return Err(RecordError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match self.format {
            RecordFormat::Json => Ok(serde_json::from_slice(&bytes)?),
            RecordFormat::Binary => decode_binary(&bytes),
        }
    }

    #[instrument(skip(self, records), fields(store = "records", operation = "save", volumes = records.len()))]
    pub async fn save(&self, records: &VolumeRecords) -> Result<(), RecordError> {
        let bytes = match self.format {
            RecordFormat::Json => serde_json::to_vec(records)?,
            RecordFormat::Binary => encode_binary(records)?,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_err(source))?;
        }
        let tmp = self.path.with_extension(format!("{}.tmp", self.format.extension()));
        self.write_synced(&tmp, &bytes)
            .await
            .map_err(|source| self.io_err(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_err(source))?;
        Ok(())
    }

    /// The temp file reaches the disk before it can replace the target.
    async fn write_synced(&self, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }

    fn io_err(&self, source: std::io::Error) -> RecordError {
        RecordError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn encode_binary(records: &VolumeRecords) -> Result<Vec<u8>, RecordError> {
    let entries: Vec<RecordEntry> = records
        .iter()
        .map(|(key, samples)| RecordEntry {
            key: key.clone(),
            samples: samples.clone(),
        })
        .collect();
    let payload = wincode::serialize(&entries)
        .map_err(|e| RecordError::Binary(format!("wincode serialize: {}", e)))?;
    Ok(blob::with_version_prefix(blob::RECORDS_VERSION, payload))
}

fn decode_binary(bytes: &[u8]) -> Result<VolumeRecords, RecordError> {
    let Some((version, payload)) = blob::split_version(bytes) else {
        return Ok(VolumeRecords::new());
    };
    if version != blob::RECORDS_VERSION {
        return Err(RecordError::Binary(format!(
            "unsupported record file version {}",
            version
        )));
    }
    let entries: Vec<RecordEntry> = wincode::deserialize(payload)
        .map_err(|e| RecordError::Binary(format!("wincode deserialize: {}", e)))?;
    Ok(entries.into_iter().map(|e| (e.key, e.samples)).collect())
}
