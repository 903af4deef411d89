// Error types for the volume source and record persistence boundaries.
// The poll loop recovers from all of these locally; none of them are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`crate::volume_source::VolumeSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("volume discovery failed: {details}")]
    Discovery { details: String },

    #[error("capacity sample failed for {mount}: {details}")]
    Sample { mount: PathBuf, details: String },

    #[error("command `{command}` failed: {details}")]
    Command { command: String, details: String },

    #[error("could not parse {context} output: {details}")]
    Parse {
        context: &'static str,
        details: String,
    },

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures loading or saving persisted volume records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record file io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record json codec: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record binary codec: {0}")]
    Binary(String),
}
