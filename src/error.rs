//! Error types for persistence and detector lifecycle operations.

use crate::detector::Phase;
use thiserror::Error;

/// A persisted model could not be restored. The caller decides whether to
/// retrain from feature mapping or abort; the detector never falls back on its own.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("model snapshot is not decodable: {0}")]
    Decode(String),

    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("model snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("model snapshot is incompatible with this detector: {0}")]
    Incompatible(String),

    #[error("model snapshot was taken before training finished")]
    NotTrained,
}

#[derive(Debug, Error)]
pub enum ModelSaveError {
    #[error("failed to write model snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode model snapshot: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("detector is still in {phase} phase")]
    NotTrained { phase: Phase },

    #[error(transparent)]
    Save(#[from] ModelSaveError),

    #[error(transparent)]
    Load(#[from] ModelLoadError),
}

/// A line of newline-delimited record input could not be turned into a record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read record input: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: not valid UTF-8")]
    Utf8 { line: usize },

    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
