//! Versioned binary model snapshot.
//!
//! File layout: `KNET` magic, then a bincode envelope
//! `{ format_version, sha256(payload), payload }`. The payload is only decoded
//! after the version and checksum have been checked.

use crate::detector::Phase;
use crate::error::{ModelLoadError, ModelSaveError};
use crate::model::{AutoencoderState, FeatureGroup, StandardScaler};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub const MODEL_FORMAT_VERSION: u32 = 1;
const MAGIC: &[u8; 4] = b"KNET";

/// Everything needed to bring a detector straight back into the detecting phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub phase: Phase,
    pub feature_width: usize,
    pub scaler: StandardScaler,
    pub feature_groups: Vec<FeatureGroup>,
    pub autoencoders: Vec<AutoencoderState>,
    pub combiner: AutoencoderState,
    pub adaptive_threshold: f64,
    pub samples_seen: u64,
    /// Epoch milliseconds
    pub saved_at: i64,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u32,
    checksum: Vec<u8>,
    payload: Vec<u8>,
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Only `tmp` is ever written; `path` changes through the rename alone.
fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    {
        let mut file = fs::File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp, path)
}

impl PersistedModel {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelSaveError> {
        let payload = bincode::serde::encode_to_vec(self, bincode_config())
            .map_err(|e| ModelSaveError::Encode(e.to_string()))?;
        let envelope = SnapshotEnvelope {
            format_version: MODEL_FORMAT_VERSION,
            checksum: Sha256::digest(&payload).to_vec(),
            payload,
        };
        let body = bincode::serde::encode_to_vec(&envelope, bincode_config())
            .map_err(|e| ModelSaveError::Encode(e.to_string()))?;
        let mut out = Vec::with_capacity(MAGIC.len() + body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let body = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| ModelLoadError::Decode("missing snapshot header".into()))?;
        let (envelope, _): (SnapshotEnvelope, usize) =
            bincode::serde::decode_from_slice(body, bincode_config())
                .map_err(|e| ModelLoadError::Decode(e.to_string()))?;

        if envelope.format_version != MODEL_FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion {
                found: envelope.format_version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        if Sha256::digest(&envelope.payload).as_slice() != envelope.checksum.as_slice() {
            return Err(ModelLoadError::ChecksumMismatch);
        }
        let (model, _): (PersistedModel, usize) =
            bincode::serde::decode_from_slice(&envelope.payload, bincode_config())
                .map_err(|e| ModelLoadError::Decode(e.to_string()))?;
        Ok(model)
    }

    /// Write atomically: a sibling temp file is renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), ModelSaveError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        if let Err(e) = write_then_rename(&tmp, path, &bytes) {
            match fs::remove_file(&tmp) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    warn!(path = %tmp.display(), error = %cleanup, "failed to remove partial snapshot");
                }
                _ => {}
            }
            return Err(e.into());
        }
        info!(path = %path.display(), bytes = bytes.len(), "model snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = fs::read(path)?;
        let model = Self::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            autoencoders = model.autoencoders.len(),
            threshold = model.adaptive_threshold,
            "model snapshot loaded"
        );
        Ok(model)
    }

    /// Structural checks against the width the detector is configured for.
    pub fn validate(&self, width: usize) -> Result<(), ModelLoadError> {
        if self.phase != Phase::Detecting {
            return Err(ModelLoadError::NotTrained);
        }
        if self.feature_width != width || self.scaler.width() != width {
            return Err(ModelLoadError::Incompatible(format!(
                "snapshot feature width {} (scaler {}), detector expects {width}",
                self.feature_width,
                self.scaler.width()
            )));
        }
        if self.scaler.variance().len() != width {
            return Err(ModelLoadError::Incompatible(format!(
                "scaler has {} variances for {width} features",
                self.scaler.variance().len()
            )));
        }
        let usable_mean = self.scaler.mean().iter().all(|m| m.is_finite());
        let usable_variance = self
            .scaler
            .variance()
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !(usable_mean && usable_variance) {
            return Err(ModelLoadError::Incompatible(
                "scaler parameters must be finite with non-negative variance".into(),
            ));
        }
        let mut seen = vec![false; width];
        for i in self.feature_groups.iter().flatten() {
            match seen.get_mut(*i) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(ModelLoadError::Incompatible(format!(
                        "feature index {i} belongs to more than one group"
                    )))
                }
                None => {
                    return Err(ModelLoadError::Incompatible(format!(
                        "feature index {i} out of range for width {width}"
                    )))
                }
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(ModelLoadError::Incompatible(format!(
                "feature index {missing} is not covered by any group"
            )));
        }
        if !(self.adaptive_threshold.is_finite() && self.adaptive_threshold > 0.0) {
            return Err(ModelLoadError::Incompatible(format!(
                "adaptive threshold {} is not usable",
                self.adaptive_threshold
            )));
        }
        Ok(())
    }
}
