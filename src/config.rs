//! Detector configuration. Loaded once by the host service and handed to the detector.

use crate::error::DetectorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Data directory (model snapshot, alert output)
    pub data_dir: PathBuf,
    /// Path of the persisted model snapshot
    pub model_path: PathBuf,
    /// Write the snapshot when training finishes
    pub persist_on_finalize: bool,
    /// Feature extraction parameters
    pub features: FeaturesConfig,
    /// Feature mapping (clustering) parameters
    pub mapper: MapperConfig,
    /// Hyper-parameters shared by every autoencoder unit
    pub autoencoder: AutoencoderConfig,
    /// Training budget and thresholding
    pub training: TrainingConfig,
    /// Risk scoring thresholds
    pub risk: RiskConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Append damped host/pair stream statistics to the base vector
    pub stream_features: bool,
    /// Decay factor for stream statistics
    pub stream_decay: f64,
    /// Cap on tracked hosts (and, separately, on tracked pairs)
    pub max_stream_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Samples buffered before feature groups are computed
    pub buffer_size: usize,
    /// Upper bound on the number of feature groups
    pub max_groups: usize,
    /// Clusters smaller than this are dissolved
    pub min_group_size: usize,
    /// Seed for the clustering step
    pub seed: u64,
    /// Independent k-means runs; lowest inertia wins
    pub restarts: usize,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    /// Hidden width as a fraction of input width
    pub hidden_ratio: f64,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Rolling reconstruction-error history kept per unit
    pub history_capacity: usize,
    /// History needed before a percentile threshold is trusted
    pub min_history: usize,
    /// Threshold reported while the history is too short
    pub fallback_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Total training samples, feature-mapping samples included
    pub total_samples: u64,
    /// Percentile of combiner training error used as the adaptive threshold
    pub threshold_percentile: f64,
    /// Rolling history of normalized detection scores
    pub score_history: usize,
    /// Seed for autoencoder weight initialization
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Score at or above this is high risk (0.0-1.0)
    pub high_threshold: f64,
    /// Score at or above this is medium risk
    pub medium_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(".kitnet");
        Self {
            model_path: data_dir.join("kitnet_model.bin"),
            data_dir,
            persist_on_finalize: true,
            features: FeaturesConfig::default(),
            mapper: MapperConfig::default(),
            autoencoder: AutoencoderConfig::default(),
            training: TrainingConfig::default(),
            risk: RiskConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            stream_features: false,
            stream_decay: 0.1,
            max_stream_entries: 10_000,
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            buffer_size: 2000,
            max_groups: 10,
            min_group_size: 2,
            seed: 42,
            restarts: 3,
            max_iterations: 100,
        }
    }
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            hidden_ratio: 0.75,
            learning_rate: 0.001,
            momentum: 0.9,
            history_capacity: 1000,
            min_history: 100,
            fallback_threshold: 1.0,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            total_samples: 12_000,
            threshold_percentile: 99.0,
            score_history: 5000,
            seed: 7,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.9,
            medium_threshold: 0.5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl DetectorConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<DetectorConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    /// Reject parameter combinations the detector cannot run with.
    pub fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |msg: String| Err(DetectorError::InvalidConfig(msg));

        if self.mapper.buffer_size == 0 {
            return invalid("mapper.buffer_size must be positive".into());
        }
        if self.mapper.max_groups == 0 {
            return invalid("mapper.max_groups must be positive".into());
        }
        if self.mapper.restarts == 0 || self.mapper.max_iterations == 0 {
            return invalid("mapper.restarts and mapper.max_iterations must be positive".into());
        }
        if self.training.total_samples <= self.mapper.buffer_size as u64 {
            return invalid(format!(
                "training.total_samples ({}) must exceed mapper.buffer_size ({})",
                self.training.total_samples, self.mapper.buffer_size
            ));
        }
        if !(self.training.threshold_percentile > 0.0 && self.training.threshold_percentile <= 100.0) {
            return invalid("training.threshold_percentile must be in (0, 100]".into());
        }
        let ae = &self.autoencoder;
        if !(ae.hidden_ratio > 0.0 && ae.hidden_ratio <= 1.0) {
            return invalid("autoencoder.hidden_ratio must be in (0, 1]".into());
        }
        if !(ae.learning_rate > 0.0) || !(0.0..1.0).contains(&ae.momentum) {
            return invalid("autoencoder.learning_rate must be positive and momentum in [0, 1)".into());
        }
        if ae.history_capacity == 0 || !(ae.fallback_threshold > 0.0) {
            return invalid("autoencoder.history_capacity and fallback_threshold must be positive".into());
        }
        if !(self.features.stream_decay >= 0.0 && self.features.stream_decay < 1.0) {
            return invalid("features.stream_decay must be in [0, 1)".into());
        }
        if self.features.max_stream_entries == 0 {
            return invalid("features.max_stream_entries must be positive".into());
        }
        if self.risk.medium_threshold > self.risk.high_threshold {
            return invalid("risk.medium_threshold must not exceed risk.high_threshold".into());
        }
        Ok(())
    }
}
