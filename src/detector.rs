//! Detector orchestration: FEATURE_MAPPING → TRAINING → DETECTING.
//!
//! A `Detector` is a single-writer object. `process` mutates weights and stream
//! statistics, so callers serialize access (one owning thread or an external lock).

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::features::{FeatureExtractor, FeatureVector, StreamTracker};
use crate::model::{Ensemble, FeatureMapper, StandardScaler};
use crate::records::ConnectionRecord;
use crate::storage::PersistedModel;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Floor for the adaptive threshold so normalization never divides by zero.
const MIN_THRESHOLD: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    FeatureMapping,
    Training,
    Detecting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::FeatureMapping => "FEATURE_MAPPING",
            Phase::Training => "TRAINING",
            Phase::Detecting => "DETECTING",
        })
    }
}

/// Externally observable detector statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub phase: Phase,
    pub total_processed: u64,
    pub anomalies_detected: u64,
    pub samples_seen: u64,
    pub training_progress: f64,
    pub adaptive_threshold: f64,
    pub num_autoencoders: usize,
    pub feature_group_count: usize,
    pub tracked_hosts: usize,
    pub tracked_pairs: usize,
}

pub struct Detector {
    config: DetectorConfig,
    extractor: FeatureExtractor,
    streams: StreamTracker,
    scaler: StandardScaler,
    mapper: FeatureMapper,
    ensemble: Option<Ensemble>,
    phase: Phase,
    samples_seen: u64,
    adaptive_threshold: f64,
    total_processed: u64,
    anomalies_detected: u64,
    scores: VecDeque<f64>,
}

impl Detector {
    /// Fresh detector in the feature-mapping phase.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.features.clone());
        let width = extractor.width();
        info!(
            width,
            training_budget = config.training.total_samples,
            mapping_buffer = config.mapper.buffer_size,
            "detector initialized"
        );
        Ok(Self {
            streams: StreamTracker::new(&config.features),
            scaler: StandardScaler::new(width),
            mapper: FeatureMapper::new(config.mapper.clone(), width),
            ensemble: None,
            phase: Phase::FeatureMapping,
            samples_seen: 0,
            adaptive_threshold: config.autoencoder.fallback_threshold,
            total_processed: 0,
            anomalies_detected: 0,
            scores: VecDeque::with_capacity(config.training.score_history.min(8192)),
            extractor,
            config,
        })
    }

    /// Restore from `config.model_path` when it exists, otherwise start fresh.
    /// A snapshot that exists but cannot be used is an error, never a silent retrain.
    pub fn initialize(config: DetectorConfig) -> Result<Self, DetectorError> {
        let path = config.model_path.clone();
        if path.exists() {
            info!(path = %path.display(), "loading existing model");
            let model = PersistedModel::load(&path)?;
            return Self::from_snapshot(config, model);
        }
        info!(path = %path.display(), "no model found, starting feature mapping");
        Self::new(config)
    }

    /// Detector in the detecting phase, built from a persisted model.
    pub fn from_snapshot(config: DetectorConfig, model: PersistedModel) -> Result<Self, DetectorError> {
        let mut detector = Self::new(config)?;
        model.validate(detector.width())?;
        let ensemble = Ensemble::from_states(
            model.feature_groups,
            &model.autoencoders,
            &model.combiner,
            &detector.config.autoencoder,
        )?;
        detector.scaler = model.scaler;
        detector.ensemble = Some(ensemble);
        detector.samples_seen = model.samples_seen;
        detector.adaptive_threshold = model.adaptive_threshold;
        detector.phase = Phase::Detecting;
        info!(
            autoencoders = detector.ensemble.as_ref().map_or(0, Ensemble::unit_count),
            threshold = detector.adaptive_threshold,
            "detector restored"
        );
        Ok(detector)
    }

    pub fn width(&self) -> usize {
        self.extractor.width()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn streams(&self) -> &StreamTracker {
        &self.streams
    }

    pub fn adaptive_threshold(&self) -> f64 {
        self.adaptive_threshold
    }

    pub fn feature_groups(&self) -> Option<&[Vec<usize>]> {
        self.ensemble.as_ref().map(Ensemble::groups)
    }

    pub fn score_history(&self) -> impl Iterator<Item = &f64> {
        self.scores.iter()
    }

    pub fn training_progress(&self) -> f64 {
        (self.samples_seen as f64 / self.config.training.total_samples as f64).min(1.0)
    }

    /// Fold the record into stream statistics (when enabled), extract and score it.
    pub fn process(&mut self, record: &ConnectionRecord) -> f64 {
        let vector = if self.extractor.stream_features() {
            let streams = self.streams.observe(record);
            self.extractor.extract(record, Some(&streams))
        } else {
            self.extractor.extract(record, None)
        };
        self.process_vector(&vector)
    }

    /// Route one vector through the current phase. Returns 0.0 until detecting,
    /// then a normalized score in `[0, 1]`.
    ///
    /// Panics if the vector width differs from the configured width.
    pub fn process_vector(&mut self, vector: &FeatureVector) -> f64 {
        assert_eq!(
            vector.dim(),
            self.width(),
            "feature vector width does not match detector width"
        );
        self.total_processed += 1;
        match self.phase {
            Phase::FeatureMapping => self.map_features(vector.as_slice()),
            Phase::Training => self.train(vector.as_slice()),
            Phase::Detecting => self.detect(vector.as_slice()),
        }
    }

    fn map_features(&mut self, x: &[f64]) -> f64 {
        self.samples_seen += 1;
        self.scaler.partial_fit(x);
        let normalized = self.scaler.transform(x);

        if let Some(groups) = self.mapper.add_sample(&normalized) {
            let groups = groups.to_vec();
            info!(samples = self.samples_seen, groups = groups.len(), "feature mapping complete");
            self.ensemble = Some(Ensemble::new(
                groups,
                &self.config.autoencoder,
                self.config.training.seed,
            ));
            self.phase = Phase::Training;
        }
        0.0
    }

    fn train(&mut self, x: &[f64]) -> f64 {
        self.samples_seen += 1;
        let normalized = self.scaler.transform(x);
        if let Some(ensemble) = self.ensemble.as_mut() {
            ensemble.train(&normalized);
        }
        if self.samples_seen >= self.config.training.total_samples {
            self.finalize_training();
        }
        0.0
    }

    fn finalize_training(&mut self) {
        let pct = self.config.training.threshold_percentile;
        let threshold = self
            .ensemble
            .as_ref()
            .map_or(self.config.autoencoder.fallback_threshold, |e| {
                e.combiner().threshold(pct)
            });
        self.adaptive_threshold = if threshold.is_finite() {
            threshold.max(MIN_THRESHOLD)
        } else {
            self.config.autoencoder.fallback_threshold
        };
        self.phase = Phase::Detecting;
        info!(
            samples = self.samples_seen,
            threshold = self.adaptive_threshold,
            "training complete"
        );

        if self.config.persist_on_finalize {
            let path = self.config.model_path.clone();
            if let Err(e) = self.save(&path) {
                warn!(path = %path.display(), error = %e, "failed to persist model after training");
            }
        }
    }

    fn detect(&mut self, x: &[f64]) -> f64 {
        let normalized = self.scaler.transform(x);
        let raw = self.ensemble.as_ref().map_or(0.0, |e| e.score(&normalized));
        let score = (raw / self.adaptive_threshold).min(1.0).max(0.0);

        if self.scores.len() >= self.config.training.score_history.max(1) {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
        if score >= 1.0 {
            self.anomalies_detected += 1;
        }
        score
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            phase: self.phase,
            total_processed: self.total_processed,
            anomalies_detected: self.anomalies_detected,
            samples_seen: self.samples_seen,
            training_progress: self.training_progress(),
            adaptive_threshold: self.adaptive_threshold,
            num_autoencoders: self.ensemble.as_ref().map_or(0, Ensemble::unit_count),
            feature_group_count: self.ensemble.as_ref().map_or(0, |e| e.groups().len()),
            tracked_hosts: self.streams.host_count(),
            tracked_pairs: self.streams.pair_count(),
        }
    }

    /// Snapshot of a trained detector.
    pub fn snapshot(&self) -> Result<PersistedModel, DetectorError> {
        let ensemble = match (self.phase, self.ensemble.as_ref()) {
            (Phase::Detecting, Some(e)) => e,
            _ => return Err(DetectorError::NotTrained { phase: self.phase }),
        };
        Ok(PersistedModel {
            phase: self.phase,
            feature_width: self.width(),
            scaler: self.scaler.clone(),
            feature_groups: ensemble.groups().to_vec(),
            autoencoders: ensemble.unit_states(),
            combiner: ensemble.combiner_state(),
            adaptive_threshold: self.adaptive_threshold,
            samples_seen: self.samples_seen,
            saved_at: Utc::now().timestamp_millis(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), DetectorError> {
        self.snapshot()?.save(path)?;
        Ok(())
    }

    /// Drop everything learned and start over from feature mapping.
    pub fn reset(&mut self) {
        let width = self.width();
        self.streams.clear();
        self.scaler = StandardScaler::new(width);
        self.mapper = FeatureMapper::new(self.config.mapper.clone(), width);
        self.ensemble = None;
        self.phase = Phase::FeatureMapping;
        self.samples_seen = 0;
        self.adaptive_threshold = self.config.autoencoder.fallback_threshold;
        self.total_processed = 0;
        self.anomalies_detected = 0;
        self.scores.clear();
        info!("detector reset, retraining from feature mapping");
    }
}

