//! KitNET-style online network anomaly detector.
//!
//! Modular structure:
//! - [`records`]: Zeek-style connection records and the ndjson reader
//! - [`features`]: Fixed-layout feature extraction and damped stream statistics
//! - [`model`]: Scaler, feature mapper and the autoencoder ensemble
//! - [`detector`]: Phase machine: feature mapping, training, detecting
//! - [`storage`]: Versioned, checksummed model snapshots
//! - [`risk`]: Score to risk level at the service boundary
//! - [`logging`]: Structured logging and alert lines

pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod records;
pub mod risk;
pub mod storage;

pub use config::DetectorConfig;
pub use detector::{Detector, DetectorStats, Phase};
pub use error::{DetectorError, ModelLoadError, ModelSaveError, RecordError};
pub use features::{FeatureExtractor, FeatureVector};
pub use logging::StructuredLogger;
pub use records::{ConnectionRecord, RecordReader};
pub use risk::{RiskEngine, RiskLevel, ScoreInput};
pub use storage::PersistedModel;
