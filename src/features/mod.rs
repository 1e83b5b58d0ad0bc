//! Connection record → fixed-width feature vector.
//!
//! Layout of the base vector (60 values):
//! - connection metadata `0..10`
//! - byte/packet statistics `10..22`
//! - time of day `22..28`
//! - service indicators `28..36`
//! - DNS `36..44`, HTTP `44..50`, TLS `50..56`
//! - computed ratios `56..60`
//!
//! With stream features enabled, host then pair damped statistics follow (48 values).

mod damped;
pub mod encoding;
mod extractor;
mod streams;

pub use damped::{DampedStatistic, StreamStatistics};
pub use extractor::FeatureExtractor;
pub use streams::{StreamFeatures, StreamTracker};

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const BASE_FEATURE_DIM: usize = 60;

pub mod layout {
    use std::ops::Range;

    pub const CONNECTION: Range<usize> = 0..10;
    pub const TRAFFIC: Range<usize> = 10..22;
    pub const TIME: Range<usize> = 22..28;
    pub const SERVICE: Range<usize> = 28..36;
    pub const DNS: Range<usize> = 36..44;
    pub const HTTP: Range<usize> = 44..50;
    pub const TLS: Range<usize> = 50..56;
    pub const RATIOS: Range<usize> = 56..60;
    pub const STREAM: Range<usize> = 60..108;

    pub const SERVICE_DNS: usize = 28;
    pub const SERVICE_HTTP: usize = 29;
    pub const SERVICE_SSL: usize = 30;
    pub const SERVICE_UNKNOWN: usize = 35;
}

/// Width of vectors produced with the given stream setting.
pub fn feature_width(stream_features: bool) -> usize {
    if stream_features {
        BASE_FEATURE_DIM + StreamFeatures::WIDTH
    } else {
        BASE_FEATURE_DIM
    }
}

/// Fixed-size feature vector for the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn range(&self, range: Range<usize>) -> &[f64] {
        &self.values[range]
    }
}
