//! KitNET-style ensemble: standardizer, feature mapper, autoencoder units and combiner.

mod autoencoder;
mod ensemble;
mod kmeans;
mod mapper;
mod scaler;

pub use autoencoder::{AutoencoderState, AutoencoderUnit};
pub use ensemble::Ensemble;
pub use kmeans::{Clustering, KMeans};
pub use mapper::{assign_groups, FeatureGroup, FeatureMapper};
pub use scaler::StandardScaler;

/// Percentile with linear interpolation between closest ranks. 0.0 for empty input.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
