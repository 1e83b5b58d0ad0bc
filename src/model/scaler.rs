//! Per-feature standardizer fitted one sample at a time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    /// Population variance
    variance: Vec<f64>,
    samples: u64,
}

impl StandardScaler {
    pub fn new(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            variance: vec![0.0; width],
            samples: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    pub fn partial_fit(&mut self, x: &[f64]) {
        assert_eq!(x.len(), self.width(), "scaler width mismatch");
        self.samples += 1;
        let n = self.samples as f64;
        for ((m, v), &xi) in self.mean.iter_mut().zip(self.variance.iter_mut()).zip(x) {
            let delta = xi - *m;
            *m += delta / n;
            // running M2 / n, kept as a variance so it can be persisted directly
            let m2 = *v * (n - 1.0) + delta * (xi - *m);
            *v = m2 / n;
        }
    }

    pub fn scale(&self, i: usize) -> f64 {
        let s = self.variance[i].max(0.0).sqrt();
        if s < 1e-12 {
            1.0
        } else {
            s
        }
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.width(), "scaler width mismatch");
        x.iter()
            .enumerate()
            .map(|(i, &xi)| (xi - self.mean[i]) / self.scale(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_batch_statistics() {
        let rows = [[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [6.0, 10.0]];
        let mut s = StandardScaler::new(2);
        for r in &rows {
            s.partial_fit(r);
        }
        assert!((s.mean()[0] - 3.0).abs() < 1e-12);
        assert!((s.variance()[0] - 3.5).abs() < 1e-12);
        // constant column keeps unit scale
        assert_eq!(s.scale(1), 1.0);
        let t = s.transform(&[3.0, 10.0]);
        assert_eq!(t, vec![0.0, 0.0]);
    }
}
