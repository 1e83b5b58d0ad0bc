//! Damped incremental statistics: recent observations outweigh old ones.

use serde::{Deserialize, Serialize};

/// Exponentially decayed running mean/variance with undecayed extremes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampedStatistic {
    pub decay: f64,
    pub weight: f64,
    pub mean: f64,
    pub variance: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl DampedStatistic {
    pub const FEATURES: usize = 6;

    pub fn new(decay: f64) -> Self {
        Self {
            decay,
            weight: 0.0,
            mean: 0.0,
            variance: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) {
        if self.weight == 0.0 {
            self.weight = 1.0;
            self.mean = value;
            self.variance = 0.0;
            self.std = 0.0;
            self.min = value;
            self.max = value;
            return;
        }

        let keep = 1.0 - self.decay;
        self.weight = 1.0 + self.weight * keep;
        let old_mean = self.mean;
        self.mean = old_mean + (value - old_mean) / self.weight;
        self.variance = keep * (self.variance + (value - old_mean) * (value - self.mean));
        self.std = self.variance.max(0.0).sqrt();
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `[weight, mean, variance, std, min, max]`; all zero before the first update.
    pub fn features(&self) -> [f64; Self::FEATURES] {
        [self.weight, self.mean, self.variance, self.std, self.min, self.max]
    }
}

impl Default for DampedStatistic {
    fn default() -> Self {
        Self::new(0.1)
    }
}

/// The four metrics tracked per stream (one host, or one ordered host pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatistics {
    pub packet_size: DampedStatistic,
    pub inter_arrival: DampedStatistic,
    pub byte_rate: DampedStatistic,
    pub packet_count: DampedStatistic,
    pub last_timestamp: Option<f64>,
}

impl StreamStatistics {
    pub const FEATURES: usize = 4 * DampedStatistic::FEATURES;

    pub fn new(decay: f64) -> Self {
        Self {
            packet_size: DampedStatistic::new(decay),
            inter_arrival: DampedStatistic::new(decay),
            byte_rate: DampedStatistic::new(decay),
            packet_count: DampedStatistic::new(decay),
            last_timestamp: None,
        }
    }

    /// Inter-arrival time and byte rate only move when time actually advanced.
    pub fn update(&mut self, timestamp: Option<f64>, bytes: f64, packets: f64) {
        self.packet_size.update(bytes);
        self.packet_count.update(packets);

        let Some(now) = timestamp else {
            return;
        };
        if let Some(last) = self.last_timestamp {
            let iat = now - last;
            if iat > 0.0 {
                self.inter_arrival.update(iat);
                self.byte_rate.update(bytes / iat);
            }
        }
        self.last_timestamp = Some(now);
    }

    pub fn features(&self) -> [f64; Self::FEATURES] {
        let mut out = [0.0; Self::FEATURES];
        let parts = [
            &self.packet_size,
            &self.inter_arrival,
            &self.byte_rate,
            &self.packet_count,
        ];
        for (chunk, stat) in out.chunks_exact_mut(DampedStatistic::FEATURES).zip(parts) {
            chunk.copy_from_slice(&stat.features());
        }
        out
    }
}
