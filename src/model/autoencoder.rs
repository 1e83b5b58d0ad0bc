//! Single-hidden-layer autoencoder trained online with momentum SGD.
//! The anomaly signal is the RMS reconstruction error.

use super::percentile;
use crate::config::AutoencoderConfig;
use crate::error::ModelLoadError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

fn rmse(x: ArrayView1<f64>, y: &Array1<f64>) -> f64 {
    let n = x.len().max(1) as f64;
    let sum: f64 = x.iter().zip(y.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
    (sum / n).sqrt()
}

#[derive(Debug, Clone)]
pub struct AutoencoderUnit {
    w_enc: Array2<f64>,
    w_dec: Array2<f64>,
    b_enc: Array1<f64>,
    b_dec: Array1<f64>,
    v_w_enc: Array2<f64>,
    v_w_dec: Array2<f64>,
    v_b_enc: Array1<f64>,
    v_b_dec: Array1<f64>,
    learning_rate: f64,
    momentum: f64,
    history: VecDeque<f64>,
    history_capacity: usize,
    min_history: usize,
    fallback_threshold: f64,
    train_count: u64,
}

/// Weights and hyper-parameters of one unit, as persisted. Matrices are row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderState {
    pub input_size: usize,
    pub hidden_size: usize,
    pub w_enc: Vec<f64>,
    pub w_dec: Vec<f64>,
    pub b_enc: Vec<f64>,
    pub b_dec: Vec<f64>,
    pub learning_rate: f64,
    pub momentum: f64,
}

impl AutoencoderUnit {
    /// Xavier-uniform weights drawn from an RNG seeded with `seed`.
    pub fn new(input_size: usize, config: &AutoencoderConfig, seed: u64) -> Self {
        let input_size = input_size.max(1);
        let hidden_size = ((input_size as f64 * config.hidden_ratio) as usize).max(1);
        let limit = (6.0 / (input_size + hidden_size) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let mut rng = StdRng::seed_from_u64(seed);

        let w_enc = Array2::from_shape_fn((input_size, hidden_size), |_| rng.sample(dist));
        let w_dec = Array2::from_shape_fn((hidden_size, input_size), |_| rng.sample(dist));
        Self::assemble(
            w_enc,
            w_dec,
            Array1::zeros(hidden_size),
            Array1::zeros(input_size),
            config.learning_rate,
            config.momentum,
            config,
        )
    }

    fn assemble(
        w_enc: Array2<f64>,
        w_dec: Array2<f64>,
        b_enc: Array1<f64>,
        b_dec: Array1<f64>,
        learning_rate: f64,
        momentum: f64,
        config: &AutoencoderConfig,
    ) -> Self {
        Self {
            v_w_enc: Array2::zeros(w_enc.raw_dim()),
            v_w_dec: Array2::zeros(w_dec.raw_dim()),
            v_b_enc: Array1::zeros(b_enc.raw_dim()),
            v_b_dec: Array1::zeros(b_dec.raw_dim()),
            w_enc,
            w_dec,
            b_enc,
            b_dec,
            learning_rate,
            momentum,
            history: VecDeque::with_capacity(config.history_capacity.min(4096)),
            history_capacity: config.history_capacity.max(1),
            min_history: config.min_history,
            fallback_threshold: config.fallback_threshold,
            train_count: 0,
        }
    }

    pub fn input_size(&self) -> usize {
        self.w_enc.nrows()
    }

    pub fn hidden_size(&self) -> usize {
        self.w_enc.ncols()
    }

    pub fn train_count(&self) -> u64 {
        self.train_count
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn forward(&self, x: ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
        let hidden = (x.dot(&self.w_enc) + &self.b_enc).mapv_into(sigmoid);
        let output = (hidden.dot(&self.w_dec) + &self.b_dec).mapv_into(sigmoid);
        (hidden, output)
    }

    /// One SGD step on `x`. Returns the reconstruction error measured before the update.
    pub fn train_step(&mut self, x: &[f64]) -> f64 {
        assert_eq!(x.len(), self.input_size(), "autoencoder input width mismatch");
        let x = ArrayView1::from(x);
        let (hidden, output) = self.forward(x);
        let error = rmse(x, &output);

        let out_delta = (&output - &x) * output.mapv(|o| o * (1.0 - o));
        let hid_delta = out_delta.dot(&self.w_dec.t()) * hidden.mapv(|h| h * (1.0 - h));

        let grad_w_dec = hidden
            .view()
            .insert_axis(Axis(1))
            .dot(&out_delta.view().insert_axis(Axis(0)));
        let grad_w_enc = x
            .insert_axis(Axis(1))
            .dot(&hid_delta.view().insert_axis(Axis(0)));

        let (lr, mu) = (self.learning_rate, self.momentum);
        self.v_w_dec *= mu;
        self.v_w_dec.scaled_add(-lr, &grad_w_dec);
        self.v_b_dec *= mu;
        self.v_b_dec.scaled_add(-lr, &out_delta);
        self.v_w_enc *= mu;
        self.v_w_enc.scaled_add(-lr, &grad_w_enc);
        self.v_b_enc *= mu;
        self.v_b_enc.scaled_add(-lr, &hid_delta);

        self.w_dec += &self.v_w_dec;
        self.b_dec += &self.v_b_dec;
        self.w_enc += &self.v_w_enc;
        self.b_enc += &self.v_b_enc;

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(error);
        self.train_count += 1;
        error
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        assert_eq!(x.len(), self.input_size(), "autoencoder input width mismatch");
        let x = ArrayView1::from(x);
        let (_, output) = self.forward(x);
        rmse(x, &output)
    }

    /// Percentile of the rolling training error, or the fallback while the
    /// history is too short to mean anything.
    pub fn threshold(&self, pct: f64) -> f64 {
        if self.history.len() < self.min_history.max(1) {
            return self.fallback_threshold;
        }
        let values: Vec<f64> = self.history.iter().copied().collect();
        percentile(&values, pct)
    }

    pub fn to_state(&self) -> AutoencoderState {
        AutoencoderState {
            input_size: self.input_size(),
            hidden_size: self.hidden_size(),
            w_enc: self.w_enc.iter().copied().collect(),
            w_dec: self.w_dec.iter().copied().collect(),
            b_enc: self.b_enc.to_vec(),
            b_dec: self.b_dec.to_vec(),
            learning_rate: self.learning_rate,
            momentum: self.momentum,
        }
    }

    pub fn from_state(state: &AutoencoderState, config: &AutoencoderConfig) -> Result<Self, ModelLoadError> {
        let (n, h) = (state.input_size, state.hidden_size);
        let shape_err = |what: &str| {
            ModelLoadError::Incompatible(format!("autoencoder {what} does not match {n}x{h}"))
        };
        let w_enc = Array2::from_shape_vec((n, h), state.w_enc.clone())
            .map_err(|_| shape_err("encoder weights"))?;
        let w_dec = Array2::from_shape_vec((h, n), state.w_dec.clone())
            .map_err(|_| shape_err("decoder weights"))?;
        if state.b_enc.len() != h || state.b_dec.len() != n || n == 0 || h == 0 {
            return Err(shape_err("bias vectors"));
        }
        Ok(Self::assemble(
            w_enc,
            w_dec,
            Array1::from(state.b_enc.clone()),
            Array1::from(state.b_dec.clone()),
            state.learning_rate,
            state.momentum,
            config,
        ))
    }
}
