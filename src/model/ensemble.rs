//! Two-layer ensemble: one autoencoder per feature group, one combiner over their errors.

use super::autoencoder::{AutoencoderState, AutoencoderUnit};
use super::mapper::FeatureGroup;
use crate::config::AutoencoderConfig;
use crate::error::ModelLoadError;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Ensemble {
    groups: Vec<FeatureGroup>,
    units: Vec<AutoencoderUnit>,
    combiner: AutoencoderUnit,
}

/// Unit seeds are spread out from the base seed so units never share initial weights.
fn unit_seed(base: u64, position: usize) -> u64 {
    base.wrapping_add((position as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl Ensemble {
    pub fn new(groups: Vec<FeatureGroup>, config: &AutoencoderConfig, seed: u64) -> Self {
        let units: Vec<AutoencoderUnit> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| AutoencoderUnit::new(g.len(), config, unit_seed(seed, i)))
            .collect();
        let combiner = AutoencoderUnit::new(groups.len(), config, unit_seed(seed, groups.len()));
        info!(
            units = units.len(),
            combiner_inputs = combiner.input_size(),
            "ensemble initialized"
        );
        Self {
            groups,
            units,
            combiner,
        }
    }

    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn combiner(&self) -> &AutoencoderUnit {
        &self.combiner
    }

    fn subset(x: &[f64], group: &[usize]) -> Vec<f64> {
        group.iter().map(|&i| x[i]).collect()
    }

    /// Train every unit on its slice of `x`, then the combiner on the units'
    /// post-update errors, the same quantity it sees while detecting.
    /// Returns those per-group errors.
    pub fn train(&mut self, x: &[f64]) -> Vec<f64> {
        let errors: Vec<f64> = self
            .units
            .iter_mut()
            .zip(&self.groups)
            .map(|(unit, group)| {
                let slice = Self::subset(x, group);
                unit.train_step(&slice);
                unit.predict(&slice)
            })
            .collect();
        self.combiner.train_step(&errors);
        errors
    }

    /// Raw combiner reconstruction error for `x`. No state changes.
    pub fn score(&self, x: &[f64]) -> f64 {
        let errors = self.layer_errors(x);
        self.combiner.predict(&errors)
    }

    /// Per-group reconstruction errors, in group order.
    pub fn layer_errors(&self, x: &[f64]) -> Vec<f64> {
        self.units
            .iter()
            .zip(&self.groups)
            .map(|(unit, group)| unit.predict(&Self::subset(x, group)))
            .collect()
    }

    pub fn unit_states(&self) -> Vec<AutoencoderState> {
        self.units.iter().map(AutoencoderUnit::to_state).collect()
    }

    pub fn combiner_state(&self) -> AutoencoderState {
        self.combiner.to_state()
    }

    pub fn from_states(
        groups: Vec<FeatureGroup>,
        units: &[AutoencoderState],
        combiner: &AutoencoderState,
        config: &AutoencoderConfig,
    ) -> Result<Self, ModelLoadError> {
        if units.len() != groups.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "{} autoencoders for {} feature groups",
                units.len(),
                groups.len()
            )));
        }
        for (i, (state, group)) in units.iter().zip(&groups).enumerate() {
            if state.input_size != group.len() {
                return Err(ModelLoadError::Incompatible(format!(
                    "autoencoder {i} expects {} inputs, group has {}",
                    state.input_size,
                    group.len()
                )));
            }
        }
        if combiner.input_size != groups.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "combiner expects {} inputs, ensemble has {} units",
                combiner.input_size,
                groups.len()
            )));
        }
        let units = units
            .iter()
            .map(|s| AutoencoderUnit::from_state(s, config))
            .collect::<Result<Vec<_>, _>>()?;
        let combiner = AutoencoderUnit::from_state(combiner, config)?;
        Ok(Self {
            groups,
            units,
            combiner,
        })
    }
}
