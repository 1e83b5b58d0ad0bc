//! Feature mapping: buffer standardized vectors, then cluster feature indices into
//! correlated groups. Groups are computed once and frozen.

use super::kmeans::KMeans;
use crate::config::MapperConfig;
use ndarray::{Array2, Axis};
use tracing::info;

/// Indices of the feature vector owned by one ensemble member.
pub type FeatureGroup = Vec<usize>;

pub struct FeatureMapper {
    config: MapperConfig,
    width: usize,
    buffer: Vec<Vec<f64>>,
    groups: Option<Vec<FeatureGroup>>,
}

impl FeatureMapper {
    pub fn new(config: MapperConfig, width: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(config.buffer_size),
            config,
            width,
            groups: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.groups.is_some()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn groups(&self) -> Option<&[FeatureGroup]> {
        self.groups.as_deref()
    }

    /// Buffer one standardized vector. Returns the groups on the call that fills the buffer.
    pub fn add_sample(&mut self, x: &[f64]) -> Option<&[FeatureGroup]> {
        if self.groups.is_some() {
            return None;
        }
        assert_eq!(x.len(), self.width, "feature mapper width mismatch");
        self.buffer.push(x.to_vec());
        if self.buffer.len() < self.config.buffer_size {
            return None;
        }

        let groups = self.compute_groups();
        self.buffer = Vec::new();
        self.groups = Some(groups);
        self.groups.as_deref()
    }

    fn compute_groups(&self) -> Vec<FeatureGroup> {
        let samples = self.buffer.len();
        let n = self.width;

        // one observation row per feature, across all buffered samples
        let mut rows = Array2::<f64>::zeros((n, samples));
        for (s, sample) in self.buffer.iter().enumerate() {
            for (f, v) in sample.iter().enumerate() {
                rows[[f, s]] = *v;
            }
        }
        for mut row in rows.axis_iter_mut(Axis(0)) {
            let mean = row.mean().unwrap_or(0.0);
            let std = row.std(0.0);
            let std = if std > 0.0 { std } else { 1.0 };
            row.mapv_inplace(|v| (v - mean) / std);
        }

        let min_size = self.config.min_group_size.max(1);
        let k = self.config.max_groups.min((n / min_size).max(2));
        let clustering = KMeans {
            k,
            restarts: self.config.restarts,
            max_iterations: self.config.max_iterations,
            seed: self.config.seed,
        }
        .fit(rows.view());

        let groups = assign_groups(&clustering.labels, clustering.k, n, min_size);
        info!(
            features = n,
            samples,
            groups = groups.len(),
            sizes = ?groups.iter().map(Vec::len).collect::<Vec<_>>(),
            "feature groups computed"
        );
        groups
    }
}

/// Keep clusters with at least `min_size` members, then hand every uncovered index
/// to whichever group is smallest at that moment. With no surviving cluster, all
/// indices form one group.
pub fn assign_groups(labels: &[usize], k: usize, n: usize, min_size: usize) -> Vec<FeatureGroup> {
    let mut groups: Vec<FeatureGroup> = (0..k)
        .map(|c| (0..n).filter(|&i| labels.get(i) == Some(&c)).collect::<Vec<_>>())
        .filter(|g: &Vec<usize>| g.len() >= min_size)
        .collect();

    let mut covered = vec![false; n];
    for i in groups.iter().flatten() {
        covered[*i] = true;
    }
    let uncovered: Vec<usize> = (0..n).filter(|i| !covered[*i]).collect();

    if groups.is_empty() {
        if !uncovered.is_empty() {
            groups.push(uncovered);
        }
        return groups;
    }
    for i in uncovered {
        if let Some(smallest) = groups.iter_mut().min_by_key(|g| g.len()) {
            smallest.push(i);
        }
    }
    for g in &mut groups {
        g.sort_unstable();
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_clusters_are_redistributed() {
        // cluster 2 is a singleton and cluster 3 is empty
        let labels = [0, 0, 1, 1, 1, 2, 0];
        let groups = assign_groups(&labels, 4, 7, 2);
        assert_eq!(groups, vec![vec![0, 1, 5, 6], vec![2, 3, 4]]);
    }

    #[test]
    fn all_singletons_collapse_into_one_group() {
        let labels = [0, 1, 2];
        let groups = assign_groups(&labels, 3, 3, 2);
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }
}
