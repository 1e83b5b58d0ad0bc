//! Seeded k-means (k-means++ init, Lloyd iterations, best of several restarts).

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster id per input row
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub k: usize,
}

fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl KMeans {
    /// Cluster the rows of `data`. `k` is clamped to the number of rows.
    pub fn fit(&self, data: ArrayView2<f64>) -> Clustering {
        let n = data.nrows();
        let k = self.k.clamp(1, n.max(1));
        if n == 0 {
            return Clustering {
                labels: Vec::new(),
                inertia: 0.0,
                k,
            };
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Clustering> = None;
        for _ in 0..self.restarts.max(1) {
            let centroids = init_plus_plus(data, k, &mut rng);
            let run = lloyd(data, centroids, self.max_iterations.max(1));
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        best.unwrap_or(Clustering {
            labels: vec![0; n],
            inertia: 0.0,
            k,
        })
    }
}

fn init_plus_plus(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut dist: Vec<f64> = data
        .axis_iter(Axis(0))
        .map(|row| sq_dist(row, data.row(first)))
        .collect();

    for c in 1..k {
        let total: f64 = dist.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, d) in dist.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(pick));
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            dist[i] = dist[i].min(sq_dist(row, data.row(pick)));
        }
    }
    centroids
}

fn nearest(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let d = sq_dist(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn lloyd(data: ArrayView2<f64>, mut centroids: Array2<f64>, max_iterations: usize) -> Clustering {
    let n = data.nrows();
    let k = centroids.nrows();
    let mut labels = vec![usize::MAX; n];

    for _ in 0..max_iterations {
        let mut changed = false;
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let (c, _) = nearest(row, &centroids);
            if labels[i] != c {
                labels[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for (row, &c) in data.axis_iter(Axis(0)).zip(&labels) {
            let mut target = sums.row_mut(c);
            target += &row;
            counts[c] += 1;
        }
        for (c, count) in counts.iter().enumerate() {
            // empty clusters keep their previous centroid
            if *count > 0 {
                let mean = &sums.row(c) / *count as f64;
                centroids.row_mut(c).assign(&mean);
            }
        }
    }

    let inertia = data
        .axis_iter(Axis(0))
        .map(|row| nearest(row, &centroids).1)
        .sum();
    let labels = data
        .axis_iter(Axis(0))
        .map(|row| nearest(row, &centroids).0)
        .collect();
    Clustering { labels, inertia, k }
}
