//! SMOTE oversampling

use crate::error::{ChurnError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Each synthetic row lies on the segment between a class member and one of
/// its `k` nearest same-class neighbours (Euclidean, self excluded by index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Target size of each class relative to the majority class
    sampling_strategy: f64,
    /// Random seed
    seed: u64,
    /// Target samples per class
    #[serde(skip)]
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: 1.0,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set sampling strategy (ratio to the majority count)
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 1.0);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    /// k nearest neighbours of every member of `class_x`, as row indices into `class_x`.
    /// Ties are broken by index.
    fn neighbor_table(class_x: &Array2<f64>, k: usize) -> Vec<Vec<usize>> {
        (0..class_x.nrows())
            .into_par_iter()
            .map(|i| {
                let point = class_x.row(i);
                let mut candidates: Vec<(f64, usize)> = (0..class_x.nrows())
                    .filter(|&j| j != i)
                    .map(|j| (Self::squared_distance(point, class_x.row(j)), j))
                    .collect();
                candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                candidates.truncate(k);
                candidates.into_iter().map(|(_, j)| j).collect()
            })
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);

        let max_count = match counts.values().max() {
            Some(&max) if counts.len() >= 2 => max,
            _ => {
                return Err(ChurnError::ValidationError(
                    "Need at least 2 classes for SMOTE".to_string(),
                ))
            }
        };

        let targets = counts
            .iter()
            .map(|(&class, &count)| {
                let target = (max_count as f64 * self.sampling_strategy) as usize;
                (class, target.max(count))
            })
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or(ChurnError::ModelNotFitted)?;

        if x.nrows() != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let members = indices.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let n_to_generate = target_count.saturating_sub(members.len());
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 {
                continue;
            }
            if members.len() < 2 {
                return Err(ChurnError::ValidationError(format!(
                    "class {} has {} sample(s); SMOTE needs at least 2",
                    class,
                    members.len()
                )));
            }

            let class_x = x.select(Axis(0), members);
            let k = self.k_neighbors.min(members.len() - 1);
            let neighbors = Self::neighbor_table(&class_x, k);

            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_x.nrows());
                let neighbor = neighbors[idx][rng.gen_range(0..neighbors[idx].len())];
                let gap: f64 = rng.gen();

                let point = class_x.row(idx);
                let other = class_x.row(neighbor);
                synthetic_x.extend(point.iter().zip(other.iter()).map(|(&p, &n)| p + gap * (n - p)));
                synthetic_y.push(class);
            }

            debug!(class, generated = n_to_generate, k, "SMOTE class resampled");
        }

        let n_new = synthetic_y.len();
        let synthetic = Array2::from_shape_vec((n_new, n_features), synthetic_x)?;
        let x_out = ndarray::concatenate(Axis(0), &[x.view(), synthetic.view()])?;
        let y_out: Array1<i64> = y.iter().copied().chain(synthetic_y).collect();

        info!(
            original = x.nrows(),
            synthetic = n_new,
            total = x_out.nrows(),
            "SMOTE resampling complete"
        );

        Ok(ResampleResult {
            x: x_out,
            y: y_out,
            n_synthetic,
        })
    }
}
