//! Train / hold-out splitting

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row indices of one train / hold-out split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutSplit {
    /// Training indices, ascending
    pub train_indices: Vec<usize>,
    /// Hold-out indices, ascending
    pub test_indices: Vec<usize>,
}

/// Split `y.len()` rows into train and hold-out parts.
///
/// With `stratify`, each class contributes `round(count * test_size)` rows
/// (at least one, never all) to the hold-out part, so class ratios match.
pub fn train_test_split(
    y: &Array1<i64>,
    test_size: f64,
    stratify: bool,
    seed: u64,
) -> Result<HoldoutSplit> {
    let n_samples = y.len();
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::ValidationError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n_samples < 2 {
        return Err(ChurnError::ValidationError(format!(
            "need at least 2 samples to split, got {}",
            n_samples
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_samples);
    let mut test = Vec::new();

    if stratify {
        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in y.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        for (class, mut indices) in by_class {
            if indices.len() < 2 {
                return Err(ChurnError::ValidationError(format!(
                    "class {} has a single member; cannot stratify",
                    class
                )));
            }
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * test_size).round() as usize)
                .clamp(1, indices.len() - 1);
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }
    } else {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut rng);
        let n_test = ((n_samples as f64 * test_size).ceil() as usize).clamp(1, n_samples - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(HoldoutSplit {
        train_indices: train,
        test_indices: test,
    })
}
