//! Binary classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hold-out evaluation of a fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Area under the ROC curve; None when the labels hold a single class
    pub roc_auc: Option<f64>,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute classification metrics from 0/1 labels and positive-class probabilities
    pub fn compute_classification(
        y_true: &Array1<i64>,
        y_pred: &Array1<i64>,
        y_prob: Option<&Array1<f64>>,
    ) -> Self {
        let (tp, fp, tn, fn_) = Self::confusion_counts(y_true, y_pred);
        let n = y_true.len();

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(tp + tn, n),
            precision,
            recall,
            f1_score,
            roc_auc: y_prob.and_then(|p| roc_auc(y_true, p)),
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
            n_samples: n,
        }
    }

    /// (tp, fp, tn, fn) with class 1 as positive
    fn confusion_counts(y_true: &Array1<i64>, y_pred: &Array1<i64>) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == 1, p == 1) {
                (true, true) => counts.0 += 1,
                (false, true) => counts.1 += 1,
                (false, false) => counts.2 += 1,
                (true, false) => counts.3 += 1,
            }
        }
        counts
    }

    /// Metrics as name/value pairs, for artifact metadata
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        let mut pairs = vec![
            ("accuracy".to_string(), self.accuracy),
            ("precision".to_string(), self.precision),
            ("recall".to_string(), self.recall),
            ("f1".to_string(), self.f1_score),
        ];
        if let Some(auc) = self.roc_auc {
            pairs.push(("roc_auc".to_string(), auc));
        }
        pairs
    }
}

impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.accuracy, self.precision, self.recall, self.f1_score
        )?;
        if let Some(auc) = self.roc_auc {
            write!(f, " roc_auc={:.4}", auc)?;
        }
        Ok(())
    }
}

/// ROC AUC via the rank-sum statistic, averaging ranks over ties
pub fn roc_auc(y_true: &Array1<i64>, scores: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != y_true.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // 1-based average rank of the tie group
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if y_true[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        start = end + 1;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1, 1, 0, 0, 1, 0];
        let y_pred = array![1, 0, 0, 1, 1, 0];
        let m = ModelMetrics::compute_classification(&y_true, &y_pred, None);

        assert_eq!((m.true_positives, m.false_positives), (2, 1));
        assert_eq!((m.true_negatives, m.false_negatives), (2, 1));
        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!(m.roc_auc.is_none());
    }

    #[test]
    fn test_roc_auc() {
        let y = array![0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&array![1, 1], &array![0.2, 0.3]), None);
    }
}
