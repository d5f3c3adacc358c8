//! Evaluation metrics for binary probability estimates.

#[derive(Debug, Clone)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Binary matrix from class-1 scores thresholded at `threshold`.
    pub fn at_threshold(labels: &[u8], scores: &[f64], threshold: f64) -> Self {
        let mut cm = Self::new(2);
        for (&truth, &score) in labels.iter().zip(scores) {
            cm.add(truth as usize, usize::from(score >= threshold));
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

#[derive(Debug, Clone)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f32;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = cm.get(truth, predicted) as u64;
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f32) / (total as f32)
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties sharing their
/// average rank. `None` when `labels` lacks either class.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let n = labels.len().min(scores.len());
    let n_pos = labels[..n].iter().filter(|&&label| label == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0f64;
    let mut start = 0usize;
    while start < n {
        let mut end = start + 1;
        while end < n && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie group spans ranks start+1..=end.
        let average_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if labels[idx] == 1 {
                positive_rank_sum += average_rank;
            }
        }
        start = end;
    }
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_of_perfect_and_inverted_rankings() {
        let labels = [0, 0, 1, 1];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn auc_counts_ties_as_half() {
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]), Some(0.5));
        // One of two positive/negative pairs ordered correctly, one tied.
        assert_eq!(roc_auc(&[0, 1, 1], &[0.3, 0.3, 0.7]), Some(0.75));
    }

    #[test]
    fn auc_is_undefined_for_a_single_class() {
        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.4]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn threshold_confusion_feeds_accuracy_and_recall() {
        let cm = ConfusionMatrix::at_threshold(&[0, 1, 1, 0], &[0.2, 0.7, 0.4, 0.6], 0.5);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(0, 1), 1);
        assert!((accuracy(&cm) - 0.5).abs() < 1e-6);
        let stats = precision_recall_by_class(&cm);
        assert!((stats[1].recall - 0.5).abs() < 1e-6);
        assert_eq!(stats[1].support, 2);
    }
}
