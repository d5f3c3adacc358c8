use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::model::{GbdtModel, RegressionTree, TreeNode};
use crate::error::ClassifierError;
use crate::ml::logreg::sigmoid;

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtOptions {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to every tree output.
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows sampled per tree.
    pub subsample: f64,
    /// Fraction of features sampled per tree.
    pub colsample_bytree: f64,
    /// L2 penalty on leaf values.
    pub reg_lambda: f64,
    /// L1 penalty on leaf values.
    pub reg_alpha: f64,
    /// Minimum hessian sum in each child of a split.
    pub min_child_weight: f64,
    /// Number of bins used for split search.
    pub bins: usize,
}

impl Default for GbdtOptions {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 0.001,
            max_depth: 3,
            subsample: 0.5,
            colsample_bytree: 0.6,
            reg_lambda: 1.0,
            reg_alpha: 1.0,
            min_child_weight: 1.0,
            bins: 32,
        }
    }
}

impl GbdtOptions {
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.n_estimators == 0 {
            return Err(("final_classifier.n_estimators", "must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err((
                "final_classifier.learning_rate",
                format!("must be > 0, got {}", self.learning_rate),
            ));
        }
        if self.max_depth == 0 {
            return Err(("final_classifier.max_depth", "must be at least 1".into()));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err((
                "final_classifier.subsample",
                format!("must be in (0, 1], got {}", self.subsample),
            ));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err((
                "final_classifier.colsample_bytree",
                format!("must be in (0, 1], got {}", self.colsample_bytree),
            ));
        }
        for (field, value) in [
            ("final_classifier.reg_lambda", self.reg_lambda),
            ("final_classifier.reg_alpha", self.reg_alpha),
            ("final_classifier.min_child_weight", self.min_child_weight),
        ] {
            if !(value >= 0.0) {
                return Err((field, format!("must be >= 0, got {value}")));
            }
        }
        if !(2..=256).contains(&self.bins) {
            return Err((
                "final_classifier.bins",
                format!("must be in 2..=256, got {}", self.bins),
            ));
        }
        Ok(())
    }
}

/// Row-major training rows with binary labels. Inputs are assumed validated.
#[derive(Debug, Clone)]
pub struct TrainDataset<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [u8],
    pub n_features: usize,
}

/// Train a second-order boosted tree ensemble on weighted binary log loss.
///
/// Positive rows carry weight `scale_pos_weight`; negatives carry 1.
pub fn train_gbdt(
    dataset: &TrainDataset<'_>,
    options: &GbdtOptions,
    seed: u64,
    scale_pos_weight: f64,
) -> Result<GbdtModel, ClassifierError> {
    let n = dataset.x.len();
    if n == 0 {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    let d = dataset.n_features;
    let weights: Vec<f64> = dataset
        .y
        .iter()
        .map(|&label| if label == 1 { scale_pos_weight } else { 1.0 })
        .collect();
    let targets: Vec<f64> = dataset.y.iter().map(|&label| label as f64).collect();

    let thresholds = feature_thresholds(dataset.x, d, options.bins);
    let binned = bin_features(dataset.x, &thresholds);

    let total_weight: f64 = weights.iter().sum();
    let positive_weight: f64 = weights.iter().zip(&targets).map(|(w, t)| w * t).sum();
    let prior = if total_weight > 0.0 {
        positive_weight / total_weight
    } else {
        0.5
    };
    let prior = prior.clamp(1e-6, 1.0 - 1e-6);
    let init_raw = (prior / (1.0 - prior)).ln();
    let mut raw = vec![init_raw; n];

    let mut rng = StdRng::seed_from_u64(seed);
    let n_sampled_rows = ((n as f64 * options.subsample).ceil() as usize).clamp(1, n);
    let n_sampled_features = ((d as f64 * options.colsample_bytree).ceil() as usize).min(d);

    let params = SplitParams {
        lambda: options.reg_lambda,
        alpha: options.reg_alpha,
        min_child_weight: options.min_child_weight,
        max_depth: options.max_depth,
    };
    let mut trees = Vec::with_capacity(options.n_estimators);
    let mut grad = vec![0.0f64; n];
    let mut hess = vec![0.0f64; n];
    for _round in 0..options.n_estimators {
        for i in 0..n {
            let p = sigmoid(raw[i]);
            grad[i] = weights[i] * (p - targets[i]);
            hess[i] = weights[i] * p * (1.0 - p);
        }
        let mut rows = index::sample(&mut rng, n, n_sampled_rows).into_vec();
        rows.sort_unstable();
        let mut features = if d > 0 {
            index::sample(&mut rng, d, n_sampled_features).into_vec()
        } else {
            Vec::new()
        };
        features.sort_unstable();

        let mut builder = TreeBuilder {
            binned: &binned,
            thresholds: &thresholds,
            grad: &grad,
            hess: &hess,
            features: &features,
            params: &params,
            nodes: Vec::new(),
        };
        builder.grow(&rows, 0);
        let tree = RegressionTree {
            nodes: builder.nodes,
        };
        for (i, row) in dataset.x.iter().enumerate() {
            raw[i] += options.learning_rate * tree.predict(row);
        }
        trees.push(tree);
    }

    let model = GbdtModel {
        n_features: d,
        learning_rate: options.learning_rate,
        init_raw,
        trees,
    };
    if !model.is_finite() {
        return Err(ClassifierError::NonFinite);
    }
    Ok(model)
}

/// Uniform split candidates between each feature's finite min and max.
/// Constant or all-missing features get no candidates.
fn feature_thresholds(x: &[Vec<f64>], n_features: usize, bins: usize) -> Vec<Vec<f64>> {
    let bins = bins.clamp(2, 256);
    let mut mins = vec![f64::INFINITY; n_features];
    let mut maxs = vec![f64::NEG_INFINITY; n_features];
    for row in x {
        for (j, &v) in row.iter().take(n_features).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    mins.iter()
        .zip(&maxs)
        .map(|(&min, &max)| {
            if !(max > min) {
                return Vec::new();
            }
            let width = (max - min) / bins as f64;
            (1..bins).map(|k| min + k as f64 * width).collect()
        })
        .collect()
}

/// Column-major bin indices: the number of thresholds strictly below the
/// value, so bin `<= k` is exactly `!(value > thresholds[k])`. NaN lands in
/// bin 0 alongside the left-most values.
fn bin_features(x: &[Vec<f64>], thresholds: &[Vec<f64>]) -> Vec<Vec<u8>> {
    thresholds
        .iter()
        .enumerate()
        .map(|(j, cuts)| {
            x.iter()
                .map(|row| {
                    let v = row.get(j).copied().unwrap_or(f64::NAN);
                    if v.is_nan() {
                        0
                    } else {
                        cuts.partition_point(|&t| t < v) as u8
                    }
                })
                .collect()
        })
        .collect()
}

struct SplitParams {
    lambda: f64,
    alpha: f64,
    min_child_weight: f64,
    max_depth: usize,
}

impl SplitParams {
    fn soft_threshold(&self, g: f64) -> f64 {
        g.signum() * (g.abs() - self.alpha).max(0.0)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let t = self.soft_threshold(g);
        t * t / (h + self.lambda)
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denominator = h + self.lambda;
        if denominator <= 0.0 {
            return 0.0;
        }
        -self.soft_threshold(g) / denominator
    }
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    gain: f64,
    feature: usize,
    bin: usize,
}

struct TreeBuilder<'a> {
    binned: &'a [Vec<u8>],
    thresholds: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a SplitParams,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `rows`, returning its node index.
    fn grow(&mut self, rows: &[usize], depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hess[i]).sum();
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: self.params.leaf_value(g, h),
        });
        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(best) = self.best_split(rows, g, h) else {
            return idx;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| (self.binned[best.feature][i] as usize) <= best.bin);
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: self.thresholds[best.feature][best.bin],
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<BestSplit> {
        let parent_score = self.params.score(g, h);
        let mut best: Option<BestSplit> = None;
        for &feature in self.features {
            let cuts = &self.thresholds[feature];
            if cuts.is_empty() {
                continue;
            }
            let mut grad_hist = vec![0.0f64; cuts.len() + 1];
            let mut hess_hist = vec![0.0f64; cuts.len() + 1];
            for &i in rows {
                let b = self.binned[feature][i] as usize;
                grad_hist[b] += self.grad[i];
                hess_hist[b] += self.hess[i];
            }
            let mut left_g = 0.0f64;
            let mut left_h = 0.0f64;
            for bin in 0..cuts.len() {
                left_g += grad_hist[bin];
                left_h += hess_hist[bin];
                let right_g = g - left_g;
                let right_h = h - left_h;
                if left_h < self.params.min_child_weight
                    || right_h < self.params.min_child_weight
                {
                    continue;
                }
                let gain = self.params.score(left_g, left_h) + self.params.score(right_g, right_h)
                    - parent_score;
                if gain > best.map_or(0.0, |b| b.gain) {
                    best = Some(BestSplit { gain, feature, bin });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let label = (i % 2) as u8;
            let signal = if label == 1 { 5.0 + i as f64 * 0.01 } else { i as f64 * 0.01 };
            x.push(vec![signal, (i % 7) as f64]);
            y.push(label);
        }
        (x, y)
    }

    fn options() -> GbdtOptions {
        GbdtOptions {
            n_estimators: 50,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            reg_alpha: 0.0,
            ..GbdtOptions::default()
        }
    }

    #[test]
    fn separates_an_informative_feature() {
        let (x, y) = separable();
        let dataset = TrainDataset {
            x: &x,
            y: &y,
            n_features: 2,
        };
        let model = train_gbdt(&dataset, &options(), 1, 1.0).unwrap();
        for (row, &label) in x.iter().zip(&y) {
            let p = model.predict_probability(row);
            assert_eq!(p > 0.5, label == 1);
        }
        assert!(model.trees.iter().all(|tree| tree.depth() <= 3));
    }

    #[test]
    fn bins_agree_with_prediction_thresholds() {
        let x = vec![vec![0.0], vec![0.5], vec![1.0], vec![f64::NAN]];
        let thresholds = feature_thresholds(&x, 1, 2);
        assert_eq!(thresholds, vec![vec![0.5]]);
        let binned = bin_features(&x, &thresholds);
        assert_eq!(binned, vec![vec![0, 0, 1, 0]]);
    }

    #[test]
    fn positive_weight_shifts_the_prior() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let y: Vec<u8> = vec![0, 0, 0, 1];
        let dataset = TrainDataset {
            x: &x,
            y: &y,
            n_features: 1,
        };
        let opts = GbdtOptions {
            n_estimators: 1,
            ..options()
        };
        let plain = train_gbdt(&dataset, &opts, 0, 1.0).unwrap();
        let weighted = train_gbdt(&dataset, &opts, 0, 3.0).unwrap();
        assert!((plain.init_raw - (1.0f64 / 3.0).ln()).abs() < 1e-12);
        assert!(weighted.init_raw.abs() < 1e-12);
    }

    #[test]
    fn single_class_rows_still_train() {
        let x = vec![vec![1.0], vec![2.0]];
        let y: Vec<u8> = vec![0, 0];
        let dataset = TrainDataset {
            x: &x,
            y: &y,
            n_features: 1,
        };
        let model = train_gbdt(&dataset, &GbdtOptions::default(), 5, 1.0).unwrap();
        assert!(model.predict_probability(&[1.5]) < 1e-3);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let (x, y) = separable();
        let dataset = TrainDataset {
            x: &x,
            y: &y,
            n_features: 2,
        };
        let opts = GbdtOptions {
            n_estimators: 20,
            ..GbdtOptions::default()
        };
        let a = train_gbdt(&dataset, &opts, 9, 1.0).unwrap();
        let b = train_gbdt(&dataset, &opts, 9, 1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validation_names_the_field() {
        let bad = GbdtOptions {
            subsample: 0.0,
            ..GbdtOptions::default()
        };
        assert_eq!(bad.validate().unwrap_err().0, "final_classifier.subsample");
        assert!(GbdtOptions::default().validate().is_ok());
    }
}
