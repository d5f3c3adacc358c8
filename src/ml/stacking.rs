//! Stratified K-fold stacking: out-of-fold diagnostics plus a full-data refit.
//!
//! Every training row is predicted exactly once by a model that never saw it.
//! The refit on all rows scores both the training and the scoring matrix.

use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::ml::classifier::Classifier;
use crate::ml::metrics::{ConfusionMatrix, accuracy, precision_recall_by_class, roc_auc};
use crate::ml::rows::FeatureRows;

/// Which training-side probabilities become stacked columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackTrainSource {
    /// Predictions of the model refit on every training row.
    #[default]
    FullFit,
    /// Held-out predictions from the fold models.
    OutOfFold,
}

/// Label-stratified partition of training row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldAssignment {
    folds: Vec<Vec<usize>>,
}

impl FoldAssignment {
    /// Shuffle each class's indices with one seeded generator (class 0 first),
    /// then deal them round-robin; the fold cursor carries over between classes.
    pub fn stratified(labels: &[u8], k: usize, seed: u64) -> Result<Self, PipelineError> {
        if k < 2 {
            return Err(PipelineError::DegenerateFold(format!(
                "need at least 2 folds, got {k}"
            )));
        }
        let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (idx, &label) in labels.iter().enumerate() {
            match label {
                0 | 1 => by_class[label as usize].push(idx),
                other => {
                    return Err(PipelineError::DegenerateFold(format!(
                        "row {idx} has non-binary label {other}"
                    )));
                }
            }
        }
        if by_class.iter().any(Vec::is_empty) {
            return Err(PipelineError::DegenerateFold(format!(
                "training labels contain a single class ({} rows of label 0, {} of label 1)",
                by_class[0].len(),
                by_class[1].len()
            )));
        }
        if labels.len() < k {
            return Err(PipelineError::DegenerateFold(format!(
                "{k} folds requested for {} training rows",
                labels.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut folds = vec![Vec::new(); k];
        let mut cursor = 0usize;
        for class_rows in &mut by_class {
            class_rows.shuffle(&mut rng);
            for &idx in class_rows.iter() {
                folds[cursor].push(idx);
                cursor = (cursor + 1) % k;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }
        Ok(Self { folds })
    }

    pub fn k(&self) -> usize {
        self.folds.len()
    }

    pub fn fold(&self, f: usize) -> &[usize] {
        &self.folds[f]
    }

    /// Every training row outside fold `f`, ascending.
    pub fn complement(&self, f: usize) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .folds
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != f)
            .flat_map(|(_, fold)| fold.iter().copied())
            .collect();
        rows.sort_unstable();
        rows
    }
}

/// Everything one stacking run produces.
#[derive(Debug, Clone)]
pub struct StackOutput {
    /// `n_train x 2` probabilities from the full-data refit.
    pub train_proba: Array2<f64>,
    /// `n_test x 2` probabilities from the full-data refit.
    pub test_proba: Array2<f64>,
    /// Held-out class-1 probability for every training row, in row order.
    pub oof: Vec<f64>,
    /// `None` where the held-out fold had a single class.
    pub fold_auc: Vec<Option<f64>>,
    pub pooled_auc: Option<f64>,
}

impl StackOutput {
    /// `[P(0), P(1)]` training columns selected by `source`.
    pub fn train_columns(&self, source: StackTrainSource) -> [Vec<f64>; 2] {
        match source {
            StackTrainSource::FullFit => [
                self.train_proba.column(0).to_vec(),
                self.train_proba.column(1).to_vec(),
            ],
            StackTrainSource::OutOfFold => [
                self.oof.iter().map(|p| 1.0 - p).collect(),
                self.oof.clone(),
            ],
        }
    }

    /// `[P(0), P(1)]` scoring columns.
    pub fn test_columns(&self) -> [Vec<f64>; 2] {
        [
            self.test_proba.column(0).to_vec(),
            self.test_proba.column(1).to_vec(),
        ]
    }
}

/// Runs any [`Classifier`] through stratified K-fold stacking.
#[derive(Debug, Clone, Copy)]
pub struct StackingCrossValidator {
    k: usize,
    seed: u64,
}

impl StackingCrossValidator {
    pub fn new(k: usize, seed: u64) -> Self {
        Self { k, seed }
    }

    /// `factory` must return a fresh, unfitted classifier on every call.
    pub fn run<X, C, F>(
        &self,
        factory: F,
        x_train: &X,
        y: &[u8],
        x_test: &X,
    ) -> Result<StackOutput, PipelineError>
    where
        X: FeatureRows,
        C: Classifier<X>,
        F: Fn() -> C,
    {
        if x_train.n_rows() != y.len() {
            return Err(PipelineError::InputShape(format!(
                "{} training rows but {} labels",
                x_train.n_rows(),
                y.len()
            )));
        }
        if x_test.n_cols() != x_train.n_cols() {
            return Err(PipelineError::DimensionMismatch {
                expected: x_train.n_cols(),
                actual: x_test.n_cols(),
                context: "scoring matrix width differs from training".to_string(),
            });
        }
        let folds = FoldAssignment::stratified(y, self.k, self.seed)?;

        let mut oof = vec![f64::NAN; y.len()];
        let mut fold_auc = Vec::with_capacity(folds.k());
        for f in 0..folds.k() {
            let held_out = folds.fold(f);
            let fit_rows = folds.complement(f);
            let fit_labels: Vec<u8> = fit_rows.iter().map(|&idx| y[idx]).collect();
            let mut model = factory();
            model.fit(&x_train.select_rows(&fit_rows), &fit_labels)?;
            let predicted = model.predict_class_one_probability(&x_train.select_rows(held_out))?;
            for (&idx, p) in held_out.iter().zip(predicted) {
                oof[idx] = p;
            }

            let held_labels: Vec<u8> = held_out.iter().map(|&idx| y[idx]).collect();
            let held_scores: Vec<f64> = held_out.iter().map(|&idx| oof[idx]).collect();
            let auc = roc_auc(&held_labels, &held_scores);
            match auc {
                Some(value) => info!("Fold {}/{} AUC: {value:.6}", f + 1, folds.k()),
                None => warn!(
                    "Fold {}/{} AUC undefined: held-out rows contain a single class",
                    f + 1,
                    folds.k()
                ),
            }
            fold_auc.push(auc);
        }

        let pooled_auc = roc_auc(y, &oof);
        match pooled_auc {
            Some(value) => info!("Pooled out-of-fold AUC: {value:.6}"),
            None => warn!("Pooled out-of-fold AUC undefined"),
        }
        let cm = ConfusionMatrix::at_threshold(y, &oof, 0.5);
        let per_class = precision_recall_by_class(&cm);
        let positive = &per_class[1];
        info!(
            "Out-of-fold accuracy at 0.5: {:.4} (label 1 precision={:.3} recall={:.3} support={})",
            accuracy(&cm),
            positive.precision,
            positive.recall,
            positive.support
        );

        let mut model = factory();
        model.fit(x_train, y)?;
        let train_proba = model.predict_proba(x_train)?;
        let test_proba = model.predict_proba(x_test)?;
        debug!(
            "Refit on {} rows, scored {} test rows",
            x_train.n_rows(),
            x_test.n_rows()
        );
        Ok(StackOutput {
            train_proba,
            test_proba,
            oof,
            fold_auc,
            pooled_auc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use ndarray::array;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    /// Records the row ids (column 0) it was fit on and predicts that id.
    struct Spy {
        fitted: Vec<usize>,
        log: Rc<RefCell<Vec<Vec<usize>>>>,
    }

    impl Classifier<Array2<f64>> for Spy {
        fn fit(&mut self, x: &Array2<f64>, _y: &[u8]) -> Result<(), ClassifierError> {
            self.fitted = x.column(0).iter().map(|&v| v as usize).collect();
            self.log.borrow_mut().push(self.fitted.clone());
            Ok(())
        }

        fn predict_class_one_probability(
            &self,
            x: &Array2<f64>,
        ) -> Result<Vec<f64>, ClassifierError> {
            for &id in x.column(0) {
                assert!(
                    !self.fitted.contains(&(id as usize)) || self.fitted.len() == 12,
                    "row {id} predicted by a model that saw it"
                );
            }
            Ok(x.column(0).iter().map(|&v| v / 100.0).collect())
        }
    }

    fn ids(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |(row, _)| row as f64)
    }

    #[test]
    fn folds_partition_rows_and_balance_classes() {
        let labels: Vec<u8> = (0..23).map(|i| u8::from(i % 3 == 0)).collect();
        let folds = FoldAssignment::stratified(&labels, 5, 2017).unwrap();
        let mut seen = BTreeSet::new();
        let mut positives = Vec::new();
        for f in 0..folds.k() {
            for &idx in folds.fold(f) {
                assert!(seen.insert(idx));
            }
            positives.push(folds.fold(f).iter().filter(|&&i| labels[i] == 1).count());
        }
        assert_eq!(seen.len(), labels.len());
        let max = positives.iter().max().unwrap();
        let min = positives.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn folds_are_reproducible_per_seed() {
        let labels: Vec<u8> = (0..20).map(|i| u8::from(i % 4 == 0)).collect();
        let a = FoldAssignment::stratified(&labels, 4, 9).unwrap();
        let b = FoldAssignment::stratified(&labels, 4, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_partitions_are_rejected() {
        let single_class = vec![0u8; 6];
        for (labels, k) in [(&single_class, 2), (&vec![0, 1, 0], 1), (&vec![0, 1, 0], 4)] {
            let err = FoldAssignment::stratified(labels, k, 0).unwrap_err();
            assert_eq!(err.kind(), "DegenerateFoldError");
        }
    }

    #[test]
    fn out_of_fold_predictions_never_leak() {
        let x = ids(12);
        let y: Vec<u8> = (0..12).map(|i| u8::from(i % 2 == 0)).collect();
        let log = Rc::new(RefCell::new(Vec::new()));
        let factory = || Spy {
            fitted: Vec::new(),
            log: Rc::clone(&log),
        };
        let output = StackingCrossValidator::new(3, 4)
            .run(factory, &x, &y, &ids(2))
            .unwrap();

        for (idx, p) in output.oof.iter().enumerate() {
            assert_eq!(*p, idx as f64 / 100.0);
        }
        let fits = log.borrow();
        assert_eq!(fits.len(), 4);
        assert_eq!(fits[3], (0..12).collect::<Vec<_>>());
        assert_eq!(output.fold_auc.len(), 3);
        assert_eq!(output.train_proba.dim(), (12, 2));
        assert_eq!(output.test_proba.dim(), (2, 2));
    }

    #[test]
    fn train_columns_follow_the_selected_source() {
        let output = StackOutput {
            train_proba: array![[0.9, 0.1], [0.2, 0.8]],
            test_proba: array![[0.5, 0.5]],
            oof: vec![0.3, 0.6],
            fold_auc: vec![None, None],
            pooled_auc: Some(1.0),
        };
        assert_eq!(
            output.train_columns(StackTrainSource::FullFit),
            [vec![0.9, 0.2], vec![0.1, 0.8]]
        );
        let [p0, p1] = output.train_columns(StackTrainSource::OutOfFold);
        assert_eq!(p1, vec![0.3, 0.6]);
        assert!((p0[0] - 0.7).abs() < 1e-12);
        assert_eq!(output.test_columns(), [vec![0.5], vec![0.5]]);
    }

    #[test]
    fn single_class_held_out_fold_reports_undefined_auc() {
        // One row per fold, so no held-out fold has both classes.
        let x = array![[1.0, 0.0], [0.0, 1.0], [2.0, 0.0], [0.0, 2.0]];
        let y = [1, 0, 1, 0];
        let output = StackingCrossValidator::new(4, 1)
            .run(
                crate::ml::naive_bayes::MultinomialNb::default,
                &x,
                &y,
                &x,
            )
            .unwrap();
        assert!(output.fold_auc.iter().all(Option::is_none));
        assert!(output.pooled_auc.is_some());
        assert!(output.oof.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
