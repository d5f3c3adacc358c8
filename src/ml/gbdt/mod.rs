//! Class-weighted gradient-boosted regression trees for binary classification.
//!
//! Histogram split search over uniform bins, second-order leaf values with
//! L1/L2 regularization, and seeded row/column subsampling per tree.
//! Missing values (NaN) always follow the left branch.

mod model;
mod train;

pub use model::{GbdtModel, RegressionTree, TreeNode};
pub use train::{GbdtOptions, TrainDataset, train_gbdt};

use crate::error::ClassifierError;
use crate::ml::classifier::{Classifier, check_training_inputs};
use crate::ml::rows::FeatureRows;

/// [`Classifier`] wrapper around [`train_gbdt`].
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    options: GbdtOptions,
    seed: u64,
    scale_pos_weight: f64,
    model: Option<GbdtModel>,
}

impl GradientBoostedTrees {
    pub fn new(options: GbdtOptions, seed: u64, scale_pos_weight: f64) -> Self {
        Self {
            options,
            seed,
            scale_pos_weight,
            model: None,
        }
    }
}

impl<X: FeatureRows> Classifier<X> for GradientBoostedTrees {
    fn fit(&mut self, x: &X, y: &[u8]) -> Result<(), ClassifierError> {
        check_training_inputs(x, y)?;
        let rows: Vec<Vec<f64>> = (0..x.n_rows()).map(|row| x.dense_row(row)).collect();
        let dataset = TrainDataset {
            x: &rows,
            y,
            n_features: x.n_cols(),
        };
        self.model = Some(train_gbdt(
            &dataset,
            &self.options,
            self.seed,
            self.scale_pos_weight,
        )?);
        Ok(())
    }

    fn predict_class_one_probability(&self, x: &X) -> Result<Vec<f64>, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotFitted)?;
        if x.n_cols() != model.n_features {
            return Err(ClassifierError::FeatureCount {
                expected: model.n_features,
                actual: x.n_cols(),
            });
        }
        Ok((0..x.n_rows())
            .map(|row| model.predict_probability(&x.dense_row(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn missing_values_are_scored_not_rejected() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [0.1, 0.9], [0.9, f64::NAN]];
        let mut model = GradientBoostedTrees::new(
            GbdtOptions {
                n_estimators: 10,
                ..GbdtOptions::default()
            },
            3,
            1.0,
        );
        model.fit(&x, &[0, 1, 0, 1]).unwrap();
        let p = model
            .predict_class_one_probability(&array![[f64::NAN, f64::NAN]])
            .unwrap();
        assert!(p[0].is_finite());
        assert!((0.0..=1.0).contains(&p[0]));
    }

    #[test]
    fn width_mismatch_is_reported() {
        let mut model = GradientBoostedTrees::new(GbdtOptions::default(), 0, 1.0);
        model.fit(&array![[1.0], [2.0]], &[0, 1]).unwrap();
        let err = model
            .predict_class_one_probability(&array![[1.0, 2.0]])
            .unwrap_err();
        assert!(matches!(err, ClassifierError::FeatureCount { expected: 1, actual: 2 }));
    }
}
