//! Multinomial naive Bayes over non-negative term weights.

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::ml::classifier::{Classifier, check_training_inputs};
use crate::ml::rows::FeatureRows;

/// Smoothing options for [`MultinomialNb`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesOptions {
    /// Additive (Laplace/Lidstone) smoothing.
    pub alpha: f64,
}

impl Default for NaiveBayesOptions {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

#[derive(Debug, Clone)]
struct NbParams {
    n_features: usize,
    /// `-inf` for a class absent from the training rows.
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

/// Binary multinomial naive Bayes.
#[derive(Debug, Clone, Default)]
pub struct MultinomialNb {
    options: NaiveBayesOptions,
    params: Option<NbParams>,
}

impl MultinomialNb {
    pub fn new(options: NaiveBayesOptions) -> Self {
        Self {
            options,
            params: None,
        }
    }

    fn joint_log_likelihood<X: FeatureRows>(
        params: &NbParams,
        x: &X,
        row: usize,
    ) -> [f64; 2] {
        let mut jll = params.class_log_prior;
        for (col, value) in x.row_entries(row) {
            for class in 0..2 {
                jll[class] += value * params.feature_log_prob[class][col];
            }
        }
        jll
    }
}

impl<X: FeatureRows> Classifier<X> for MultinomialNb {
    fn fit(&mut self, x: &X, y: &[u8]) -> Result<(), ClassifierError> {
        check_training_inputs(x, y)?;
        let n_features = x.n_cols();
        let mut class_count = [0usize; 2];
        let mut feature_count = [vec![0.0f64; n_features], vec![0.0f64; n_features]];
        for (row, &label) in y.iter().enumerate() {
            let class = label as usize;
            class_count[class] += 1;
            for (col, value) in x.row_entries(row) {
                if !(value >= 0.0) {
                    return Err(ClassifierError::NegativeFeature {
                        row,
                        column: col,
                        value,
                    });
                }
                feature_count[class][col] += value;
            }
        }

        let total = y.len() as f64;
        let alpha = self.options.alpha;
        let class_log_prior = class_count.map(|count| {
            if count == 0 {
                f64::NEG_INFINITY
            } else {
                (count as f64 / total).ln()
            }
        });
        let feature_log_prob = feature_count.map(|counts| {
            let denominator = counts.iter().sum::<f64>() + alpha * n_features as f64;
            counts
                .iter()
                .map(|count| ((count + alpha) / denominator).ln())
                .collect::<Vec<f64>>()
        });
        if feature_log_prob.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFinite);
        }
        self.params = Some(NbParams {
            n_features,
            class_log_prior,
            feature_log_prob,
        });
        Ok(())
    }

    fn predict_class_one_probability(&self, x: &X) -> Result<Vec<f64>, ClassifierError> {
        let params = self.params.as_ref().ok_or(ClassifierError::NotFitted)?;
        if x.n_cols() != params.n_features {
            return Err(ClassifierError::FeatureCount {
                expected: params.n_features,
                actual: x.n_cols(),
            });
        }
        Ok((0..x.n_rows())
            .map(|row| {
                let [jll0, jll1] = Self::joint_log_likelihood(params, x, row);
                let max = jll0.max(jll1);
                let log_norm = max + ((jll0 - max).exp() + (jll1 - max).exp()).ln();
                (jll1 - log_norm).exp()
            })
            .collect())
    }
}
