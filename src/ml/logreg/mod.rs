//! Binary logistic regression over sparse or dense feature rows.

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::ml::classifier::{Classifier, check_training_inputs};
use crate::ml::rows::FeatureRows;

mod train;
pub use train::{LogRegOptions, train_logreg};

/// Fitted weights of a binary logistic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRegModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogRegModel {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ClassifierError::NonFinite);
        }
        Ok(())
    }

    /// Linear score for a row given as `(column, value)` pairs.
    pub fn logit(&self, entries: &[(usize, f64)]) -> f64 {
        entries
            .iter()
            .fold(self.bias, |sum, &(col, value)| sum + self.weights[col] * value)
    }

    pub fn predict_probability(&self, entries: &[(usize, f64)]) -> f64 {
        sigmoid(self.logit(entries))
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// [`Classifier`] wrapper that trains a [`LogRegModel`] with seeded SGD.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    options: LogRegOptions,
    seed: u64,
    model: Option<LogRegModel>,
}

impl LogisticRegression {
    pub fn new(options: LogRegOptions, seed: u64) -> Self {
        Self {
            options,
            seed,
            model: None,
        }
    }
}

impl<X: FeatureRows> Classifier<X> for LogisticRegression {
    fn fit(&mut self, x: &X, y: &[u8]) -> Result<(), ClassifierError> {
        check_training_inputs(x, y)?;
        self.model = Some(train_logreg(x, y, &self.options, self.seed)?);
        Ok(())
    }

    fn predict_class_one_probability(&self, x: &X) -> Result<Vec<f64>, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotFitted)?;
        if x.n_cols() != model.weights.len() {
            return Err(ClassifierError::FeatureCount {
                expected: model.weights.len(),
                actual: x.n_cols(),
            });
        }
        Ok((0..x.n_rows())
            .map(|row| model.predict_probability(&x.row_entries(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn learns_a_separable_feature() {
        let x = array![[1.0, 0.0], [0.9, 0.1], [0.0, 1.0], [0.1, 0.8]];
        let y = [1, 1, 0, 0];
        let options = LogRegOptions {
            epochs: 200,
            learning_rate: 0.5,
            ..LogRegOptions::default()
        };
        let mut model = LogisticRegression::new(options, 7);
        model.fit(&x, &y).unwrap();
        let p = model.predict_class_one_probability(&x).unwrap();
        assert!(p[0] > 0.5 && p[1] > 0.5);
        assert!(p[2] < 0.5 && p[3] < 0.5);
    }

    #[test]
    fn predict_before_fit_fails() {
        let model = LogisticRegression::new(LogRegOptions::default(), 0);
        let result = Classifier::<ndarray::Array2<f64>>::predict_class_one_probability(
            &model,
            &array![[1.0]],
        );
        assert!(matches!(result, Err(ClassifierError::NotFitted)));
    }
}
