//! The binary classifier capability and its configuration-selected variants.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::ml::gbdt::{GbdtOptions, GradientBoostedTrees};
use crate::ml::logreg::{LogRegOptions, LogisticRegression};
use crate::ml::naive_bayes::{MultinomialNb, NaiveBayesOptions};
use crate::ml::rows::FeatureRows;

/// A binary probabilistic model over a feature matrix type `X`.
pub trait Classifier<X: FeatureRows> {
    /// Train on `x` with labels in `{0, 1}`, replacing any earlier fit.
    fn fit(&mut self, x: &X, y: &[u8]) -> Result<(), ClassifierError>;

    /// Probability of label 1 for each row of `x`.
    fn predict_class_one_probability(&self, x: &X) -> Result<Vec<f64>, ClassifierError>;

    /// `n x 2` matrix of `[P(0), P(1)]` rows.
    fn predict_proba(&self, x: &X) -> Result<Array2<f64>, ClassifierError> {
        let p1 = self.predict_class_one_probability(x)?;
        Ok(Array2::from_shape_fn((p1.len(), 2), |(row, class)| {
            if class == 1 { p1[row] } else { 1.0 - p1[row] }
        }))
    }
}

impl<X: FeatureRows, C: Classifier<X> + ?Sized> Classifier<X> for Box<C> {
    fn fit(&mut self, x: &X, y: &[u8]) -> Result<(), ClassifierError> {
        (**self).fit(x, y)
    }

    fn predict_class_one_probability(&self, x: &X) -> Result<Vec<f64>, ClassifierError> {
        (**self).predict_class_one_probability(x)
    }
}

/// Shared `fit` preconditions: non-empty, one label per row, labels binary.
pub(crate) fn check_training_inputs<X: FeatureRows>(
    x: &X,
    y: &[u8],
) -> Result<(), ClassifierError> {
    if x.n_rows() == 0 || y.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    if x.n_rows() != y.len() {
        return Err(ClassifierError::MismatchedLabels {
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    if let Some(&label) = y.iter().find(|&&label| label > 1) {
        return Err(ClassifierError::InvalidLabel(label));
    }
    Ok(())
}

/// Base learner stacked over the vectorized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseClassifier {
    MultinomialNb(NaiveBayesOptions),
    LogisticRegression(LogRegOptions),
}

impl Default for BaseClassifier {
    fn default() -> Self {
        BaseClassifier::MultinomialNb(NaiveBayesOptions::default())
    }
}

impl BaseClassifier {
    /// Prefix of the stacked column names.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            BaseClassifier::MultinomialNb(_) => "nb",
            BaseClassifier::LogisticRegression(_) => "lr",
        }
    }

    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        match self {
            BaseClassifier::MultinomialNb(options) => {
                if !(options.alpha > 0.0) {
                    return Err((
                        "base_classifier.alpha",
                        format!("must be > 0, got {}", options.alpha),
                    ));
                }
            }
            BaseClassifier::LogisticRegression(options) => {
                if !(options.learning_rate > 0.0) {
                    return Err((
                        "base_classifier.learning_rate",
                        format!("must be > 0, got {}", options.learning_rate),
                    ));
                }
                if options.epochs == 0 {
                    return Err(("base_classifier.epochs", "must be at least 1".to_string()));
                }
                if !(options.l2 >= 0.0) {
                    return Err((
                        "base_classifier.l2",
                        format!("must be >= 0, got {}", options.l2),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fresh, unfitted model seeded with `seed`.
    pub fn build<X: FeatureRows>(&self, seed: u64) -> Box<dyn Classifier<X>> {
        match self {
            BaseClassifier::MultinomialNb(options) => Box::new(MultinomialNb::new(options.clone())),
            BaseClassifier::LogisticRegression(options) => {
                Box::new(LogisticRegression::new(options.clone(), seed))
            }
        }
    }
}

/// Final learner trained on the frozen feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalClassifier {
    GradientBoosting(GbdtOptions),
}

impl Default for FinalClassifier {
    fn default() -> Self {
        FinalClassifier::GradientBoosting(GbdtOptions::default())
    }
}

impl FinalClassifier {
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        let FinalClassifier::GradientBoosting(options) = self;
        options.validate()
    }

    /// Fresh, unfitted model; positives are weighted by `scale_pos_weight`.
    pub fn build<X: FeatureRows>(&self, seed: u64, scale_pos_weight: f64) -> Box<dyn Classifier<X>> {
        let FinalClassifier::GradientBoosting(options) = self;
        Box::new(GradientBoostedTrees::new(
            options.clone(),
            seed,
            scale_pos_weight,
        ))
    }
}
