//! Classifiers, dimensionality reduction, metrics and the stacking trainer.
//!
//! Models are small, dependency-light and seeded explicitly so that a run is
//! reproducible bit for bit.

pub mod classifier;
pub mod gbdt;
pub mod logreg;
pub mod metrics;
pub mod naive_bayes;
pub mod rows;
pub mod stacking;
pub mod svd;

pub use classifier::{BaseClassifier, Classifier, FinalClassifier};
pub use rows::FeatureRows;
pub use stacking::{FoldAssignment, StackOutput, StackTrainSource, StackingCrossValidator};
pub use svd::TruncatedSvd;
