//! Error taxonomy shared by the pipeline stages.
//!
//! Every variant is fatal: a stage that fails aborts the run before any
//! prediction is written, because its output would otherwise feed into later
//! stacked columns.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure raised by a pipeline component.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A corpus file or in-memory table did not have the expected shape.
    #[error("input shape error: {0}")]
    InputShape(String),
    /// Vectorizer fit produced no terms after filtering.
    #[error("empty vocabulary: no term survived tokenization and stop word filtering")]
    EmptyVocabulary,
    /// A matrix width did not match what a fitted model expects.
    #[error("dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },
    /// Fold assignment cannot produce usable folds for these labels.
    #[error("degenerate fold: {0}")]
    DegenerateFold(String),
    /// Wraps an underlying classifier training or prediction failure.
    #[error("classifier fit failed: {0}")]
    ClassifierFit(#[from] ClassifierError),
    /// Train and test feature tables diverged.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// A component was used before `fit`.
    #[error("{0} used before fit")]
    NotFitted(&'static str),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Short name of the error kind for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputShape(_) => "InputShapeError",
            PipelineError::EmptyVocabulary => "EmptyVocabularyError",
            PipelineError::DimensionMismatch { .. } => "DimensionMismatchError",
            PipelineError::DegenerateFold(_) => "DegenerateFoldError",
            PipelineError::ClassifierFit(_) => "ClassifierFitError",
            PipelineError::SchemaMismatch(_) => "SchemaMismatchError",
            PipelineError::NotFitted(_) => "NotFittedError",
            PipelineError::Io { .. } => "IoError",
            PipelineError::Csv { .. } => "CsvError",
            PipelineError::Json { .. } => "JsonError",
        }
    }
}

/// Failure inside a classifier's `fit` or `predict`.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("mismatched inputs: {rows} rows but {labels} labels")]
    MismatchedLabels { rows: usize, labels: usize },
    #[error("label {0} is not binary")]
    InvalidLabel(u8),
    #[error("negative feature value {value} at row {row}, column {column}")]
    NegativeFeature {
        row: usize,
        column: usize,
        value: f64,
    },
    #[error("model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("predict called before fit")]
    NotFitted,
    #[error("non-finite model parameter after training")]
    NonFinite,
}

/// Named pipeline stage used when reporting which step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    MetaFeatures,
    TfIdf,
    StackTfIdf,
    Svd,
    Count,
    StackCount,
    Freeze,
    FinalModel,
    Write,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::MetaFeatures => "meta_features",
            Stage::TfIdf => "tfidf",
            Stage::StackTfIdf => "stack_tfidf",
            Stage::Svd => "svd",
            Stage::Count => "count",
            Stage::StackCount => "stack_count",
            Stage::Freeze => "freeze",
            Stage::FinalModel => "final_model",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline error annotated with the stage that raised it.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed with {}: {source}", .source.kind())]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl StageError {
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

/// Attach a [`Stage`] to a fallible step.
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|err| StageError {
            stage,
            source: err.into(),
        })
    }
}
