//! Library exports for the binary, benchmarks and tests.
/// Data directory resolution.
pub mod app_dirs;
/// TOML pipeline configuration.
pub mod config;
/// Corpus records, CSV loading and artifact export.
pub mod dataset;
/// Error taxonomy and failing-stage reporting.
pub mod error;
/// Append-only feature tables.
pub mod features;
/// Tracing setup for run logs.
pub mod logging;
/// Classifiers, SVD, metrics and stacking.
pub mod ml;
/// Stage orchestration.
pub mod pipeline;
/// Lexical statistics and vectorizers.
pub mod text;

pub use config::PipelineConfig;
pub use error::{PipelineError, Stage, StageError};
pub use pipeline::{Orchestrator, PipelineOutput, run_files};
