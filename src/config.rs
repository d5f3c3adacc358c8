//! Pipeline configuration stored as TOML.
//!
//! Config keys: `train_path`, `test_path`, `output_path`, `k_folds`,
//! `svd_components`, `random_seed`, `granularity`, `stack_train_source`,
//! `vocabulary_dir`, `base_classifier`, `final_classifier`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::classifier::{BaseClassifier, FinalClassifier};
use crate::ml::stacking::StackTrainSource;
use crate::text::vectorize::Analyzer;

pub(crate) fn default_k_folds() -> usize {
    5
}

pub(crate) fn default_svd_components() -> usize {
    100
}

pub(crate) fn default_random_seed() -> u64 {
    2017
}

/// Every option recognized by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Labeled corpus CSV.
    #[serde(default)]
    pub train_path: Option<PathBuf>,
    /// Scoring corpus CSV.
    #[serde(default)]
    pub test_path: Option<PathBuf>,
    /// Destination of the prediction CSV.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_k_folds")]
    pub k_folds: usize,
    #[serde(default = "default_svd_components")]
    pub svd_components: usize,
    /// Seeds fold partitioning, the SVD range finder and every classifier.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default)]
    pub granularity: Analyzer,
    #[serde(default)]
    pub stack_train_source: StackTrainSource,
    /// When set, the TF-IDF vocabulary is dumped here.
    #[serde(default)]
    pub vocabulary_dir: Option<PathBuf>,
    #[serde(default)]
    pub base_classifier: BaseClassifier,
    #[serde(default)]
    pub final_classifier: FinalClassifier,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_path: None,
            test_path: None,
            output_path: None,
            k_folds: default_k_folds(),
            svd_components: default_svd_components(),
            random_seed: default_random_seed(),
            granularity: Analyzer::default(),
            stack_train_source: StackTrainSource::default(),
            vocabulary_dir: None,
            base_classifier: BaseClassifier::default(),
            final_classifier: FinalClassifier::default(),
        }
    }
}

/// Errors that may occur while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Invalid option `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Missing required option `{0}`")]
    Missing(&'static str),
}

impl PipelineConfig {
    /// Load a config file; a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty TOML, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data = toml::to_string_pretty(self).map_err(|source| ConfigError::SerializeToml {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check numeric ranges. Paths are checked by [`PipelineConfig::io_paths`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k_folds < 2 {
            return Err(ConfigError::Invalid {
                field: "k_folds",
                reason: format!("must be at least 2, got {}", self.k_folds),
            });
        }
        if self.svd_components == 0 {
            return Err(ConfigError::Invalid {
                field: "svd_components",
                reason: "must be at least 1".to_string(),
            });
        }
        self.base_classifier
            .validate()
            .map_err(|(field, reason)| ConfigError::Invalid { field, reason })?;
        self.final_classifier
            .validate()
            .map_err(|(field, reason)| ConfigError::Invalid { field, reason })?;
        Ok(())
    }

    /// Resolve `(train, test, output)` paths, failing on the first missing one.
    pub fn io_paths(&self) -> Result<(&Path, &Path, &Path), ConfigError> {
        let train = self
            .train_path
            .as_deref()
            .ok_or(ConfigError::Missing("train_path"))?;
        let test = self
            .test_path
            .as_deref()
            .ok_or(ConfigError::Missing("test_path"))?;
        let output = self
            .output_path
            .as_deref()
            .ok_or(ConfigError::Missing("output_path"))?;
        Ok((train, test, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.k_folds, 5);
        assert_eq!(config.svd_components, 100);
    }

    #[test]
    fn partial_file_keeps_defaults_for_absent_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
k_folds = 3
granularity = "char"
stack_train_source = "out_of_fold"

[final_classifier]
kind = "gradient_boosting"
n_estimators = 10
"#,
        )
        .unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.k_folds, 3);
        assert_eq!(config.granularity, Analyzer::Char);
        assert_eq!(config.stack_train_source, StackTrainSource::OutOfFold);
        assert_eq!(config.svd_components, 100);
        let FinalClassifier::GradientBoosting(options) = &config.final_classifier;
        assert_eq!(options.n_estimators, 10);
        assert_eq!(options.max_depth, 3);
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = PipelineConfig::default();
        config.train_path = Some(PathBuf::from("train.csv"));
        config.random_seed = 7;
        config.save_to_path(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn rejects_single_fold() {
        let config = PipelineConfig {
            k_folds: 1,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "k_folds", .. })
        ));
    }

    #[test]
    fn io_paths_report_first_missing_field() {
        let config = PipelineConfig {
            train_path: Some(PathBuf::from("a.csv")),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.io_paths(),
            Err(ConfigError::Missing("test_path"))
        ));
    }
}
