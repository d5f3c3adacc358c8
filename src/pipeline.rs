//! End-to-end run: features, two stacked base-learner passes, SVD, final model.

use std::path::Path;

use ndarray::Array2;
use sprs::CsMat;
use tracing::info;

use crate::config::PipelineConfig;
use crate::dataset::{
    Corpus, LabelPolicy, Prediction, load_corpus, write_predictions, write_vocabulary,
};
use crate::error::{AtStage, PipelineError, Stage, StageError};
use crate::features::{FeatureTables, FrozenFeatures};
use crate::ml::stacking::{StackOutput, StackingCrossValidator};
use crate::ml::svd::TruncatedSvd;
use crate::text::meta::extract_meta_features;
use crate::text::vectorize::{TextVectorizer, Weighting};

/// AUC summary of one stacking pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StackDiagnostics {
    pub stage: Stage,
    pub fold_auc: Vec<Option<f64>>,
    pub pooled_auc: Option<f64>,
}

impl StackDiagnostics {
    fn of(stage: Stage, output: &StackOutput) -> Self {
        Self {
            stage,
            fold_auc: output.fold_auc.clone(),
            pooled_auc: output.pooled_auc,
        }
    }
}

/// Result of a completed run. Nothing is written to disk by [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One row per scoring record, in scoring-corpus order.
    pub predictions: Vec<Prediction>,
    /// Frozen final feature matrices with their shared column names.
    pub features: FrozenFeatures,
    /// TF-IDF vocabulary, ASCII-normalized.
    pub vocabulary: Vec<String>,
    pub diagnostics: Vec<StackDiagnostics>,
}

/// Sequences every stage over one training and one scoring corpus.
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, train: &Corpus, test: &Corpus) -> Result<PipelineOutput, StageError> {
        let config = self.config;
        let labels = train
            .labels()
            .ok_or_else(|| PipelineError::InputShape("training corpus has unlabeled rows".into()))
            .at(Stage::Load)?;
        info!(
            "Running pipeline: {} training rows, {} scoring rows, {} folds, seed {}",
            train.len(),
            test.len(),
            config.k_folds,
            config.random_seed
        );
        let train_texts = train.texts();
        let test_texts = test.texts();
        let granularity = config.granularity;
        let mut diagnostics = Vec::with_capacity(3);

        info!("Stage {}", Stage::MetaFeatures);
        let mut tables = FeatureTables::new(
            extract_meta_features(&train_texts),
            extract_meta_features(&test_texts),
        );

        info!("Stage {}", Stage::TfIdf);
        let mut tfidf = TextVectorizer::new(granularity, Weighting::TfIdf);
        let tfidf_pair = tfidf
            .fit_transform_pair(&train_texts, &test_texts)
            .at(Stage::TfIdf)?;
        let vocabulary = tfidf.vocabulary().at(Stage::TfIdf)?;

        info!("Stage {}", Stage::StackTfIdf);
        let output = self.stack_base(
            &mut tables,
            Stage::StackTfIdf,
            Weighting::TfIdf,
            &tfidf_pair.train,
            &labels,
            &tfidf_pair.test,
        )?;
        diagnostics.push(StackDiagnostics::of(Stage::StackTfIdf, &output));

        info!("Stage {}", Stage::Svd);
        let mut svd = TruncatedSvd::new(config.svd_components, config.random_seed);
        svd.fit(&tfidf_pair.joint).at(Stage::Svd)?;
        let names = svd.column_names(granularity.tag());
        let train_svd = svd.transform(&tfidf_pair.train).at(Stage::Svd)?;
        let test_svd = svd.transform(&tfidf_pair.test).at(Stage::Svd)?;
        tables
            .push_blocks(&names, train_svd.view(), test_svd.view())
            .at(Stage::Svd)?;
        drop(tfidf_pair);

        info!("Stage {}", Stage::Count);
        let mut counts = TextVectorizer::new(granularity, Weighting::Count);
        let count_pair = counts
            .fit_transform_pair(&train_texts, &test_texts)
            .at(Stage::Count)?;

        info!("Stage {}", Stage::StackCount);
        let output = self.stack_base(
            &mut tables,
            Stage::StackCount,
            Weighting::Count,
            &count_pair.train,
            &labels,
            &count_pair.test,
        )?;
        diagnostics.push(StackDiagnostics::of(Stage::StackCount, &output));
        drop(count_pair);

        info!("Stage {}", Stage::Freeze);
        let features = tables.freeze().at(Stage::Freeze)?;
        info!("Final feature matrix: {} columns", features.names.len());

        info!("Stage {}", Stage::FinalModel);
        let pos_weight = scale_pos_weight(&labels);
        let final_classifier = &config.final_classifier;
        let seed = config.random_seed;
        let output = StackingCrossValidator::new(config.k_folds, seed)
            .run(
                || final_classifier.build::<Array2<f64>>(seed, pos_weight),
                &features.train,
                &labels,
                &features.test,
            )
            .at(Stage::FinalModel)?;
        diagnostics.push(StackDiagnostics::of(Stage::FinalModel, &output));

        let predictions = test
            .records()
            .iter()
            .zip(output.test_proba.column(1))
            .map(|(record, &probability)| Prediction {
                company_id: record.id.clone(),
                probability,
            })
            .collect();
        Ok(PipelineOutput {
            predictions,
            features,
            vocabulary,
            diagnostics,
        })
    }

    /// Stack the base learner over one vectorized matrix and append its two
    /// probability columns to both tables.
    fn stack_base(
        &self,
        tables: &mut FeatureTables,
        stage: Stage,
        weighting: Weighting,
        train: &CsMat<f64>,
        labels: &[u8],
        test: &CsMat<f64>,
    ) -> Result<StackOutput, StageError> {
        let base = &self.config.base_classifier;
        let seed = self.config.random_seed;
        let output = StackingCrossValidator::new(self.config.k_folds, seed)
            .run(|| base.build::<CsMat<f64>>(seed), train, labels, test)
            .at(stage)?;
        let prefix = format!(
            "{}_{}_{}",
            base.column_prefix(),
            weighting.as_str(),
            self.config.granularity.tag()
        );
        let [train_0, train_1] = output.train_columns(self.config.stack_train_source);
        let [test_0, test_1] = output.test_columns();
        tables
            .push_pair(format!("{prefix}_0"), train_0, test_0)
            .at(stage)?;
        tables
            .push_pair(format!("{prefix}_1"), train_1, test_1)
            .at(stage)?;
        Ok(output)
    }
}

/// `count(label 0) / count(label 1)`, or 1 without positives.
pub fn scale_pos_weight(labels: &[u8]) -> f64 {
    let positives = labels.iter().filter(|&&label| label == 1).count();
    if positives == 0 {
        return 1.0;
    }
    (labels.len() - positives) as f64 / positives as f64
}

/// Load both corpora, run, then write the vocabulary dump (if configured) and
/// the prediction file. Nothing is written unless every stage succeeds.
pub fn run_files(
    config: &PipelineConfig,
    train_path: &Path,
    test_path: &Path,
    output_path: &Path,
) -> Result<PipelineOutput, StageError> {
    info!("Stage {}", Stage::Load);
    let train = load_corpus(train_path, LabelPolicy::Required).at(Stage::Load)?;
    let test = load_corpus(test_path, LabelPolicy::Optional).at(Stage::Load)?;

    let output = Orchestrator::new(config).run(&train, &test)?;

    info!("Stage {}", Stage::Write);
    if let Some(dir) = &config.vocabulary_dir {
        let name = format!("TFIDF_dictionary_{}", config.granularity.as_str());
        write_vocabulary(dir, &name, &output.vocabulary).at(Stage::Write)?;
    }
    write_predictions(output_path, &output.predictions).at(Stage::Write)?;
    Ok(output)
}
