//! Bag-of-terms vectorizer fitted jointly on the training and scoring corpora.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use tracing::debug;

use crate::error::PipelineError;
use crate::text::stopwords::is_english_stop_word;

static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("word token regex must compile"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

/// Token granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// Runs of two or more word characters, English stop words removed.
    #[default]
    Word,
    /// Single characters after collapsing whitespace runs.
    Char,
}

impl Analyzer {
    pub fn as_str(self) -> &'static str {
        match self {
            Analyzer::Word => "word",
            Analyzer::Char => "char",
        }
    }

    /// Short tag used in derived column names.
    pub fn tag(self) -> &'static str {
        match self {
            Analyzer::Word => "w",
            Analyzer::Char => "c",
        }
    }

    /// Split `text` into lower-cased terms.
    pub fn tokenize(self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        match self {
            Analyzer::Word => WORD_TOKEN
                .find_iter(&lowered)
                .map(|m| m.as_str())
                .filter(|token| !is_english_stop_word(token))
                .map(str::to_string)
                .collect(),
            Analyzer::Char => WHITESPACE_RUN
                .replace_all(&lowered, " ")
                .chars()
                .map(String::from)
                .collect(),
        }
    }
}

/// How term occurrences become matrix values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Term frequency times smoothed idf, rows L2-normalized.
    TfIdf,
    /// Raw term counts.
    Count,
}

impl Weighting {
    pub fn as_str(self) -> &'static str {
        match self {
            Weighting::TfIdf => "tfidf",
            Weighting::Count => "countv",
        }
    }
}

#[derive(Debug, Clone)]
struct FittedVocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
    /// Empty for [`Weighting::Count`].
    idf: Vec<f64>,
}

/// Matrices produced by [`TextVectorizer::fit_transform_pair`].
#[derive(Debug, Clone)]
pub struct VectorizedPair {
    pub train: CsMat<f64>,
    pub test: CsMat<f64>,
    /// Training rows stacked on top of scoring rows.
    pub joint: CsMat<f64>,
}

/// Unigram vectorizer producing CSR matrices over a sorted vocabulary.
#[derive(Debug, Clone)]
pub struct TextVectorizer {
    analyzer: Analyzer,
    weighting: Weighting,
    fitted: Option<FittedVocabulary>,
}

impl TextVectorizer {
    pub fn new(analyzer: Analyzer, weighting: Weighting) -> Self {
        Self {
            analyzer,
            weighting,
            fitted: None,
        }
    }

    pub fn analyzer(&self) -> Analyzer {
        self.analyzer
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Number of vocabulary terms, once fitted.
    pub fn n_terms(&self) -> Option<usize> {
        self.fitted.as_ref().map(|fitted| fitted.terms.len())
    }

    /// Fit the vocabulary (and idf weights) on `train` followed by `test`.
    pub fn fit<S: AsRef<str>>(&mut self, train: &[S], test: &[S]) -> Result<(), PipelineError> {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        let n_documents = train.len() + test.len();
        for text in train.iter().chain(test.iter()) {
            let mut tokens = self.analyzer.tokenize(text.as_ref());
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }
        if document_frequency.is_empty() {
            return Err(PipelineError::EmptyVocabulary);
        }

        let idf = match self.weighting {
            Weighting::TfIdf => document_frequency
                .values()
                .map(|&df| ((1.0 + n_documents as f64) / (1.0 + df as f64)).ln() + 1.0)
                .collect(),
            Weighting::Count => Vec::new(),
        };
        let terms: Vec<String> = document_frequency.into_keys().collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        debug!(
            "Fitted {} {} vocabulary: {} terms over {} documents",
            self.analyzer.as_str(),
            self.weighting.as_str(),
            terms.len(),
            n_documents
        );
        self.fitted = Some(FittedVocabulary { terms, index, idf });
        Ok(())
    }

    /// Vectorize `texts` over the fitted vocabulary. Unseen terms are ignored.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Result<CsMat<f64>, PipelineError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted("TextVectorizer"))?;
        let mut triplets = TriMat::new((texts.len(), fitted.terms.len()));
        for (row, text) in texts.iter().enumerate() {
            let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
            for token in self.analyzer.tokenize(text.as_ref()) {
                if let Some(&col) = fitted.index.get(&token) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
            if self.weighting == Weighting::TfIdf {
                for (col, value) in counts.iter_mut() {
                    *value *= fitted.idf[*col];
                }
                let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    counts.values_mut().for_each(|v| *v /= norm);
                }
            }
            for (col, value) in counts {
                triplets.add_triplet(row, col, value);
            }
        }
        Ok(triplets.to_csr())
    }

    /// Fit on both corpora, then transform each side with the same vocabulary.
    pub fn fit_transform_pair<S: AsRef<str>>(
        &mut self,
        train: &[S],
        test: &[S],
    ) -> Result<VectorizedPair, PipelineError> {
        self.fit(train, test)?;
        let train_matrix = self.transform(train)?;
        let test_matrix = self.transform(test)?;
        let joint = sprs::vstack(&[train_matrix.view(), test_matrix.view()]);
        Ok(VectorizedPair {
            train: train_matrix,
            test: test_matrix,
            joint,
        })
    }

    /// Fitted terms in column order, with non-ASCII characters dropped.
    pub fn vocabulary(&self) -> Result<Vec<String>, PipelineError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted("TextVectorizer"))?;
        Ok(fitted
            .terms
            .iter()
            .map(|term| term.chars().filter(char::is_ascii).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_values(matrix: &CsMat<f64>, row: usize) -> Vec<(usize, f64)> {
        matrix
            .outer_view(row)
            .map(|view| view.iter().map(|(col, &v)| (col, v)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn word_analyzer_drops_stop_words_and_short_tokens() {
        let tokens = Analyzer::Word.tokenize("Buy NOW, a free-money deal!");
        assert_eq!(tokens, vec!["buy", "free", "money", "deal"]);
    }

    #[test]
    fn char_analyzer_collapses_whitespace() {
        let tokens = Analyzer::Char.tokenize("Ab \t c");
        assert_eq!(tokens, vec!["a", "b", " ", "c"]);
    }

    #[test]
    fn vocabulary_is_sorted_and_spans_both_corpora() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::Count);
        vectorizer
            .fit(&["quarterly report attached"], &["free money"])
            .unwrap();
        assert_eq!(
            vectorizer.vocabulary().unwrap(),
            vec!["attached", "free", "money", "quarterly", "report"]
        );
    }

    #[test]
    fn count_weighting_keeps_raw_counts_and_ignores_unseen_terms() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::Count);
        vectorizer.fit(&["free money"], &["report"]).unwrap();
        let matrix = vectorizer.transform(&["free free unseen report"]).unwrap();
        assert_eq!(matrix.cols(), 3);
        assert_eq!(row_values(&matrix, 0), vec![(0, 2.0), (2, 1.0)]);
    }

    #[test]
    fn tfidf_rows_are_unit_length_with_smoothed_idf() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::TfIdf);
        let pair = vectorizer
            .fit_transform_pair(&["free money", "free report"], &["report"])
            .unwrap();
        for row in 0..pair.joint.rows() {
            let norm: f64 = row_values(&pair.joint, row)
                .iter()
                .map(|(_, v)| v * v)
                .sum();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        // "free" appears in 2 of 3 documents, "money" in 1 of 3.
        let idf_free = (4.0f64 / 3.0).ln() + 1.0;
        let idf_money = (4.0f64 / 2.0).ln() + 1.0;
        let first = row_values(&pair.train, 0);
        assert!((first[0].1 / first[1].1 - idf_free / idf_money).abs() < 1e-12);
    }

    #[test]
    fn joint_matrix_stacks_train_over_test() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::Count);
        let pair = vectorizer
            .fit_transform_pair(&["free money", "report"], &["money report"])
            .unwrap();
        assert_eq!(pair.joint.rows(), 3);
        assert_eq!(pair.joint.cols(), pair.train.cols());
        assert_eq!(row_values(&pair.joint, 2), row_values(&pair.test, 0));
    }

    #[test]
    fn stop_word_only_corpus_has_empty_vocabulary() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::TfIdf);
        let err = vectorizer.fit(&["the and of", ""], &["a"]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyVocabulary));
    }

    #[test]
    fn transform_before_fit_is_an_error() {
        let vectorizer = TextVectorizer::new(Analyzer::Char, Weighting::Count);
        assert!(matches!(
            vectorizer.transform(&["x"]),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn vocabulary_export_drops_non_ascii() {
        let mut vectorizer = TextVectorizer::new(Analyzer::Word, Weighting::Count);
        vectorizer.fit(&["café report"], &[""]).unwrap();
        assert_eq!(vectorizer.vocabulary().unwrap(), vec!["caf", "report"]);
    }
}
