//! Lexical meta features computed from raw text.

use std::collections::HashSet;

use crate::features::FeatureMatrix;
use crate::text::stopwords::is_common_stop_word;

/// Column names produced by [`extract_meta_features`], in output order.
pub const META_FEATURE_NAMES: [&str; 8] = [
    "num_words",
    "num_unique_words",
    "num_chars",
    "num_stopwords",
    "num_punctuations",
    "num_words_upper",
    "num_words_title",
    "mean_word_len",
];

/// Lexical statistics for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalStats {
    pub num_words: usize,
    pub num_unique_words: usize,
    pub num_chars: usize,
    pub num_stopwords: usize,
    pub num_punctuations: usize,
    pub num_words_upper: usize,
    pub num_words_title: usize,
    /// NaN when the text has no tokens.
    pub mean_word_len: f64,
}

impl LexicalStats {
    /// Compute the statistics for `text`. Tokens are whitespace-delimited.
    pub fn of(text: &str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let unique: HashSet<&str> = tokens.iter().copied().collect();
        let total_len: usize = tokens.iter().map(|t| t.chars().count()).sum();
        let mean_word_len = if tokens.is_empty() {
            f64::NAN
        } else {
            total_len as f64 / tokens.len() as f64
        };
        Self {
            num_words: tokens.len(),
            num_unique_words: unique.len(),
            num_chars: text.chars().count(),
            num_stopwords: tokens
                .iter()
                .filter(|t| is_common_stop_word(&t.to_lowercase()))
                .count(),
            num_punctuations: text.chars().filter(char::is_ascii_punctuation).count(),
            num_words_upper: tokens.iter().filter(|t| is_upper(t)).count(),
            num_words_title: tokens.iter().filter(|t| is_title(t)).count(),
            mean_word_len,
        }
    }

    /// Values in [`META_FEATURE_NAMES`] order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.num_words as f64,
            self.num_unique_words as f64,
            self.num_chars as f64,
            self.num_stopwords as f64,
            self.num_punctuations as f64,
            self.num_words_upper as f64,
            self.num_words_title as f64,
            self.mean_word_len,
        ]
    }
}

/// One row per text with the [`META_FEATURE_NAMES`] columns.
pub fn extract_meta_features<S: AsRef<str>>(texts: &[S]) -> FeatureMatrix {
    let rows: Vec<[f64; 8]> = texts
        .iter()
        .map(|text| LexicalStats::of(text.as_ref()).values())
        .collect();
    let mut matrix = FeatureMatrix::new(texts.len());
    for (col, name) in META_FEATURE_NAMES.iter().enumerate() {
        let values = rows.iter().map(|row| row[col]).collect();
        // Names are distinct and lengths match by construction.
        let _ = matrix.push_column(*name, values);
    }
    matrix
}

/// At least one cased character and no lower-case character.
fn is_upper(token: &str) -> bool {
    let mut cased = false;
    for c in token.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Upper-case only after uncased characters, lower-case only after cased ones.
fn is_title(token: &str) -> bool {
    let mut cased = false;
    let mut previous_cased = false;
    for c in token.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else {
            previous_cased = false;
        }
    }
    cased
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_hand_computed_values() {
        let stats = LexicalStats::of("The QUICK brown Fox, the fox!");
        assert_eq!(stats.num_words, 6);
        assert_eq!(stats.num_unique_words, 6);
        assert_eq!(stats.num_chars, 29);
        assert_eq!(stats.num_stopwords, 2);
        assert_eq!(stats.num_punctuations, 2);
        assert_eq!(stats.num_words_upper, 1);
        assert_eq!(stats.num_words_title, 2);
        assert!((stats.mean_word_len - 24.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn unique_words_are_case_sensitive() {
        let stats = LexicalStats::of("free Free free");
        assert_eq!(stats.num_words, 3);
        assert_eq!(stats.num_unique_words, 2);
    }

    #[test]
    fn mean_word_len_is_nan_only_without_tokens() {
        for text in ["", "   \t\n"] {
            let stats = LexicalStats::of(text);
            assert_eq!(stats.num_words, 0);
            assert!(stats.mean_word_len.is_nan());
        }
        assert!(!LexicalStats::of("a").mean_word_len.is_nan());
    }

    #[test]
    fn title_and_upper_rules() {
        assert!(is_title("Hello"));
        assert!(is_title("O'Neil"));
        assert!(!is_title("HeLLo"));
        assert!(!is_title("123"));
        assert!(is_upper("ABC1"));
        assert!(!is_upper("AbC"));
        assert!(!is_upper("!!"));
    }

    #[test]
    fn matrix_rows_align_with_inputs() {
        let texts = ["buy now free money", "", "quarterly report attached"];
        let matrix = extract_meta_features(&texts);
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.names(), META_FEATURE_NAMES.to_vec());
        let words = matrix.column("num_words").unwrap();
        assert_eq!(words, &[4.0, 0.0, 3.0]);
        let mean = matrix.column("mean_word_len").unwrap();
        assert!(mean[1].is_nan());
    }
}
