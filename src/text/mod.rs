//! Text feature extraction: lexical statistics and bag-of-terms vectors.

pub mod meta;
pub mod stopwords;
pub mod vectorize;

pub use meta::{LexicalStats, META_FEATURE_NAMES, extract_meta_features};
pub use vectorize::{Analyzer, TextVectorizer, VectorizedPair, Weighting};
