//! Corpus records plus CSV ingestion and artifact export.

pub mod corpus;
pub mod export;
pub mod loader;

pub use corpus::{Corpus, Record};
pub use export::{Prediction, write_predictions, write_vocabulary};
pub use loader::{LabelPolicy, load_corpus, parse_corpus};
