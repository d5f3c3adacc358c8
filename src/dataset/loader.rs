//! CSV loader for three-column corpus files (`company,label,text`).

use std::path::Path;

use tracing::debug;

use super::corpus::{Corpus, Record};
use crate::error::PipelineError;

/// Number of columns every corpus row must carry.
pub const CORPUS_COLUMNS: usize = 3;

/// Whether rows must carry a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Training side: every label must be `0` or `1`.
    Required,
    /// Scoring side: labels may be empty and are ignored otherwise.
    Optional,
}

/// Load a corpus from a CSV file with a header row.
pub fn load_corpus(path: &Path, policy: LabelPolicy) -> Result<Corpus, PipelineError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let corpus = read_corpus(reader, policy).map_err(|err| match err {
        ReadError::Csv(source) => PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        },
        ReadError::Shape(message) => {
            PipelineError::InputShape(format!("{}: {message}", path.display()))
        }
    })?;
    debug!("Loaded {} records from {}", corpus.len(), path.display());
    Ok(corpus)
}

/// Parse a corpus from any CSV source. Used by tests with in-memory data.
pub fn parse_corpus<R: std::io::Read>(
    source: R,
    policy: LabelPolicy,
) -> Result<Corpus, PipelineError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);
    read_corpus(reader, policy).map_err(|err| match err {
        ReadError::Csv(source) => PipelineError::InputShape(source.to_string()),
        ReadError::Shape(message) => PipelineError::InputShape(message),
    })
}

enum ReadError {
    Csv(csv::Error),
    Shape(String),
}

fn read_corpus<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    policy: LabelPolicy,
) -> Result<Corpus, ReadError> {
    let headers = reader.headers().map_err(ReadError::Csv)?;
    if headers.len() != CORPUS_COLUMNS {
        return Err(ReadError::Shape(format!(
            "header has {} columns, expected {CORPUS_COLUMNS}",
            headers.len()
        )));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(ReadError::Csv)?;
        // Header is line 1.
        let line = idx + 2;
        if row.len() != CORPUS_COLUMNS {
            return Err(ReadError::Shape(format!(
                "line {line}: {} columns, expected {CORPUS_COLUMNS}",
                row.len()
            )));
        }
        let label = parse_label(&row[1])
            .map_err(|value| ReadError::Shape(format!("line {line}: invalid label {value:?}")))?;
        if policy == LabelPolicy::Required && label.is_none() {
            return Err(ReadError::Shape(format!("line {line}: missing label")));
        }
        records.push(Record {
            id: row[0].to_string(),
            label: match policy {
                LabelPolicy::Required => label,
                LabelPolicy::Optional => None,
            },
            text: row[2].to_string(),
        });
    }
    Ok(Corpus::new(records))
}

fn parse_label(raw: &str) -> Result<Option<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(Some(0)),
        Ok(v) if v == 1.0 => Ok(Some(1)),
        _ => Err(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_labeled_file_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "company,label,text\nA,1,\"buy now, free money\"\nB,0.0,quarterly report\n",
        )
        .unwrap();
        let corpus = load_corpus(&path, LabelPolicy::Required).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.records()[0].text, "buy now, free money");
        assert_eq!(corpus.labels(), Some(vec![1, 0]));
    }

    #[test]
    fn scoring_side_accepts_empty_labels() {
        let corpus =
            parse_corpus("company,label,text\nC,,free report\n".as_bytes(), LabelPolicy::Optional)
                .unwrap();
        assert_eq!(corpus.records()[0], Record::unlabeled("C", "free report"));
    }

    #[test]
    fn wrong_column_count_is_shape_error() {
        let err = parse_corpus("company,text\nA,hello\n".as_bytes(), LabelPolicy::Optional)
            .unwrap_err();
        assert_eq!(err.kind(), "InputShapeError");

        let err = parse_corpus(
            "company,label,text\nA,1,hello,extra\n".as_bytes(),
            LabelPolicy::Required,
        )
        .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn training_side_rejects_missing_or_non_binary_labels() {
        let missing = parse_corpus("company,label,text\nA,,x\n".as_bytes(), LabelPolicy::Required);
        assert!(matches!(missing, Err(PipelineError::InputShape(_))));
        let invalid = parse_corpus("company,label,text\nA,2,x\n".as_bytes(), LabelPolicy::Required);
        assert!(matches!(invalid, Err(PipelineError::InputShape(_))));
    }
}
