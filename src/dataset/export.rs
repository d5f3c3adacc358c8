//! Writers for run artifacts: the prediction CSV and vocabulary dumps.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::PipelineError;

/// Final score for one scoring-corpus row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "company")]
    pub company_id: String,
    #[serde(rename = "label")]
    pub probability: f64,
}

/// Write predictions as `company,label` CSV.
///
/// Rows go to a temporary file beside `path` which is renamed into place once
/// complete, so a failed write never leaves a partial prediction file.
pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<(), PipelineError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir).map_err(|source| PipelineError::Io {
        path: dir.clone(),
        source,
    })?;
    let tmp = NamedTempFile::new_in(&dir).map_err(|source| PipelineError::Io {
        path: dir.clone(),
        source,
    })?;
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(tmp);
    for prediction in predictions {
        writer.serialize(prediction).map_err(csv_err)?;
    }
    if predictions.is_empty() {
        writer.write_record(["company", "label"]).map_err(csv_err)?;
    }
    let mut tmp = writer
        .into_inner()
        .map_err(|err| PipelineError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(err.error().kind(), err.to_string()),
        })?;
    tmp.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|err| PipelineError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    info!("Wrote {} predictions to {}", predictions.len(), path.display());
    Ok(())
}

/// Dump a vocabulary as a JSON array of terms. Returns the written path.
pub fn write_vocabulary(
    dir: &Path,
    name: &str,
    terms: &[String],
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{name}.json"));
    let bytes = serde_json::to_vec_pretty(terms).map_err(|source| PipelineError::Json {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, bytes).map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    info!("Wrote {} vocabulary terms to {}", terms.len(), path.display());
    Ok(path)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn predictions_written_with_header_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("pred.csv");
        let rows = vec![
            Prediction {
                company_id: "C".into(),
                probability: 0.25,
            },
            Prediction {
                company_id: "D".into(),
                probability: 0.75,
            },
        ];
        write_predictions(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "company,label\nC,0.25\nD,0.75\n");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn vocabulary_dump_is_json_array() {
        let dir = tempdir().unwrap();
        let terms = vec!["free".to_string(), "report".to_string()];
        let path = write_vocabulary(dir.path(), "TFIDF_dictionary_word", &terms).unwrap();
        let loaded: Vec<String> =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(loaded, terms);
    }
}
