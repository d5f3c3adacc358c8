//! In-memory records and corpora.

/// One company row: identifier, optional binary label, free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub label: Option<u8>,
    pub text: String,
}

impl Record {
    pub fn labeled(id: impl Into<String>, label: u8, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label),
            text: text.into(),
        }
    }

    pub fn unlabeled(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            text: text.into(),
        }
    }
}

/// Ordered records from one side of the run (train or test).
///
/// Row order is preserved through every stage so output rows align with input rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    records: Vec<Record>,
}

impl Corpus {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn texts(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Labels of every record, or `None` if any record is unlabeled.
    pub fn labels(&self) -> Option<Vec<u8>> {
        self.records.iter().map(|r| r.label).collect()
    }
}

impl FromIterator<Record> for Corpus {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_require_every_row_labeled() {
        let corpus: Corpus = [Record::labeled("a", 1, "x"), Record::labeled("b", 0, "y")]
            .into_iter()
            .collect();
        assert_eq!(corpus.labels(), Some(vec![1, 0]));

        let mixed = Corpus::new(vec![Record::labeled("a", 1, "x"), Record::unlabeled("b", "y")]);
        assert_eq!(mixed.labels(), None);
        assert_eq!(mixed.ids(), vec!["a", "b"]);
        assert_eq!(mixed.texts(), vec!["x", "y"]);
    }
}
