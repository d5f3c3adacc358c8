//! Append-only named feature tables and the numeric schema freeze.

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::error::PipelineError;

/// Named numeric columns, one row per corpus record, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_rows: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Append a column. Names are unique and lengths must equal the row count.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(PipelineError::InputShape(format!(
                "column `{name}` has {} values for {} rows",
                values.len(),
                self.n_rows
            )));
        }
        if self.names.contains(&name) {
            return Err(PipelineError::SchemaMismatch(format!(
                "column `{name}` already present"
            )));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Append every column of `other`, keeping its order.
    pub fn extend(&mut self, other: FeatureMatrix) -> Result<(), PipelineError> {
        if other.n_rows != self.n_rows {
            return Err(PipelineError::InputShape(format!(
                "appending {} rows to a table of {} rows",
                other.n_rows, self.n_rows
            )));
        }
        for (name, values) in other.names.into_iter().zip(other.columns) {
            self.push_column(name, values)?;
        }
        Ok(())
    }

    /// Append the columns of a dense block under the given names.
    pub fn push_block(
        &mut self,
        names: &[String],
        block: ArrayView2<'_, f64>,
    ) -> Result<(), PipelineError> {
        if block.ncols() != names.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: names.len(),
                actual: block.ncols(),
                context: "named block columns".to_string(),
            });
        }
        for (name, column) in names.iter().zip(block.columns()) {
            self.push_column(name.clone(), column.to_vec())?;
        }
        Ok(())
    }

    /// Row-major numeric matrix in column insertion order.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n_rows, self.columns.len()), |(row, col)| {
            self.columns[col][row]
        })
    }
}

/// Training and scoring tables grown in lockstep.
#[derive(Debug, Clone)]
pub struct FeatureTables {
    train: FeatureMatrix,
    test: FeatureMatrix,
}

/// Numeric matrices handed to the final classifier.
#[derive(Debug, Clone)]
pub struct FrozenFeatures {
    pub names: Vec<String>,
    pub train: Array2<f64>,
    pub test: Array2<f64>,
}

impl FeatureTables {
    pub fn new(train: FeatureMatrix, test: FeatureMatrix) -> Self {
        Self { train, test }
    }

    pub fn train(&self) -> &FeatureMatrix {
        &self.train
    }

    pub fn test(&self) -> &FeatureMatrix {
        &self.test
    }

    /// Append one column to each side under the same name.
    pub fn push_pair(
        &mut self,
        name: impl Into<String>,
        train: Vec<f64>,
        test: Vec<f64>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        self.train.push_column(name.clone(), train)?;
        self.test.push_column(name, test)
    }

    /// Append two dense blocks sharing the column names.
    pub fn push_blocks(
        &mut self,
        names: &[String],
        train: ArrayView2<'_, f64>,
        test: ArrayView2<'_, f64>,
    ) -> Result<(), PipelineError> {
        self.train.push_block(names, train)?;
        self.test.push_block(names, test)
    }

    /// Convert both sides into numeric matrices, asserting identical column order.
    pub fn freeze(self) -> Result<FrozenFeatures, PipelineError> {
        if self.train.names != self.test.names {
            let position = self
                .train
                .names
                .iter()
                .zip(&self.test.names)
                .position(|(a, b)| a != b)
                .unwrap_or(self.train.names.len().min(self.test.names.len()));
            return Err(PipelineError::SchemaMismatch(format!(
                "train has {} columns, test has {}; first difference at column {position}",
                self.train.n_cols(),
                self.test.n_cols()
            )));
        }
        debug!(
            "Froze feature schema: {} columns, {} train rows, {} test rows",
            self.train.n_cols(),
            self.train.n_rows(),
            self.test.n_rows()
        );
        Ok(FrozenFeatures {
            train: self.train.to_array(),
            test: self.test.to_array(),
            names: self.train.names,
        })
    }
}
