//! Row access shared by the sparse vectorized matrices and dense feature tables.

use ndarray::{Array2, Axis};
use sprs::{CsMat, TriMat};

/// Row-oriented view of a feature matrix consumed by classifiers.
pub trait FeatureRows {
    fn n_rows(&self) -> usize;

    fn n_cols(&self) -> usize;

    /// New matrix holding `rows` in the given order.
    fn select_rows(&self, rows: &[usize]) -> Self
    where
        Self: Sized;

    /// `(column, value)` pairs of a row; zeros may be omitted.
    fn row_entries(&self, row: usize) -> Vec<(usize, f64)>;

    /// Every value of a row, zeros included.
    fn dense_row(&self, row: usize) -> Vec<f64> {
        let mut values = vec![0.0; self.n_cols()];
        for (col, value) in self.row_entries(row) {
            values[col] = value;
        }
        values
    }
}

/// Sparse matrices are expected in CSR storage, as produced by the vectorizer.
impl FeatureRows for CsMat<f64> {
    fn n_rows(&self) -> usize {
        self.rows()
    }

    fn n_cols(&self) -> usize {
        self.cols()
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        let mut triplets = TriMat::new((rows.len(), self.cols()));
        for (out_row, &row) in rows.iter().enumerate() {
            for (col, value) in self.row_entries(row) {
                triplets.add_triplet(out_row, col, value);
            }
        }
        triplets.to_csr()
    }

    fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        self.outer_view(row)
            .map(|view| view.iter().map(|(col, &value)| (col, value)).collect())
            .unwrap_or_default()
    }
}

impl FeatureRows for Array2<f64> {
    fn n_rows(&self) -> usize {
        self.nrows()
    }

    fn n_cols(&self) -> usize {
        self.ncols()
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        self.select(Axis(0), rows)
    }

    fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        self.row(row)
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0.0)
            .map(|(col, &value)| (col, value))
            .collect()
    }

    fn dense_row(&self, row: usize) -> Vec<f64> {
        self.row(row).to_vec()
    }
}
