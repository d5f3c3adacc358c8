//! Truncated SVD of a sparse term matrix via a seeded randomized range finder.
//!
//! No centering is applied, so sparse inputs stay sparse until projection.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::PipelineError;
use crate::ml::rows::FeatureRows;

/// Extra sketch columns beyond the requested rank.
const OVERSAMPLES: usize = 10;
/// Power iterations sharpening the sketch toward the top singular subspace.
const POWER_ITERATIONS: usize = 5;
/// Relative norm under which a sketch column counts as linearly dependent.
const RANK_TOLERANCE: f64 = 1e-10;

/// Rank-`k` projection fitted once on the joint train+test matrix.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    n_components: usize,
    seed: u64,
    /// `k x d`, one right singular vector per row.
    components: Option<Array2<f64>>,
    singular_values: Vec<f64>,
}

impl TruncatedSvd {
    pub fn new(n_components: usize, seed: u64) -> Self {
        Self {
            n_components,
            seed,
            components: None,
            singular_values: Vec::new(),
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Descending singular values of the fitted components.
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Output column names `svd_<tag>_<i>`.
    pub fn column_names(&self, tag: &str) -> Vec<String> {
        (0..self.n_components)
            .map(|i| format!("svd_{tag}_{i}"))
            .collect()
    }

    pub fn fit<X: FeatureRows>(&mut self, joint: &X) -> Result<(), PipelineError> {
        let (n, d) = (joint.n_rows(), joint.n_cols());
        let k = self.n_components;
        if k == 0 {
            return Err(PipelineError::DimensionMismatch {
                expected: 1,
                actual: 0,
                context: "svd_components must be at least 1".to_string(),
            });
        }
        if k > d {
            return Err(PipelineError::DimensionMismatch {
                expected: d,
                actual: k,
                context: format!("svd_components {k} exceeds the vocabulary size {d}"),
            });
        }
        if k > n {
            return Err(PipelineError::DimensionMismatch {
                expected: n,
                actual: k,
                context: format!("svd_components {k} exceeds the joint row count {n}"),
            });
        }

        let rows: Vec<Vec<(usize, f64)>> = (0..n).map(|row| joint.row_entries(row)).collect();
        let sketch_width = (k + OVERSAMPLES).min(n.min(d));
        let mut rng = StdRng::seed_from_u64(self.seed);
        let omega = Array2::from_shape_simple_fn((d, sketch_width), || {
            rng.random_range(-1.0..1.0)
        });

        let mut q = orthonormalize(&multiply(&rows, &omega));
        for _ in 0..POWER_ITERATIONS {
            let z = orthonormalize(&multiply_transposed(&rows, d, &q));
            q = orthonormalize(&multiply(&rows, &z));
        }

        // B = Q^T A is (l x d); stored as its transpose.
        let b_t = multiply_transposed(&rows, d, &q);
        let gram = b_t.t().dot(&b_t);
        let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

        let mut components = Array2::<f64>::zeros((k, d));
        let mut singular_values = vec![0.0; k];
        for (slot, (value, vector)) in eigenvalues
            .iter()
            .zip(eigenvectors.columns())
            .take(k)
            .enumerate()
        {
            let sigma = value.max(0.0).sqrt();
            singular_values[slot] = sigma;
            if sigma <= RANK_TOLERANCE {
                continue;
            }
            let mut v = b_t.dot(&vector) / sigma;
            flip_sign(&mut v);
            components.row_mut(slot).assign(&v);
        }
        debug!(
            "Fitted truncated SVD: {k} components over {n} x {d}, sketch width {}",
            q.ncols()
        );
        self.components = Some(components);
        self.singular_values = singular_values;
        Ok(())
    }

    /// Project rows onto the fitted components, yielding an `n x k` matrix.
    pub fn transform<X: FeatureRows>(&self, x: &X) -> Result<Array2<f64>, PipelineError> {
        let components = self
            .components
            .as_ref()
            .ok_or(PipelineError::NotFitted("TruncatedSvd"))?;
        if x.n_cols() != components.ncols() {
            return Err(PipelineError::DimensionMismatch {
                expected: components.ncols(),
                actual: x.n_cols(),
                context: "matrix width differs from the fitted vocabulary".to_string(),
            });
        }
        let mut out = Array2::<f64>::zeros((x.n_rows(), components.nrows()));
        for (row, mut target) in out.axis_iter_mut(Axis(0)).enumerate() {
            for (col, value) in x.row_entries(row) {
                target.scaled_add(value, &components.column(col));
            }
        }
        Ok(out)
    }
}

/// `A * M` for sparse rows `A` (n x d) and dense `M` (d x l).
fn multiply(rows: &[Vec<(usize, f64)>], m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((rows.len(), m.ncols()));
    for (entries, mut target) in rows.iter().zip(out.axis_iter_mut(Axis(0))) {
        for &(col, value) in entries {
            target.scaled_add(value, &m.row(col));
        }
    }
    out
}

/// `A^T * M` for sparse rows `A` (n x d) and dense `M` (n x l).
fn multiply_transposed(rows: &[Vec<(usize, f64)>], d: usize, m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((d, m.ncols()));
    for (entries, source) in rows.iter().zip(m.axis_iter(Axis(0))) {
        for &(col, value) in entries {
            out.row_mut(col).scaled_add(value, &source);
        }
    }
    out
}

/// Modified Gram-Schmidt on the columns of `m`, dropping dependent columns.
fn orthonormalize(m: &Array2<f64>) -> Array2<f64> {
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(m.ncols());
    for column in m.columns() {
        let original_norm = column.dot(&column).sqrt();
        if original_norm == 0.0 {
            continue;
        }
        let mut v = column.to_owned();
        for q in &basis {
            let projection = q.dot(&v);
            v.scaled_add(-projection, q);
        }
        let norm = v.dot(&v).sqrt();
        if norm <= RANK_TOLERANCE * original_norm {
            continue;
        }
        v /= norm;
        basis.push(v);
    }
    let mut out = Array2::<f64>::zeros((m.nrows(), basis.len()));
    for (idx, v) in basis.iter().enumerate() {
        out.column_mut(idx).assign(v);
    }
    out
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix.
/// Eigenvalues are returned in descending order with matching eigenvector columns.
fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    for _sweep in 0..100 {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        let scale: f64 = a.diag().iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);
        if off_diagonal <= 1e-30 * scale {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

/// Make the largest-magnitude loading positive.
fn flip_sign(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use sprs::{CsMat, TriMat};

    fn sparse(dense: &Array2<f64>) -> CsMat<f64> {
        let mut triplets = TriMat::new(dense.dim());
        for ((row, col), &value) in dense.indexed_iter() {
            if value != 0.0 {
                triplets.add_triplet(row, col, value);
            }
        }
        triplets.to_csr()
    }

    #[test]
    fn jacobi_recovers_known_eigenvalues() {
        let (values, vectors) = symmetric_eigen(array![[2.0, 1.0], [1.0, 2.0]]);
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        let first = vectors.column(0);
        assert!((first[0].abs() - first[1].abs()).abs() < 1e-12);
    }

    #[test]
    fn recovers_singular_values_of_a_diagonal_matrix() {
        let dense = array![
            [3.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let mut svd = TruncatedSvd::new(2, 17);
        svd.fit(&sparse(&dense)).unwrap();
        let sigma = svd.singular_values();
        assert!((sigma[0] - 3.0).abs() < 1e-9);
        assert!((sigma[1] - 2.0).abs() < 1e-9);

        let projected = svd.transform(&sparse(&dense)).unwrap();
        assert_eq!(projected.dim(), (3, 2));
        assert!((projected[[0, 0]] - 3.0).abs() < 1e-9);
        assert!((projected[[1, 1]] - 2.0).abs() < 1e-9);
        assert!(projected[[2, 0]].abs() < 1e-9);
    }

    #[test]
    fn same_seed_gives_identical_projection() {
        let dense = array![
            [1.0, 0.5, 0.0, 0.2, 0.0],
            [0.0, 1.0, 0.3, 0.0, 0.7],
            [0.4, 0.0, 1.0, 0.9, 0.0],
            [0.0, 0.2, 0.0, 1.0, 0.1],
        ];
        let matrix = sparse(&dense);
        let mut a = TruncatedSvd::new(3, 5);
        let mut b = TruncatedSvd::new(3, 5);
        a.fit(&matrix).unwrap();
        b.fit(&matrix).unwrap();
        assert_eq!(a.transform(&matrix).unwrap(), b.transform(&matrix).unwrap());
    }

    #[test]
    fn rank_larger_than_vocabulary_is_rejected() {
        let matrix = sparse(&array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let err = TruncatedSvd::new(3, 0).fit(&matrix).unwrap_err();
        assert_eq!(err.kind(), "DimensionMismatchError");
        let err = TruncatedSvd::new(0, 0).fit(&matrix).unwrap_err();
        assert_eq!(err.kind(), "DimensionMismatchError");
    }

    #[test]
    fn transform_checks_width_and_fit() {
        let matrix = sparse(&array![[1.0, 0.0], [0.0, 1.0]]);
        let unfitted = TruncatedSvd::new(1, 0);
        assert!(matches!(
            unfitted.transform(&matrix),
            Err(PipelineError::NotFitted(_))
        ));
        let mut svd = TruncatedSvd::new(1, 0);
        svd.fit(&matrix).unwrap();
        let wider = sparse(&array![[1.0, 0.0, 2.0]]);
        assert_eq!(
            svd.transform(&wider).unwrap_err().kind(),
            "DimensionMismatchError"
        );
        assert_eq!(svd.column_names("w"), vec!["svd_w_0"]);
    }
}
