//! Truncated singular value decomposition of a sparse matrix.
//!
//! Randomized range finder (Halko, Martinsson & Tropp):
//! 1. Sketch the column space with `A * Omega` for a seeded random `Omega`
//! 2. Sharpen it with power iterations, re-orthonormalized by QR each step
//! 3. Project `A` onto the sketch, `B = Q^T A`, and take the exact SVD of
//!    the small `B` with nalgebra
//!
//! The result is `user_factors = U * Sigma` and `item_factors = V^T`, so
//! `user_factors.dot(&item_factors)` approximates `A`. For a fixed seed the
//! output is fully deterministic.

use crate::error::{Result, TrainError};
use crate::sparse::SparseMatrix;
use nalgebra::{DMatrix, SVD};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Relative cutoff under which a singular value counts as zero
const SINGULAR_CUTOFF: f64 = 1e-10;

/// Factors of a rank-`k` decomposition
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// `rows x k`, equal to `U * Sigma`
    pub user_factors: Array2<f64>,
    /// `k x cols`, equal to `V^T`
    pub item_factors: Array2<f64>,
    /// Descending
    pub singular_values: Vec<f64>,
}

/// Tuning for the randomized solver
#[derive(Debug, Clone, Copy)]
pub struct SvdParams {
    pub rank: usize,
    pub power_iterations: usize,
    pub oversampling: usize,
    pub seed: u64,
}

/// Decompose `matrix` to rank `params.rank`.
///
/// `params.rank` must be at least 1 and no larger than either dimension;
/// callers clamp it beforehand.
pub fn truncated_svd(matrix: &SparseMatrix, params: SvdParams) -> Result<TruncatedSvd> {
    let (n_rows, n_cols) = (matrix.n_rows(), matrix.n_cols());
    let k = params.rank;
    if k == 0 || k > n_rows || k > n_cols {
        return Err(TrainError::InvalidConfig(format!(
            "rank {k} out of range for a {n_rows}x{n_cols} matrix"
        )));
    }
    let sketch = (k + params.oversampling).min(n_rows).min(n_cols);
    let transposed = matrix.transpose();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let omega = Array2::from_shape_fn((n_cols, sketch), |_| rng.random_range(-1.0..1.0));

    let mut q = orthonormal_basis(&matrix.mul_dense(&omega));
    for _ in 0..params.power_iterations {
        let z = orthonormal_basis(&transposed.mul_dense(&q));
        q = orthonormal_basis(&matrix.mul_dense(&z));
    }

    // B = Q^T A, computed as (A^T Q)^T
    let b = to_dmatrix(&transposed.mul_dense(&q).reversed_axes());
    let svd = SVD::new(b, true, true);
    let u = svd
        .u
        .ok_or_else(|| TrainError::Numeric("SVD failed to compute U".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| TrainError::Numeric("SVD failed to compute V^T".into()))?;
    let sigma = &svd.singular_values;

    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&i, &j| sigma[j].total_cmp(&sigma[i]).then(i.cmp(&j)));
    order.truncate(k);

    let sigma_max = order.first().map(|&i| sigma[i]).unwrap_or(0.0);

    let mut item_factors = Array2::<f64>::zeros((k, n_cols));
    let mut left = Array2::<f64>::zeros((sketch, k));
    let mut singular_values = Vec::with_capacity(k);

    for (component, &idx) in order.iter().enumerate() {
        let s = sigma[idx];
        if s <= SINGULAR_CUTOFF * sigma_max.max(1.0) {
            singular_values.push(0.0);
            continue;
        }
        for c in 0..n_cols {
            item_factors[[component, c]] = v_t[(idx, c)];
        }
        for r in 0..sketch {
            left[[r, component]] = u[(r, idx)] * s;
        }
        singular_values.push(s);
    }

    // U * Sigma = Q * U_B * Sigma
    let mut user_factors = q.dot(&left);
    normalize_signs(&mut user_factors, &mut item_factors);

    debug!(
        "truncated_svd: {}x{} nnz={} rank={} sketch={} sigma={:?}",
        n_rows,
        n_cols,
        matrix.nnz(),
        k,
        sketch,
        singular_values
    );

    Ok(TruncatedSvd {
        user_factors,
        item_factors,
        singular_values,
    })
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |r, c| a[[r, c]])
}

/// Thin `Q` of the QR factorization of `a`; `a` must have at least as many rows as columns
fn orthonormal_basis(a: &Array2<f64>) -> Array2<f64> {
    let q = to_dmatrix(a).qr().q();
    Array2::from_shape_fn((q.nrows(), q.ncols()), |(r, c)| q[(r, c)])
}

/// Flip each component so the largest-magnitude entry of its item row is positive
fn normalize_signs(user_factors: &mut Array2<f64>, item_factors: &mut Array2<f64>) {
    for component in 0..item_factors.nrows() {
        let row = item_factors.row(component);
        let pivot = row
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            item_factors.row_mut(component).mapv_inplace(|v| -v);
            user_factors.column_mut(component).mapv_inplace(|v| -v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rank: usize) -> SvdParams {
        SvdParams {
            rank,
            power_iterations: 5,
            oversampling: 10,
            seed: 42,
        }
    }

    fn dense_of(m: &SparseMatrix) -> Array2<f64> {
        Array2::from_shape_fn((m.n_rows(), m.n_cols()), |(r, c)| m.get(r, c))
    }

    #[test]
    fn test_orthonormal_basis_of_dependent_columns() {
        // second column is twice the first
        let a = ndarray::array![[1.0, 2.0, 0.0], [1.0, 2.0, 1.0], [0.0, 0.0, 3.0], [2.0, 4.0, 0.0]];
        let q = orthonormal_basis(&a);
        assert_eq!(q.dim(), (4, 3));
        let gram = q.t().dot(&q);
        for ((r, c), v) in gram.indexed_iter() {
            let expected = if r == c { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-12, "{r},{c}: {v}");
        }
        // the basis still spans every column of a
        let residual = &a - &q.dot(&q.t().dot(&a));
        assert!(residual.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_rank_out_of_range() {
        let m = SparseMatrix::from_triplets(2, 3, vec![(0, 0, 1.0)]);
        assert!(matches!(truncated_svd(&m, params(0)), Err(TrainError::InvalidConfig(_))));
        assert!(matches!(truncated_svd(&m, params(3)), Err(TrainError::InvalidConfig(_))));
    }

    #[test]
    fn test_full_rank_is_exact() {
        let m = SparseMatrix::from_triplets(
            3,
            3,
            vec![
                (0, 0, 1.0),
                (0, 1, -0.5),
                (1, 1, 2.0),
                (1, 2, 0.25),
                (2, 0, -1.5),
                (2, 2, 0.75),
            ],
        );
        let svd = truncated_svd(&m, params(3)).unwrap();
        let approx = svd.user_factors.dot(&svd.item_factors);
        for (x, y) in approx.iter().zip(dense_of(&m).iter()) {
            assert!((x - y).abs() < 1e-8, "{x} vs {y}");
        }
        assert!(svd.singular_values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_rank_one_matrix_recovered_by_rank_one() {
        // outer product of [1, 2, 3] and [1, -1]
        let mut triplets = Vec::new();
        for (r, u) in [1.0, 2.0, 3.0].iter().enumerate() {
            for (c, v) in [1.0, -1.0].iter().enumerate() {
                triplets.push((r, c, u * v));
            }
        }
        let m = SparseMatrix::from_triplets(3, 2, triplets);
        let svd = truncated_svd(&m, params(1)).unwrap();
        let approx = svd.user_factors.dot(&svd.item_factors);
        for (x, y) in approx.iter().zip(dense_of(&m).iter()) {
            assert!((x - y).abs() < 1e-8);
        }
        // sign convention: largest |entry| of the item row is positive
        let row = svd.item_factors.row(0);
        let pivot = row.iter().copied().fold(0.0f64, |b, v| if v.abs() > b.abs() { v } else { b });
        assert!(pivot > 0.0);
    }

    #[test]
    fn test_zero_matrix_gives_zero_factors() {
        let m = SparseMatrix::from_triplets(2, 2, vec![(0, 0, 0.0)]);
        let svd = truncated_svd(&m, params(2)).unwrap();
        assert!(svd.user_factors.iter().all(|v| *v == 0.0));
        assert!(svd.item_factors.iter().all(|v| *v == 0.0));
        assert!(svd.singular_values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let m = SparseMatrix::from_triplets(
            4,
            3,
            vec![(0, 0, 1.0), (1, 1, -2.0), (2, 2, 0.5), (3, 0, 0.25), (3, 2, 1.0)],
        );
        let a = truncated_svd(&m, params(2)).unwrap();
        let b = truncated_svd(&m, params(2)).unwrap();
        assert_eq!(a.user_factors, b.user_factors);
        assert_eq!(a.item_factors, b.item_factors);
    }
}
