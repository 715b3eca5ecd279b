//! Compressed sparse row matrix for the centered rating matrix.
//!
//! Only what the factorization needs: build from triplets, multiply by a
//! dense block, and transpose. Products run row-parallel with rayon; each
//! output row is summed sequentially, so results do not depend on thread
//! scheduling.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

/// Row-major sparse matrix (CSR)
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Build from (row, col, value) triplets.
    ///
    /// Duplicate coordinates are summed. Triplets outside the shape are a
    /// programming error and panic.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Self {
        triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; n_rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in triplets {
            assert!(r < n_rows && c < n_cols, "triplet ({r}, {c}) outside {n_rows}x{n_cols}");
            if last == Some((r, c)) {
                if let Some(slot) = values.last_mut() {
                    *slot += v;
                }
                continue;
            }
            col_idx.push(c);
            values.push(v);
            row_ptr[r + 1] += 1;
            last = Some((r, c));
        }
        for r in 0..n_rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of one row
    pub fn row(&self, r: usize) -> (&[usize], &[f64]) {
        let span = self.row_ptr[r]..self.row_ptr[r + 1];
        (&self.col_idx[span.clone()], &self.values[span])
    }

    /// Stored value at (r, c), zero when absent
    pub fn get(&self, r: usize, c: usize) -> f64 {
        let (cols, vals) = self.row(r);
        match cols.binary_search(&c) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        }
    }

    /// The transposed matrix, also in CSR form
    pub fn transpose(&self) -> SparseMatrix {
        let triplets = (0..self.n_rows)
            .flat_map(|r| {
                let (cols, vals) = self.row(r);
                cols.iter().zip(vals).map(move |(&c, &v)| (c, r, v))
            })
            .collect();
        SparseMatrix::from_triplets(self.n_cols, self.n_rows, triplets)
    }

    /// `self * dense`, where `dense` has `n_cols` rows
    pub fn mul_dense(&self, dense: &Array2<f64>) -> Array2<f64> {
        assert_eq!(dense.nrows(), self.n_cols, "dimension mismatch");
        let width = dense.ncols();

        let rows: Vec<Vec<f64>> = (0..self.n_rows)
            .into_par_iter()
            .map(|r| {
                let mut acc = vec![0.0; width];
                let (cols, vals) = self.row(r);
                for (&c, &v) in cols.iter().zip(vals) {
                    for (a, x) in acc.iter_mut().zip(dense.row(c)) {
                        *a += v * x;
                    }
                }
                acc
            })
            .collect();

        let mut out = Array2::zeros((self.n_rows, width));
        for (r, row) in rows.iter().enumerate() {
            out.row_mut(r).assign(&ArrayView1::from(row.as_slice()));
        }
        out
    }
}
