use ndarray::Array2;

use crate::solver::matrix::Dim;
use crate::solver::matrix::error::CscError;

/// Compressed Sparse Column matrix
/// - column pointers are the indices of the start and end of each column
/// - row indices are the indices of the rows of the non zero values
/// - values are the non zero values
///
/// Symmetric matrices (KKT, P, the permuted KKT) store only the upper
/// triangle, diagonal included.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    pub dim: Dim,
    /// Column pointers, len = ncols + 1
    pub column_pointers: Vec<usize>,
    /// Row indices, len = nnz
    pub row_indices: Vec<usize>,
    /// Nonzero values, len = nnz
    pub values: Vec<f64>,
}

impl CscMatrix {
    /// Build from raw CSC arrays, checking every invariant.
    pub fn new(
        nrows: usize,
        ncols: usize,
        column_pointers: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, CscError> {
        let a = Self {
            dim: Dim { nrows, ncols },
            column_pointers,
            row_indices,
            values,
        };
        a.check_invariants()?;
        Ok(a)
    }

    /// An `nrows x ncols` matrix without any stored entries.
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self {
            dim: Dim { nrows, ncols },
            column_pointers: vec![0; ncols + 1],
            row_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Square diagonal matrix with `diagonal` on the main diagonal.
    pub fn diagonal(diagonal: &[f64]) -> Self {
        let n = diagonal.len();
        Self {
            dim: Dim { nrows: n, ncols: n },
            column_pointers: (0..=n).collect(),
            row_indices: (0..n).collect(),
            values: diagonal.to_vec(),
        }
    }

    /// number of non zero values
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_square(&self) -> bool {
        self.dim.nrows == self.dim.ncols
    }

    #[inline]
    pub fn col_start(&self, j: usize) -> usize {
        self.column_pointers[j]
    }

    #[inline]
    pub fn col_end(&self, j: usize) -> usize {
        self.column_pointers[j + 1]
    }

    #[inline]
    pub fn row_index(&self, p: usize) -> usize {
        self.row_indices[p]
    }

    #[inline]
    pub fn value(&self, p: usize) -> f64 {
        self.values[p]
    }

    #[inline]
    pub fn get_mut_nnz(&mut self, p: usize) -> &mut f64 {
        &mut self.values[p]
    }

    /// Column that owns the nonzero at position `p`.
    pub fn column_of(&self, p: usize) -> usize {
        debug_assert!(p < self.nnz());
        // first column whose end is past p
        self.column_pointers[1..].partition_point(|&end| end <= p)
    }

    pub fn check_invariants(&self) -> Result<(), CscError> {
        if self.column_pointers.len() != self.dim.ncols + 1 {
            return Err(CscError::InvalidColumnPointersLength {
                expected: self.dim.ncols + 1,
                actual: self.column_pointers.len(),
            });
        }
        if self.column_pointers[0] != 0 {
            return Err(CscError::InvalidColumnPointers {
                index: 0,
                expected: 0,
                actual: self.column_pointers[0],
            });
        }
        let last = self.column_pointers[self.dim.ncols];
        if last != self.nnz() {
            return Err(CscError::InvalidColumnPointers {
                index: self.dim.ncols,
                expected: self.nnz(),
                actual: last,
            });
        }
        if self.row_indices.len() != self.values.len() {
            return Err(CscError::RowIndicesValuesLengthMismatch {
                values: self.values.len(),
                row_indices: self.row_indices.len(),
            });
        }
        // per-column sorted & in-range
        for j in 0..self.dim.ncols {
            let (start, end) = (self.column_pointers[j], self.column_pointers[j + 1]);
            if start > end || end > self.nnz() {
                return Err(CscError::InvalidColumnPointers {
                    index: j,
                    expected: start,
                    actual: end,
                });
            }
            let mut prev = None;
            for &r in &self.row_indices[start..end] {
                if r >= self.dim.nrows {
                    return Err(CscError::OutOfBoundsIndex {
                        index: r,
                        max: self.dim.nrows,
                    });
                }
                if let Some(p) = prev {
                    if r <= p {
                        return Err(CscError::RowsNotStrictlyIncreasing {
                            index: j,
                            expected: p,
                            actual: r,
                        });
                    }
                }
                prev = Some(r);
            }
        }
        Ok(())
    }

    /// Ok if the matrix is square and holds no entry below the diagonal.
    pub fn check_upper_triangular(&self) -> Result<(), CscError> {
        if !self.is_square() {
            return Err(CscError::NonSquare {
                nrows: self.dim.nrows,
                ncols: self.dim.ncols,
            });
        }
        for j in 0..self.dim.ncols {
            // rows are sorted, the last one is the largest
            if let Some(&row) = self.col(j).0.last() {
                if row > j {
                    return Err(CscError::NotUpperTriangular { column: j, row });
                }
            }
        }
        Ok(())
    }

    /// Return (row_indices, values) slice for column j
    pub fn col(&self, j: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.column_pointers[j], self.column_pointers[j + 1]);
        (&self.row_indices[s..e], &self.values[s..e])
    }

    /// y[rows] += x * A(:, j)
    pub fn axpy_into_dense_col(&self, j: usize, x: f64, y: &mut [f64]) {
        let (rows, vals) = self.col(j);
        for (&i, &a) in rows.iter().zip(vals.iter()) {
            y[i] += x * a;
        }
    }

    /// y = A * x for a general (non-symmetric) matrix.
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(self.dim.ncols, x.len());
        debug_assert_eq!(self.dim.nrows, y.len());
        y.fill(0.0);
        for j in 0..self.dim.ncols {
            self.axpy_into_dense_col(j, x[j], y);
        }
    }

    /// y = A * x where only the upper triangle of the symmetric A is stored.
    pub fn symmetric_upper_matvec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert!(self.is_square());
        y.fill(0.0);
        for j in 0..self.dim.ncols {
            let (rows, vals) = self.col(j);
            for (&i, &a) in rows.iter().zip(vals.iter()) {
                y[i] += a * x[j];
                if i != j {
                    y[j] += a * x[i];
                }
            }
        }
    }

    /// Keep only the entries on or above the diagonal.
    pub fn upper_triangle(&self) -> CscMatrix {
        let mut column_pointers = Vec::with_capacity(self.dim.ncols + 1);
        column_pointers.push(0);
        let mut row_indices = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());

        for j in 0..self.dim.ncols {
            let (rows, vals) = self.col(j);
            for (&i, &v) in rows.iter().zip(vals.iter()) {
                if i <= j {
                    row_indices.push(i);
                    values.push(v);
                }
            }
            column_pointers.push(row_indices.len());
        }
        CscMatrix {
            dim: self.dim.clone(),
            column_pointers,
            row_indices,
            values,
        }
    }

    /// Symmetric permutation `C = P' A P` of an upper-triangular symmetric matrix,
    /// where `pinv[old] = new`. The result is again stored as an upper triangle
    /// with sorted rows.
    ///
    /// The second return value maps each nonzero position of `self` to its
    /// position in `C`.
    pub fn symmetric_permute(&self, pinv: &[usize]) -> Result<(CscMatrix, Vec<usize>), CscError> {
        self.check_upper_triangular()?;
        let n = self.dim.ncols;
        if pinv.len() != n {
            return Err(CscError::PermutationLength {
                expected: n,
                actual: pinv.len(),
            });
        }

        // count entries per column of C
        let mut column_pointers = vec![0usize; n + 1];
        for j in 0..n {
            let j2 = pinv[j];
            for &i in self.col(j).0 {
                let i2 = pinv[i];
                column_pointers[i2.max(j2) + 1] += 1;
            }
        }
        for j in 0..n {
            column_pointers[j + 1] += column_pointers[j];
        }

        let nnz = self.nnz();
        let mut row_indices = vec![0usize; nnz];
        let mut values = vec![0f64; nnz];
        let mut mapping = vec![0usize; nnz];
        let mut next = column_pointers.clone();
        for j in 0..n {
            let j2 = pinv[j];
            for p in self.col_start(j)..self.col_end(j) {
                let i2 = pinv[self.row_indices[p]];
                let col = i2.max(j2);
                let q = next[col];
                next[col] += 1;
                row_indices[q] = i2.min(j2);
                values[q] = self.values[p];
                mapping[p] = q;
            }
        }

        // scattered rows are not sorted within a column, fix that and keep
        // the mapping consistent
        let mut source = vec![0usize; nnz];
        for (p, &q) in mapping.iter().enumerate() {
            source[q] = p;
        }
        let mut column: Vec<(usize, f64, usize)> = Vec::new();
        for j in 0..n {
            let (start, end) = (column_pointers[j], column_pointers[j + 1]);
            column.clear();
            column.extend((start..end).map(|q| (row_indices[q], values[q], source[q])));
            column.sort_unstable_by_key(|&(row, _, _)| row);
            for (q, &(row, value, src)) in (start..end).zip(column.iter()) {
                row_indices[q] = row;
                values[q] = value;
                mapping[src] = q;
            }
        }

        let c = CscMatrix {
            dim: self.dim.clone(),
            column_pointers,
            row_indices,
            values,
        };
        debug_assert!(c.check_invariants().is_ok());
        Ok((c, mapping))
    }

    /// Dense copy of the stored entries.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.dim.nrows, self.dim.ncols));
        for j in 0..self.dim.ncols {
            let (rows, vals) = self.col(j);
            for (&i, &v) in rows.iter().zip(vals.iter()) {
                dense[[i, j]] += v;
            }
        }
        dense
    }

    /// Dense copy of a symmetric matrix stored as its upper triangle.
    pub fn to_dense_symmetric(&self) -> Array2<f64> {
        let mut dense = self.to_dense();
        for j in 0..self.dim.ncols {
            for &i in self.col(j).0 {
                if i != j {
                    dense[[j, i]] = dense[[i, j]];
                }
            }
        }
        dense
    }
}
