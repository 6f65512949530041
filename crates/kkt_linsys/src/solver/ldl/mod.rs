//! Sparse LDLᵀ factorization of quasi-definite matrices.
//!
//! The input is the upper triangle of a symmetric matrix in CSC form. No
//! pivoting is done: the caller picks the ordering up front and the
//! factorization succeeds as long as no zero appears on the diagonal of D.
//!
//! ```text
//! analyze  -> LdlSymbolic   (elimination tree, nonzeros per column of L)
//! factor   -> LdlNumeric    (L, D, D⁻¹ and the workspaces)
//! refactor    new values, same pattern, in place
//! solve       x := (L D Lᵀ)⁻¹ x
//! ```

mod analyze;
mod error;
mod factor;
mod solve;

use crate::solver::matrix::csc::CscMatrix;

pub use analyze::analyze;
pub use error::{LdlError, LdlResult};
pub use factor::{factor, refactor};
pub use solve::solve;

/// Result of the pattern-only phase. Valid for every matrix with the same
/// upper-triangular pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdlSymbolic {
    pub n: usize,
    /// parent of each column in the elimination tree, `None` for roots
    pub etree: Vec<Option<usize>>,
    /// number of strictly-lower nonzeros in each column of L
    pub lnz: Vec<usize>,
    pub total_lnz: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    Unused,
    Used,
}

/// Scratch space for the numeric kernel, sized once and reused.
#[derive(Debug, Clone)]
pub(crate) struct LdlWorkspace {
    pub(crate) markers: Vec<Marker>,
    /// nonzero pattern of the current row of L, in topological order
    pub(crate) y_idx: Vec<usize>,
    pub(crate) elim_buffer: Vec<usize>,
    /// next free slot in each column of L
    pub(crate) next_in_col: Vec<usize>,
    pub(crate) y_vals: Vec<f64>,
}

impl LdlWorkspace {
    fn new(n: usize) -> Self {
        Self {
            markers: vec![Marker::Unused; n],
            y_idx: vec![0; n],
            elim_buffer: vec![0; n],
            next_in_col: vec![0; n],
            y_vals: vec![0.0; n],
        }
    }
}

#[derive(Debug, Clone)]
pub struct LdlNumeric {
    /// strictly lower triangular part of L, the unit diagonal is implicit
    pub l: CscMatrix,
    pub d: Vec<f64>,
    pub d_inv: Vec<f64>,
    /// number of strictly positive entries of D
    pub positive_pivots: usize,
    pub(crate) work: LdlWorkspace,
}

impl LdlNumeric {
    pub fn n(&self) -> usize {
        self.d.len()
    }

    /// nnz(L) + n, the storage of the factor including D
    pub fn factor_nnz(&self) -> usize {
        self.l.nnz() + self.d.len()
    }
}

#[cfg(test)]
mod tests;
