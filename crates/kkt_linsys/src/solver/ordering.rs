//! Fill-reducing orderings.
//!
//! The factorization only needs *some* permutation of the KKT matrix; which
//! heuristic produced it is irrelevant to correctness. Orderings are plugged
//! in through [`FillReducingOrdering`], and any `Fn(n, column_pointers,
//! row_indices)` closure qualifies as one.
//!
//! All orderings return `perm` with `perm[new] = old`.

use faer::dyn_stack::{MemBuffer, MemStack};
use faer::sparse::SymbolicSparseColMatRef;
use faer::sparse::linalg::amd;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solver::matrix::csc::CscMatrix;
use crate::solver::utils::{EMPTY, inverse_permutation};

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("invalid sparsity pattern: {0}")]
    InvalidPattern(String),

    #[error("ordering returned {actual} entries for a matrix of dimension {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("ordering result is not a permutation")]
    NotAPermutation,

    #[error("ordering failed: {0}")]
    Failed(String),
}

pub trait FillReducingOrdering {
    fn name(&self) -> &'static str;

    /// Compute `perm` (`perm[new] = old`) for the symmetric matrix whose
    /// pattern is given in CSC form. Either triangle, or both, may be stored.
    fn order(
        &self,
        n: usize,
        column_pointers: &[usize],
        row_indices: &[usize],
    ) -> Result<Vec<usize>, OrderingError>;
}

impl<F> FillReducingOrdering for F
where
    F: Fn(usize, &[usize], &[usize]) -> Result<Vec<usize>, OrderingError>,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn order(
        &self,
        n: usize,
        column_pointers: &[usize],
        row_indices: &[usize],
    ) -> Result<Vec<usize>, OrderingError> {
        self(n, column_pointers, row_indices)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMethod {
    #[default]
    Amd,
    MinimumDegree,
    Natural,
}

impl OrderingMethod {
    pub fn build(self, control: MinimumDegreeControl) -> Box<dyn FillReducingOrdering> {
        match self {
            OrderingMethod::Amd => Box::new(ApproximateMinimumDegree::new(control)),
            OrderingMethod::MinimumDegree => Box::new(MinimumDegree::new(control)),
            OrderingMethod::Natural => Box::new(NaturalOrdering),
        }
    }
}

/// Run `ordering` on the pattern of `a` and return `(perm, pinv)`.
///
/// Whatever the ordering returns is checked to be a bijection on `0..n`.
pub fn compute_permutation(
    ordering: &dyn FillReducingOrdering,
    a: &CscMatrix,
) -> Result<(Vec<usize>, Vec<usize>), OrderingError> {
    let n = a.dim.ncols;
    let perm = ordering.order(n, &a.column_pointers, &a.row_indices)?;
    if perm.len() != n {
        return Err(OrderingError::WrongLength {
            expected: n,
            actual: perm.len(),
        });
    }
    let pinv = inverse_permutation(&perm).ok_or(OrderingError::NotAPermutation)?;
    Ok((perm, pinv))
}

/// Identity ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrdering;

impl FillReducingOrdering for NaturalOrdering {
    fn name(&self) -> &'static str {
        "natural"
    }

    fn order(
        &self,
        n: usize,
        column_pointers: &[usize],
        row_indices: &[usize],
    ) -> Result<Vec<usize>, OrderingError> {
        check_pattern(n, column_pointers, row_indices)?;
        Ok((0..n).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimumDegreeControl {
    /// base multipler for sqrt(n) to determine the dense threshold,
    /// negative disables dense row detection
    pub dense: f64,
}

impl Default for MinimumDegreeControl {
    fn default() -> Self {
        Self { dense: 10.0 }
    }
}

impl MinimumDegreeControl {
    /// A row is "dense" if its degree exceeds this value. A row with 16 or
    /// fewer entries is never considered dense.
    fn dense_threshold(&self, n: usize) -> usize {
        if self.dense < 0.0 {
            return n;
        }
        let dense = (self.dense * (n as f64).sqrt()) as usize;
        dense.max(16).min(n)
    }
}

/// Minimum degree ordering on the explicit elimination graph.
///
/// Eliminates the node of smallest current degree (lowest index on ties),
/// connecting its neighbors into a clique. Dense rows are removed up front
/// and ordered last, as AMD does.
#[derive(Debug, Clone, Default)]
pub struct MinimumDegree {
    control: MinimumDegreeControl,
}

impl MinimumDegree {
    pub fn new(control: MinimumDegreeControl) -> Self {
        Self { control }
    }
}

/// Doubly linked lists of nodes bucketed by degree.
struct DegreeLists {
    head: Vec<isize>,
    next: Vec<isize>,
    last: Vec<isize>,
}

impl DegreeLists {
    fn new(n: usize) -> Self {
        Self {
            head: vec![EMPTY; n],
            next: vec![EMPTY; n],
            last: vec![EMPTY; n],
        }
    }

    fn insert(&mut self, i: usize, deg: usize) {
        let inext = self.head[deg];
        if inext != EMPTY {
            self.last[inext as usize] = i as isize;
        }
        self.next[i] = inext;
        self.last[i] = EMPTY;
        self.head[deg] = i as isize;
    }

    fn remove(&mut self, i: usize, deg: usize) {
        let inext = self.next[i];
        let ilast = self.last[i];
        if inext != EMPTY {
            self.last[inext as usize] = ilast;
        }
        if ilast != EMPTY {
            self.next[ilast as usize] = inext;
        } else {
            // i is at the head of the degree list
            self.head[deg] = inext;
        }
    }
}

impl FillReducingOrdering for MinimumDegree {
    fn name(&self) -> &'static str {
        "minimum_degree"
    }

    fn order(
        &self,
        n: usize,
        column_pointers: &[usize],
        row_indices: &[usize],
    ) -> Result<Vec<usize>, OrderingError> {
        check_pattern(n, column_pointers, row_indices)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        // symmetric adjacency without the diagonal
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for j in 0..n {
            for &i in &row_indices[column_pointers[j]..column_pointers[j + 1]] {
                if i != j {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
            list.dedup();
        }

        let threshold = self.control.dense_threshold(n);
        let dense: Vec<bool> = adjacency.iter().map(|list| list.len() > threshold).collect();
        if dense.iter().any(|&d| d) {
            for (i, list) in adjacency.iter_mut().enumerate() {
                if dense[i] {
                    list.clear();
                } else {
                    list.retain(|&x| !dense[x]);
                }
            }
        }

        let mut lists = DegreeLists::new(n);
        let mut degree = vec![0usize; n];
        // reverse insertion leaves the lowest index at the head of each bucket
        for i in (0..n).rev().filter(|&i| !dense[i]) {
            degree[i] = adjacency[i].len();
            lists.insert(i, degree[i]);
        }

        let nsparse = dense.iter().filter(|&&d| !d).count();
        let mut perm = Vec::with_capacity(n);
        let mut stamp = vec![0usize; n];
        let mut tag = 0usize;
        let mut mindeg = 0usize;

        for _ in 0..nsparse {
            while lists.head[mindeg] == EMPTY {
                mindeg += 1;
            }
            let pivot = lists.head[mindeg] as usize;
            lists.remove(pivot, mindeg);
            perm.push(pivot);

            // the neighbors of the pivot become a clique
            let neighbors = std::mem::take(&mut adjacency[pivot]);
            for &u in &neighbors {
                tag += 1;
                let list = &mut adjacency[u];
                list.retain(|&x| x != pivot);
                for &x in list.iter() {
                    stamp[x] = tag;
                }
                for &x in &neighbors {
                    if x != u && stamp[x] != tag {
                        stamp[x] = tag;
                        list.push(x);
                    }
                }
                let new_degree = list.len();
                lists.remove(u, degree[u]);
                degree[u] = new_degree;
                lists.insert(u, new_degree);
                mindeg = mindeg.min(new_degree);
            }
        }

        perm.extend((0..n).filter(|&i| dense[i]));
        debug_assert_eq!(perm.len(), n);
        Ok(perm)
    }
}

/// Approximate minimum degree (faer's AMD) with aggressive absorption.
///
/// Shares the dense-row control with [`MinimumDegree`]. Row indices have to
/// be sorted within each column.
#[derive(Debug, Clone, Default)]
pub struct ApproximateMinimumDegree {
    control: MinimumDegreeControl,
}

impl ApproximateMinimumDegree {
    pub fn new(control: MinimumDegreeControl) -> Self {
        Self { control }
    }
}

impl FillReducingOrdering for ApproximateMinimumDegree {
    fn name(&self) -> &'static str {
        "amd"
    }

    fn order(
        &self,
        n: usize,
        column_pointers: &[usize],
        row_indices: &[usize],
    ) -> Result<Vec<usize>, OrderingError> {
        check_pattern(n, column_pointers, row_indices)?;
        for j in 0..n {
            let rows = &row_indices[column_pointers[j]..column_pointers[j + 1]];
            if rows.windows(2).any(|w| w[0] >= w[1]) {
                return Err(OrderingError::InvalidPattern(format!(
                    "row indices of column {j} are not strictly increasing"
                )));
            }
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let nnz = column_pointers[n];
        let pattern = SymbolicSparseColMatRef::new_checked(
            n,
            n,
            column_pointers,
            None,
            &row_indices[..nnz],
        );
        let mut perm = vec![0usize; n];
        let mut perm_inv = vec![0usize; n];
        let mut mem = MemBuffer::try_new(amd::order_scratch::<usize>(n, nnz))
            .map_err(|e| OrderingError::Failed(format!("amd workspace: {e:?}")))?;
        amd::order(
            &mut perm,
            &mut perm_inv,
            pattern,
            amd::Control {
                dense: self.control.dense,
                aggressive: true,
            },
            MemStack::new(&mut mem),
        )
        .map_err(|e| OrderingError::Failed(format!("amd: {e}")))?;
        Ok(perm)
    }
}

fn check_pattern(
    n: usize,
    column_pointers: &[usize],
    row_indices: &[usize],
) -> Result<(), OrderingError> {
    if column_pointers.len() != n + 1 {
        return Err(OrderingError::InvalidPattern(format!(
            "expected {} column pointers, got {}",
            n + 1,
            column_pointers.len()
        )));
    }
    if column_pointers[0] != 0 || column_pointers[n] > row_indices.len() {
        return Err(OrderingError::InvalidPattern(
            "column pointers do not span the row indices".to_string(),
        ));
    }
    for j in 0..n {
        if column_pointers[j] > column_pointers[j + 1] {
            return Err(OrderingError::InvalidPattern(format!(
                "column pointers decrease at column {j}"
            )));
        }
    }
    if let Some(&bad) = row_indices[..column_pointers[n]].iter().find(|&&i| i >= n) {
        return Err(OrderingError::InvalidPattern(format!(
            "row index {bad} out of range for dimension {n}"
        )));
    }
    Ok(())
}
