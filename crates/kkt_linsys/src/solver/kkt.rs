//! Assembly of the quasi-definite KKT matrix
//!
//! ```text
//! [ P + σI        Aᵗ      ]
//! [ A        -diag(ρ⁻¹)   ]
//! ```
//!
//! stored as its upper triangle, together with the index maps that let the
//! update paths overwrite the values of P, A and ρ⁻¹ without re-assembling.
//! Maps are positions in the KKT nonzero array. They are built against the
//! assembled matrix and rewritten by [`permute_kkt`] to point into the
//! permuted one.

use thiserror::Error;

use crate::solver::matrix::builder::MatrixBuilder;
use crate::solver::matrix::csc::CscMatrix;
use crate::solver::matrix::error::CscError;
use crate::solver::ordering::{FillReducingOrdering, OrderingError, compute_permutation};

#[derive(Debug, Error)]
pub enum KktError {
    #[error(transparent)]
    Csc(#[from] CscError),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error("A has {actual} columns but P is {expected} x {expected}")]
    ColumnMismatch { expected: usize, actual: usize },

    #[error("regularization has {actual} entries for {expected} constraints")]
    RegularizationLength { expected: usize, actual: usize },

    #[error("{matrix} has {actual} nonzeros but its KKT map has {expected}")]
    MapLength {
        matrix: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{matrix} nonzero index {index} out of range ({nnz} nonzeros)")]
    ChangedIndex {
        matrix: &'static str,
        index: usize,
        nnz: usize,
    },
}

pub type KktResult<T> = Result<T, KktError>;

/// Value placed on the lower-right diagonal block, stored as ρ⁻¹.
#[derive(Debug, Clone, PartialEq)]
pub enum DualRegularization {
    /// same ρ⁻¹ for every constraint
    Scalar(f64),
    /// ρ⁻¹ per constraint
    PerConstraint(Vec<f64>),
}

impl DualRegularization {
    /// ρ⁻¹ for constraint `j`
    #[inline]
    pub fn get(&self, j: usize) -> f64 {
        match self {
            DualRegularization::Scalar(rho_inv) => *rho_inv,
            DualRegularization::PerConstraint(rho_inv) => rho_inv[j],
        }
    }

    pub fn from_rho(rho: f64) -> Self {
        DualRegularization::Scalar(1.0 / rho)
    }

    pub fn from_rho_vec(rho: &[f64]) -> Self {
        DualRegularization::PerConstraint(rho.iter().map(|r| 1.0 / r).collect())
    }

    fn check_len(&self, m: usize) -> KktResult<()> {
        match self {
            DualRegularization::PerConstraint(v) if v.len() != m => {
                Err(KktError::RegularizationLength {
                    expected: m,
                    actual: v.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Where each value of P, A and each ρ⁻¹ diagonal lives in the KKT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KktIndexMaps {
    pub p_to_kkt: Vec<usize>,
    pub a_to_kkt: Vec<usize>,
    pub rho_to_kkt: Vec<usize>,
}

impl KktIndexMaps {
    /// Rewrite every position through `mapping` (old position -> new position).
    pub fn remap(&mut self, mapping: &[usize]) {
        for slot in self
            .p_to_kkt
            .iter_mut()
            .chain(self.a_to_kkt.iter_mut())
            .chain(self.rho_to_kkt.iter_mut())
        {
            *slot = mapping[*slot];
        }
    }
}

#[derive(Debug, Clone)]
pub struct KktAssembly {
    pub kkt: CscMatrix,
    pub maps: Option<KktIndexMaps>,
    /// number of primal variables (dimension of P)
    pub n: usize,
    /// number of constraints (rows of A)
    pub m: usize,
}

/// Assemble the upper triangle of the KKT matrix.
///
/// `p` is the upper triangle of P (n x n), `a` is A (m x n). Every diagonal
/// entry of the top block is present even where P has none, and explicit
/// zeros in P or A keep their slot. Maps are only built when `track_maps`.
pub fn form_kkt(
    p: &CscMatrix,
    a: &CscMatrix,
    sigma: f64,
    lower: &DualRegularization,
    track_maps: bool,
) -> KktResult<KktAssembly> {
    p.check_invariants()?;
    a.check_invariants()?;
    p.check_upper_triangular()?;

    let n = p.dim.ncols;
    let m = a.dim.nrows;
    if a.dim.ncols != n {
        return Err(KktError::ColumnMismatch {
            expected: n,
            actual: a.dim.ncols,
        });
    }
    lower.check_len(m)?;

    let mut builder = MatrixBuilder::new(n + m, n + m);
    builder.reserve(n + p.nnz() + a.nnz() + m);

    // P + σI, the σ diagonal is pushed first so it always exists
    for j in 0..n {
        builder.push(j, j, sigma)?;
    }
    let p_start = builder.len();
    for j in 0..n {
        let (rows, vals) = p.col(j);
        for (&i, &v) in rows.iter().zip(vals.iter()) {
            builder.push(j, i, v)?;
        }
    }

    // A(i, j) is KKT(j, n + i) in the upper triangle
    let a_start = builder.len();
    for j in 0..a.dim.ncols {
        let (rows, vals) = a.col(j);
        for (&i, &v) in rows.iter().zip(vals.iter()) {
            builder.push(n + i, j, v)?;
        }
    }

    let rho_start = builder.len();
    for i in 0..m {
        builder.push(n + i, n + i, -lower.get(i))?;
    }

    let (kkt, mapping) = builder.build_csc_with_mapping();
    let maps = track_maps.then(|| KktIndexMaps {
        p_to_kkt: mapping.range(p_start, p.nnz()).to_vec(),
        a_to_kkt: mapping.range(a_start, a.nnz()).to_vec(),
        rho_to_kkt: mapping.range(rho_start, m).to_vec(),
    });

    Ok(KktAssembly { kkt, maps, n, m })
}

/// The KKT matrix after the fill-reducing permutation, `kkt = Pᵗ K P`.
#[derive(Debug, Clone)]
pub struct PermutedKkt {
    pub kkt: CscMatrix,
    /// `perm[new] = old`
    pub perm: Vec<usize>,
    /// `pinv[old] = new`
    pub pinv: Vec<usize>,
    pub maps: Option<KktIndexMaps>,
}

/// Order the assembled KKT with `ordering`, permute it and carry the maps
/// into the permuted coordinates.
pub fn permute_kkt(
    assembly: KktAssembly,
    ordering: &dyn FillReducingOrdering,
) -> KktResult<PermutedKkt> {
    let KktAssembly { kkt, mut maps, .. } = assembly;

    let (perm, pinv) = compute_permutation(ordering, &kkt)?;
    let (permuted, mapping) = kkt.symmetric_permute(&pinv)?;

    if let Some(maps) = maps.as_mut() {
        maps.remap(&mapping);
    }

    Ok(PermutedKkt {
        kkt: permuted,
        perm,
        pinv,
        maps,
    })
}

/// Check that `map` covers every nonzero and that `changed` stays in range.
/// Runs before any value is written, so a rejected update leaves the KKT
/// untouched.
pub fn check_update(
    matrix: &'static str,
    changed: Option<&[usize]>,
    map: &[usize],
    nnz: usize,
) -> KktResult<()> {
    if map.len() != nnz {
        return Err(KktError::MapLength {
            matrix,
            expected: map.len(),
            actual: nnz,
        });
    }
    if let Some(&index) = changed.into_iter().flatten().find(|&&i| i >= nnz) {
        return Err(KktError::ChangedIndex { matrix, index, nnz });
    }
    Ok(())
}

/// Which nonzeros to rewrite: the listed ones, or all of them.
fn changed_indices<'a>(
    changed: Option<&'a [usize]>,
    nnz: usize,
) -> Box<dyn Iterator<Item = usize> + 'a> {
    match changed {
        Some(indices) => Box::new(indices.iter().copied()),
        None => Box::new(0..nnz),
    }
}

/// Write new values of P (upper triangle) into the KKT. Diagonal entries
/// get `sigma` added back.
pub fn update_kkt_p(
    kkt: &mut CscMatrix,
    p: &CscMatrix,
    changed: Option<&[usize]>,
    p_to_kkt: &[usize],
    sigma: f64,
) -> KktResult<()> {
    check_update("P", changed, p_to_kkt, p.nnz())?;
    for idx in changed_indices(changed, p.nnz()) {
        let column = p.column_of(idx);
        let mut value = p.value(idx);
        if p.row_index(idx) == column {
            value += sigma;
        }
        *kkt.get_mut_nnz(p_to_kkt[idx]) = value;
    }
    Ok(())
}

/// Write new values of A into the KKT.
pub fn update_kkt_a(
    kkt: &mut CscMatrix,
    a: &CscMatrix,
    changed: Option<&[usize]>,
    a_to_kkt: &[usize],
) -> KktResult<()> {
    check_update("A", changed, a_to_kkt, a.nnz())?;
    for idx in changed_indices(changed, a.nnz()) {
        *kkt.get_mut_nnz(a_to_kkt[idx]) = a.value(idx);
    }
    Ok(())
}

/// Write `-ρ⁻¹` on the lower-right diagonal.
pub fn update_kkt_rho(
    kkt: &mut CscMatrix,
    lower: &DualRegularization,
    rho_to_kkt: &[usize],
) -> KktResult<()> {
    lower.check_len(rho_to_kkt.len())?;
    for (j, &slot) in rho_to_kkt.iter().enumerate() {
        *kkt.get_mut_nnz(slot) = -lower.get(j);
    }
    Ok(())
}
