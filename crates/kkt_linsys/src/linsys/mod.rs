//! Linear-system solvers used by the ADMM iterations and by solution polishing.
//!
//! Every solver handles the reduced KKT system
//!
//! ```text
//! [ P + σI        Aᵗ      ] [ x ]   [ b_x ]
//! [ A        -diag(ρ⁻¹)   ] [ ν ] = [ b_z ]
//! ```
//!
//! and is driven through [`LinearSystemSolver`]. The only family implemented
//! here is the sparse direct LDLᵀ solver, [`QdldlSolver`].

mod qdldl;

pub use qdldl::{QdldlSolver, SolverMode};

use crate::error::LinsysResult;
use crate::settings::LinsysSettings;
use crate::solver::matrix::csc::CscMatrix;

/// How a backend solves the system. Only the direct LDLᵀ backend exists
/// here; `Indirect` is the slot for an iterative backend behind the same
/// trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Direct,
    Indirect,
}

/// New step size for [`LinearSystemSolver::update_rho`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rho<'a> {
    Scalar(f64),
    PerConstraint(&'a [f64]),
}

pub trait LinearSystemSolver {
    fn name(&self) -> &'static str;

    fn kind(&self) -> SolverKind;

    fn nthreads(&self) -> usize;

    /// Solve the KKT system with right-hand side `b` (length n + m),
    /// overwriting `b` with the solution.
    ///
    /// In ADMM mode the top n entries become x̃ and the bottom m entries
    /// become z̃ = b_z + ρ⁻¹ ν. A polishing solver returns (x, ν) unchanged.
    fn solve(&mut self, b: &mut [f64], admm_iter: usize) -> LinsysResult<()>;

    /// New values for P (upper triangle) and A on the pattern the solver was
    /// built with. `*_changed` lists the nonzero indices to rewrite, `None`
    /// rewrites all of them.
    fn update_matrices(
        &mut self,
        p: &CscMatrix,
        p_changed: Option<&[usize]>,
        a: &CscMatrix,
        a_changed: Option<&[usize]>,
    ) -> LinsysResult<()>;

    fn update_rho(&mut self, rho: Rho<'_>) -> LinsysResult<()>;

    fn update_settings(&mut self, settings: &LinsysSettings) -> LinsysResult<()>;

    fn warm_start(&mut self, x: &[f64]) -> LinsysResult<()>;
}

/// Build the linear-system solver for `P` (upper triangle, n x n) and `A`
/// (m x n).
///
/// `rho_vec` selects per-constraint step sizes, otherwise `settings.rho` is
/// used for every constraint. A polishing solver regularizes both blocks
/// with σ and cannot be updated.
pub fn init_linsys_solver(
    p: &CscMatrix,
    a: &CscMatrix,
    rho_vec: Option<&[f64]>,
    settings: &LinsysSettings,
    polishing: bool,
) -> LinsysResult<Box<dyn LinearSystemSolver>> {
    let solver = QdldlSolver::new(p, a, rho_vec, settings, polishing)?;
    Ok(Box::new(solver))
}
