use tracing::{debug, error, trace, warn};

use crate::error::{LinsysError, LinsysResult};
use crate::linsys::{LinearSystemSolver, Rho, SolverKind};
use crate::settings::{LinsysSettings, check_rho};
use crate::solver::kkt::{
    DualRegularization, KktIndexMaps, check_update, form_kkt, permute_kkt, update_kkt_a,
    update_kkt_p, update_kkt_rho,
};
use crate::solver::ldl::{self, LdlNumeric, LdlSymbolic};
use crate::solver::matrix::csc::CscMatrix;

#[derive(Debug, Clone)]
pub enum SolverMode {
    /// keeps the permuted KKT and its maps for the update paths
    Admm {
        kkt: CscMatrix,
        maps: KktIndexMaps,
    },
    /// factor once, solve, drop
    Polish,
}

/// Direct solver: fill-reducing permutation followed by a sparse LDLᵀ
/// factorization of the quasi-definite KKT matrix.
#[derive(Debug, Clone)]
pub struct QdldlSolver {
    n: usize,
    m: usize,
    sigma: f64,
    rho_inv: DualRegularization,
    /// `perm[new] = old`
    perm: Vec<usize>,
    symbolic: LdlSymbolic,
    numeric: LdlNumeric,
    /// permuted right-hand side
    bp: Vec<f64>,
    sol: Vec<f64>,
    mode: SolverMode,
}

impl QdldlSolver {
    pub fn new(
        p: &CscMatrix,
        a: &CscMatrix,
        rho_vec: Option<&[f64]>,
        settings: &LinsysSettings,
        polishing: bool,
    ) -> LinsysResult<Self> {
        settings.validate()?;
        let n = p.dim.ncols;
        let m = a.dim.nrows;
        let sigma = settings.sigma;

        let rho_inv = match rho_vec {
            Some(rho) => {
                check_len("rho_vec", rho.len(), m)?;
                rho.iter().try_for_each(|&r| check_rho(r))?;
                DualRegularization::from_rho_vec(rho)
            }
            None => DualRegularization::from_rho(settings.rho),
        };

        // polish regularizes the dual block with σ as well
        let lower = if polishing {
            DualRegularization::Scalar(sigma)
        } else {
            rho_inv.clone()
        };

        let ordering = settings.ordering.build(settings.ordering_control());
        let permuted = form_kkt(p, a, sigma, &lower, !polishing)
            .and_then(|assembly| permute_kkt(assembly, ordering.as_ref()))
            .map_err(|e| {
                error!("error forming and permuting KKT matrix: {e}");
                e
            })?;

        let symbolic = ldl::analyze(&permuted.kkt)?;
        let numeric = ldl::factor(&permuted.kkt, &symbolic).map_err(|e| {
            warn!("KKT factorization failed: {e}");
            e
        })?;
        check_convexity(numeric.positive_pivots, n)?;

        debug!(
            n,
            m,
            polishing,
            ordering = ordering.name(),
            kkt_nnz = permuted.kkt.nnz(),
            l_nnz = symbolic.total_lnz,
            "factored KKT matrix"
        );

        let mode = match (polishing, permuted.maps) {
            (false, Some(maps)) => SolverMode::Admm {
                kkt: permuted.kkt,
                maps,
            },
            _ => SolverMode::Polish,
        };

        Ok(Self {
            n,
            m,
            sigma,
            rho_inv,
            perm: permuted.perm,
            symbolic,
            numeric,
            bp: vec![0.0; n + m],
            sol: vec![0.0; n + m],
            mode,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn is_polishing(&self) -> bool {
        matches!(self.mode, SolverMode::Polish)
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    pub fn symbolic(&self) -> &LdlSymbolic {
        &self.symbolic
    }

    pub fn numeric(&self) -> &LdlNumeric {
        &self.numeric
    }

    pub fn rho_inv(&self) -> &DualRegularization {
        &self.rho_inv
    }

    /// Permuted KKT matrix, retained only in ADMM mode.
    pub fn kkt(&self) -> Option<&CscMatrix> {
        match &self.mode {
            SolverMode::Admm { kkt, .. } => Some(kkt),
            SolverMode::Polish => None,
        }
    }

    pub fn maps(&self) -> Option<&KktIndexMaps> {
        match &self.mode {
            SolverMode::Admm { maps, .. } => Some(maps),
            SolverMode::Polish => None,
        }
    }

    /// Numeric factorization of the retained KKT, pattern and etree reused.
    fn refactor(&mut self) -> LinsysResult<()> {
        let SolverMode::Admm { kkt, .. } = &self.mode else {
            return Err(LinsysError::UpdateUnavailable("refactor"));
        };
        ldl::refactor(kkt, &self.symbolic, &mut self.numeric).map_err(|e| {
            warn!("KKT refactorization failed: {e}");
            e
        })?;
        trace!(
            positive_pivots = self.numeric.positive_pivots,
            "refactored KKT matrix"
        );
        check_convexity(self.numeric.positive_pivots, self.n)
    }
}

fn check_len(what: &'static str, actual: usize, expected: usize) -> LinsysResult<()> {
    if actual != expected {
        return Err(LinsysError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// P + σI is positive definite iff the first n pivots are all positive.
fn check_convexity(positive: usize, n: usize) -> LinsysResult<()> {
    if positive < n {
        warn!(positive, required = n, "KKT matrix has too few positive pivots");
        return Err(LinsysError::NonConvex {
            positive,
            required: n,
        });
    }
    Ok(())
}

impl LinearSystemSolver for QdldlSolver {
    fn name(&self) -> &'static str {
        "QDLDL"
    }

    fn kind(&self) -> SolverKind {
        SolverKind::Direct
    }

    fn nthreads(&self) -> usize {
        1
    }

    fn solve(&mut self, b: &mut [f64], _admm_iter: usize) -> LinsysResult<()> {
        let (n, m) = (self.n, self.m);
        check_len("right-hand side", b.len(), n + m)?;

        for (j, &old) in self.perm.iter().enumerate() {
            self.bp[j] = b[old];
        }
        ldl::solve(&self.numeric, &mut self.bp);

        match self.mode {
            SolverMode::Polish => {
                for (j, &old) in self.perm.iter().enumerate() {
                    b[old] = self.bp[j];
                }
            }
            SolverMode::Admm { .. } => {
                for (j, &old) in self.perm.iter().enumerate() {
                    self.sol[old] = self.bp[j];
                }
                // x̃ as is, z̃ = b_z + ρ⁻¹ ν
                b[..n].copy_from_slice(&self.sol[..n]);
                for j in 0..m {
                    b[n + j] += self.rho_inv.get(j) * self.sol[n + j];
                }
            }
        }
        Ok(())
    }

    fn update_matrices(
        &mut self,
        p: &CscMatrix,
        p_changed: Option<&[usize]>,
        a: &CscMatrix,
        a_changed: Option<&[usize]>,
    ) -> LinsysResult<()> {
        let SolverMode::Admm { kkt, maps } = &mut self.mode else {
            return Err(LinsysError::UpdateUnavailable("update_matrices"));
        };
        check_len("P columns", p.dim.ncols, self.n)?;
        check_len("A columns", a.dim.ncols, self.n)?;
        check_len("A rows", a.dim.nrows, self.m)?;
        check_update("P", p_changed, &maps.p_to_kkt, p.nnz())?;
        check_update("A", a_changed, &maps.a_to_kkt, a.nnz())?;

        update_kkt_p(kkt, p, p_changed, &maps.p_to_kkt, self.sigma)?;
        update_kkt_a(kkt, a, a_changed, &maps.a_to_kkt)?;
        self.refactor()
    }

    fn update_rho(&mut self, rho: Rho<'_>) -> LinsysResult<()> {
        let SolverMode::Admm { kkt, maps } = &mut self.mode else {
            return Err(LinsysError::UpdateUnavailable("update_rho"));
        };
        let rho_inv = match rho {
            Rho::Scalar(r) => {
                check_rho(r)?;
                DualRegularization::from_rho(r)
            }
            Rho::PerConstraint(rho) => {
                check_len("rho_vec", rho.len(), self.m)?;
                rho.iter().try_for_each(|&r| check_rho(r))?;
                DualRegularization::from_rho_vec(rho)
            }
        };
        update_kkt_rho(kkt, &rho_inv, &maps.rho_to_kkt)?;
        self.rho_inv = rho_inv;
        self.refactor()
    }

    fn update_settings(&mut self, _settings: &LinsysSettings) -> LinsysResult<()> {
        // nothing in the factorization depends on the remaining settings
        Ok(())
    }

    fn warm_start(&mut self, _x: &[f64]) -> LinsysResult<()> {
        // direct solver, no iterate to seed
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinsysStatus;
    use crate::solver::kkt::KktError;

    const SIGMA: f64 = 1e-6;

    fn settings() -> LinsysSettings {
        LinsysSettings {
            sigma: SIGMA,
            rho: 0.1,
            ..Default::default()
        }
    }

    /// P = diag(2, 2), A = [1 1]
    fn diag_problem() -> (CscMatrix, CscMatrix) {
        let p = CscMatrix::diagonal(&[2.0, 2.0]);
        let a = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0]).unwrap();
        (p, a)
    }

    fn kkt_matvec(p: &CscMatrix, a: &CscMatrix, lower: &[f64], x: &[f64]) -> Vec<f64> {
        let (n, m) = (p.dim.ncols, a.dim.nrows);
        let mut y = vec![0.0; n + m];
        p.symmetric_upper_matvec(&x[..n], &mut y[..n]);
        for i in 0..n {
            y[i] += SIGMA * x[i];
        }
        let mut ax = vec![0.0; m];
        a.matvec(&x[..n], &mut ax);
        for j in 0..n {
            let (rows, vals) = a.col(j);
            for (&i, &v) in rows.iter().zip(vals.iter()) {
                y[j] += v * x[n + i];
            }
        }
        for i in 0..m {
            y[n + i] = ax[i] - lower[i] * x[n + i];
        }
        y
    }

    #[test]
    fn reports_its_identity() {
        let (p, a) = diag_problem();
        let solver = QdldlSolver::new(&p, &a, None, &settings(), false).unwrap();
        assert_eq!(solver.name(), "QDLDL");
        assert_eq!(solver.kind(), SolverKind::Direct);
        assert_eq!(solver.nthreads(), 1);
        assert!(!solver.is_polishing());
    }

    #[test]
    fn polish_solve_returns_raw_kkt_solution() {
        let (p, a) = diag_problem();
        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), true).unwrap();
        assert!(solver.is_polishing());
        assert!(solver.kkt().is_none());

        let rhs = [1.0, 1.0, 0.0];
        let mut b = rhs;
        solver.solve(&mut b, 0).unwrap();

        let residual = kkt_matvec(&p, &a, &[SIGMA], &b);
        for (r, f) in residual.iter().zip(rhs.iter()) {
            assert!((r - f).abs() < 1e-8);
        }
    }

    #[test]
    fn admm_solve_reconstructs_z() {
        let (p, a) = diag_problem();
        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), false).unwrap();

        let rhs = [1.0, 1.0, 0.5];
        let mut b = rhs;
        solver.solve(&mut b, 3).unwrap();

        // recover ν from z̃ = b_z + ρ⁻¹ ν and check the raw KKT system
        let nu = (b[2] - rhs[2]) / 10.0;
        let raw = [b[0], b[1], nu];
        let residual = kkt_matvec(&p, &a, &[10.0], &raw);
        for (r, f) in residual.iter().zip(rhs.iter()) {
            assert!((r - f).abs() < 1e-8);
        }
        // z̃ = A x̃ by the second block row
        assert!((b[2] - (b[0] + b[1])).abs() < 1e-8);
    }

    #[test]
    fn polish_solver_cannot_be_updated() {
        let (p, a) = diag_problem();
        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), true).unwrap();
        let err = solver.update_rho(Rho::Scalar(1.0)).unwrap_err();
        assert!(matches!(err, LinsysError::UpdateUnavailable("update_rho")));
        assert!(matches!(
            solver.update_matrices(&p, None, &a, None),
            Err(LinsysError::UpdateUnavailable("update_matrices"))
        ));
    }

    #[test]
    fn rejected_update_leaves_kkt_untouched() {
        let (p, a) = diag_problem();
        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), false).unwrap();
        let before = solver.kkt().unwrap().clone();
        let d_before = solver.numeric().d.clone();

        // P is valid, A lists a nonzero it does not have
        let p_new = CscMatrix::diagonal(&[7.0, 7.0]);
        let out_of_range: &[usize] = &[5];
        let err = solver
            .update_matrices(&p_new, None, &a, Some(out_of_range))
            .unwrap_err();
        assert!(matches!(
            err,
            LinsysError::Kkt(KktError::ChangedIndex {
                matrix: "A",
                index: 5,
                nnz: 2
            })
        ));
        assert_eq!(solver.kkt(), Some(&before));
        assert_eq!(solver.numeric().d, d_before);

        // a later ρ update refactors the old P, not a half-written one
        solver.update_rho(Rho::Scalar(0.1)).unwrap();
        assert_eq!(solver.kkt(), Some(&before));
        assert_eq!(solver.numeric().d, d_before);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let (p, a) = diag_problem();
        let too_long: &[f64] = &[0.1, 0.1];
        let err = QdldlSolver::new(&p, &a, Some(too_long), &settings(), false).unwrap_err();
        assert!(matches!(
            err,
            LinsysError::DimensionMismatch {
                what: "rho_vec",
                expected: 1,
                actual: 2
            }
        ));

        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), false).unwrap();
        let mut short = [1.0, 2.0];
        assert!(matches!(
            solver.solve(&mut short, 0),
            Err(LinsysError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn non_positive_rho_is_a_settings_error() {
        let (p, a) = diag_problem();
        let mut solver = QdldlSolver::new(&p, &a, None, &settings(), false).unwrap();
        let err = solver.update_rho(Rho::Scalar(0.0)).unwrap_err();
        assert_eq!(err.status(), LinsysStatus::InitError);
        // failed validation leaves the factor untouched
        assert_eq!(solver.rho_inv(), &DualRegularization::Scalar(10.0));
    }

    #[test]
    fn scalar_rho_replaces_per_constraint() {
        let (p, a) = diag_problem();
        let rho: &[f64] = &[0.5];
        let mut solver = QdldlSolver::new(&p, &a, Some(rho), &settings(), false).unwrap();
        assert_eq!(solver.rho_inv(), &DualRegularization::PerConstraint(vec![2.0]));

        solver.update_rho(Rho::Scalar(0.25)).unwrap();
        assert_eq!(solver.rho_inv(), &DualRegularization::Scalar(4.0));
        let kkt = solver.kkt().unwrap();
        let slot = solver.maps().unwrap().rho_to_kkt[0];
        assert_eq!(kkt.values[slot], -4.0);
    }
}
