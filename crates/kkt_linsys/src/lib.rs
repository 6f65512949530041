//! Sparse quasi-definite KKT linear-system solver for ADMM-based QP solvers.
//!
//! The KKT matrix of a QP with cost `½ xᵀPx + qᵀx` and constraints
//! `l ≤ Ax ≤ u` is assembled, permuted by a fill-reducing ordering and
//! factored as `L D Lᵀ`. The factor is reused for every ADMM iteration and
//! refactored in place when ρ or the values of P and A change.
//!
//! ```no_run
//! use kkt_linsys::linsys::{LinearSystemSolver, init_linsys_solver};
//! use kkt_linsys::settings::LinsysSettings;
//! use kkt_linsys::solver::matrix::csc::CscMatrix;
//!
//! let p = CscMatrix::diagonal(&[2.0, 2.0]);
//! let a = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0])?;
//! let mut solver = init_linsys_solver(&p, &a, None, &LinsysSettings::default(), false)?;
//! let mut b = vec![1.0, 1.0, 0.0];
//! solver.solve(&mut b, 0)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod linsys;
pub mod settings;
pub mod solver;

pub use error::{LinsysError, LinsysResult, LinsysStatus};
