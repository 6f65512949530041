use crate::solver::kkt::KktError;
use crate::solver::ldl::LdlError;

/// Coarse outcome reported to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LinsysStatus {
    Success = 0,
    /// KKT assembly, ordering or input validation failed
    InitError = 1,
    /// P + σI is not positive definite
    NonConvex = 2,
    /// a zero pivot stopped the numeric factorization
    FactorizationFailed = 3,
}

impl LinsysStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinsysError {
    #[error("error forming and permuting KKT matrix: {0}")]
    Kkt(#[from] KktError),

    #[error("LDL factorization failed: {0}")]
    Ldl(#[from] LdlError),

    #[error("problem is not convex: {positive} positive pivots, expected at least {required}")]
    NonConvex { positive: usize, required: usize },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("{what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} is not available on a polishing solver")]
    UpdateUnavailable(&'static str),
}

pub type LinsysResult<T> = Result<T, LinsysError>;

impl LinsysError {
    pub fn status(&self) -> LinsysStatus {
        match self {
            LinsysError::Ldl(LdlError::ZeroPivot { .. }) => LinsysStatus::FactorizationFailed,
            LinsysError::NonConvex { .. } => LinsysStatus::NonConvex,
            LinsysError::Kkt(_)
            | LinsysError::Ldl(_)
            | LinsysError::Settings(_)
            | LinsysError::DimensionMismatch { .. }
            | LinsysError::UpdateUnavailable(_) => LinsysStatus::InitError,
        }
    }
}

/// Status of a finished call, `Success` for `Ok`.
pub fn status_of<T>(result: &LinsysResult<T>) -> LinsysStatus {
    match result {
        Ok(_) => LinsysStatus::Success,
        Err(e) => e.status(),
    }
}
