#[derive(Debug, thiserror::Error)]
pub enum LdlError {
    // --- Structure ---
    #[error("LDL factorization needs a square matrix (nrows={nrows}, ncols={ncols})")]
    NonSquare { nrows: usize, ncols: usize },

    #[error("matrix is not upper triangular: entry at column {column}, row {row}")]
    NotUpperTriangular { column: usize, row: usize },

    #[error("column {column} has no stored entries")]
    EmptyColumn { column: usize },

    #[error("nonzero count of L overflows the index type")]
    NonzeroCountOverflow,

    #[error("symbolic analysis is for dimension {expected}, matrix has dimension {actual}")]
    SymbolicMismatch { expected: usize, actual: usize },

    // --- Numeric ---
    #[error("zero pivot in column {column}")]
    ZeroPivot { column: usize },
}

pub type LdlResult<T> = Result<T, LdlError>;
