use crate::solver::ldl::{LdlError, LdlResult, LdlSymbolic};
use crate::solver::matrix::csc::CscMatrix;

/// Elimination tree and column counts of L for the upper-triangular `a`.
///
/// Walks each column's entries up the partially built tree, counting one
/// nonzero of L per visited node. `work[i] == j` marks nodes already seen
/// while processing column `j`.
pub fn analyze(a: &CscMatrix) -> LdlResult<LdlSymbolic> {
    if !a.is_square() {
        return Err(LdlError::NonSquare {
            nrows: a.dim.nrows,
            ncols: a.dim.ncols,
        });
    }
    let n = a.dim.ncols;

    let mut etree: Vec<Option<usize>> = vec![None; n];
    let mut lnz = vec![0usize; n];
    let mut work = vec![0usize; n];

    for j in 0..n {
        work[j] = j;
        if a.col_start(j) == a.col_end(j) {
            return Err(LdlError::EmptyColumn { column: j });
        }
        for &row in a.col(j).0 {
            if row > j {
                return Err(LdlError::NotUpperTriangular { column: j, row });
            }
            let mut i = row;
            while work[i] != j {
                if etree[i].is_none() {
                    etree[i] = Some(j);
                }
                lnz[i] += 1;
                work[i] = j;
                // i < j always has a parent at this point
                i = etree[i].unwrap_or(j);
            }
        }
    }

    let total_lnz = lnz
        .iter()
        .try_fold(0usize, |acc, &c| acc.checked_add(c))
        .ok_or(LdlError::NonzeroCountOverflow)?;

    Ok(LdlSymbolic {
        n,
        etree,
        lnz,
        total_lnz,
    })
}
