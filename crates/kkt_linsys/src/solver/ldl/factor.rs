use crate::solver::ldl::{LdlError, LdlNumeric, LdlResult, LdlSymbolic, LdlWorkspace, Marker};
use crate::solver::matrix::csc::CscMatrix;

/// Numeric LDLᵀ factorization of the upper-triangular `a`.
///
/// Allocates L from the column counts in `symbolic`, then runs the kernel.
pub fn factor(a: &CscMatrix, symbolic: &LdlSymbolic) -> LdlResult<LdlNumeric> {
    check_dimensions(a, symbolic)?;
    let n = symbolic.n;

    let mut column_pointers = vec![0usize; n + 1];
    for i in 0..n {
        column_pointers[i + 1] = column_pointers[i] + symbolic.lnz[i];
    }
    let l = CscMatrix {
        dim: a.dim.clone(),
        column_pointers,
        row_indices: vec![0; symbolic.total_lnz],
        values: vec![0.0; symbolic.total_lnz],
    };

    let mut numeric = LdlNumeric {
        l,
        d: vec![0.0; n],
        d_inv: vec![0.0; n],
        positive_pivots: 0,
        work: LdlWorkspace::new(n),
    };
    factor_kernel(a, symbolic, &mut numeric)?;
    Ok(numeric)
}

/// Refactor with new values on the pattern `numeric` was built for.
///
/// On error the factor is left partially overwritten; it becomes usable
/// again after the next successful refactor.
pub fn refactor(a: &CscMatrix, symbolic: &LdlSymbolic, numeric: &mut LdlNumeric) -> LdlResult<()> {
    check_dimensions(a, symbolic)?;
    if numeric.n() != symbolic.n || numeric.l.nnz() != symbolic.total_lnz {
        return Err(LdlError::SymbolicMismatch {
            expected: symbolic.n,
            actual: numeric.n(),
        });
    }
    factor_kernel(a, symbolic, numeric)
}

fn check_dimensions(a: &CscMatrix, symbolic: &LdlSymbolic) -> LdlResult<()> {
    if !a.is_square() {
        return Err(LdlError::NonSquare {
            nrows: a.dim.nrows,
            ncols: a.dim.ncols,
        });
    }
    if a.dim.ncols != symbolic.n {
        return Err(LdlError::SymbolicMismatch {
            expected: symbolic.n,
            actual: a.dim.ncols,
        });
    }
    Ok(())
}

/// Up-looking factorization: row k of L is the solution of a sparse
/// triangular system whose pattern is the union of the etree paths from
/// the entries of column k of `a`.
fn factor_kernel(a: &CscMatrix, symbolic: &LdlSymbolic, numeric: &mut LdlNumeric) -> LdlResult<()> {
    let n = symbolic.n;
    let etree = &symbolic.etree;
    let LdlNumeric {
        l,
        d,
        d_inv,
        positive_pivots,
        work,
    } = numeric;
    let LdlWorkspace {
        markers,
        y_idx,
        elim_buffer,
        next_in_col,
        y_vals,
    } = work;

    markers.fill(Marker::Unused);
    y_vals.fill(0.0);
    next_in_col.copy_from_slice(&l.column_pointers[..n]);
    *positive_pivots = 0;

    for k in 0..n {
        d[k] = 0.0;

        // pattern of row k of L
        let mut nnz_y = 0usize;
        for p in a.col_start(k)..a.col_end(k) {
            let bidx = a.row_index(p);
            if bidx == k {
                d[k] = a.value(p);
                continue;
            }
            y_vals[bidx] = a.value(p);

            if markers[bidx] == Marker::Used {
                continue;
            }
            markers[bidx] = Marker::Used;
            elim_buffer[0] = bidx;
            let mut nnz_e = 1usize;
            let mut next = etree[bidx];
            while let Some(i) = next {
                if i >= k || markers[i] == Marker::Used {
                    break;
                }
                markers[i] = Marker::Used;
                elim_buffer[nnz_e] = i;
                nnz_e += 1;
                next = etree[i];
            }
            // push the path in reverse so y_idx stays topologically ordered
            while nnz_e > 0 {
                nnz_e -= 1;
                y_idx[nnz_y] = elim_buffer[nnz_e];
                nnz_y += 1;
            }
        }

        // values of row k of L and the pivot d[k]
        for &cidx in y_idx[..nnz_y].iter().rev() {
            let slot = next_in_col[cidx];
            let y_cidx = y_vals[cidx];
            for j in l.column_pointers[cidx]..slot {
                y_vals[l.row_indices[j]] -= l.values[j] * y_cidx;
            }
            l.row_indices[slot] = k;
            l.values[slot] = y_cidx * d_inv[cidx];
            d[k] -= y_cidx * l.values[slot];
            next_in_col[cidx] += 1;

            y_vals[cidx] = 0.0;
            markers[cidx] = Marker::Unused;
        }

        if d[k] == 0.0 {
            return Err(LdlError::ZeroPivot { column: k });
        }
        if d[k] > 0.0 {
            *positive_pivots += 1;
        }
        d_inv[k] = 1.0 / d[k];
    }

    Ok(())
}
