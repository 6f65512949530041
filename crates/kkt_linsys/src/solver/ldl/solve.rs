use crate::solver::ldl::LdlNumeric;

/// Solve `L D Lᵀ x = b` in place, `x` holds `b` on entry.
pub fn solve(numeric: &LdlNumeric, x: &mut [f64]) {
    debug_assert_eq!(x.len(), numeric.n());
    lsolve(numeric, x);
    for (xi, &di) in x.iter_mut().zip(numeric.d_inv.iter()) {
        *xi *= di;
    }
    ltsolve(numeric, x);
}

/// x := L⁻¹ x
fn lsolve(numeric: &LdlNumeric, x: &mut [f64]) {
    let l = &numeric.l;
    for i in 0..x.len() {
        let xi = x[i];
        for p in l.col_start(i)..l.col_end(i) {
            x[l.row_index(p)] -= l.value(p) * xi;
        }
    }
}

/// x := L⁻ᵀ x
fn ltsolve(numeric: &LdlNumeric, x: &mut [f64]) {
    let l = &numeric.l;
    for i in (0..x.len()).rev() {
        let mut xi = x[i];
        for p in l.col_start(i)..l.col_end(i) {
            xi -= l.value(p) * x[l.row_index(p)];
        }
        x[i] = xi;
    }
}
