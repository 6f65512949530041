use super::*;
use crate::solver::matrix::builder::MatrixBuilder;
use ndarray::Array2;
use rstest::rstest;

fn upper(n: usize, entries: &[(usize, usize, f64)]) -> CscMatrix {
    let mut b = MatrixBuilder::new(n, n);
    for &(row, col, v) in entries {
        b.push(col, row, v).unwrap();
    }
    b.build_csc().unwrap()
}

/// [ P + σI   Aᵗ ]
/// [ A      -1/ρ ]  with P = [4 1; 1 2], A = [1 1], σ = 1e-6, ρ = 0.1
fn small_kkt() -> CscMatrix {
    upper(
        3,
        &[
            (0, 0, 4.0 + 1e-6),
            (0, 1, 1.0),
            (1, 1, 2.0 + 1e-6),
            (0, 2, 1.0),
            (1, 2, 1.0),
            (2, 2, -10.0),
        ],
    )
}

/// upper triangle of an arrow matrix with the dense row first
fn arrow_first(n: usize) -> CscMatrix {
    let mut entries = vec![(0, 0, n as f64 + 1.0)];
    for j in 1..n {
        entries.push((0, j, 1.0));
        entries.push((j, j, 2.0));
    }
    upper(n, &entries)
}

fn reconstruct(numeric: &LdlNumeric) -> Array2<f64> {
    let n = numeric.n();
    let mut l = numeric.l.to_dense();
    for i in 0..n {
        l[[i, i]] = 1.0;
    }
    let d = Array2::from_diag(&ndarray::Array1::from(numeric.d.clone()));
    l.dot(&d).dot(&l.t())
}

fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
    assert_eq!(a.dim(), b.dim());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() <= tol, "{x} != {y}");
    }
}

#[test]
fn elimination_tree_of_arrow() {
    let symbolic = analyze(&arrow_first(4)).unwrap();
    insta::assert_debug_snapshot!("arrow_first_symbolic", symbolic);
}

#[test]
fn diagonal_matrix_has_no_fill() {
    let a = CscMatrix::diagonal(&[1.0, -2.0, 3.0]);
    let symbolic = analyze(&a).unwrap();
    assert_eq!(symbolic.etree, vec![None, None, None]);
    assert_eq!(symbolic.total_lnz, 0);

    let numeric = factor(&a, &symbolic).unwrap();
    assert_eq!(numeric.d, vec![1.0, -2.0, 3.0]);
    assert_eq!(numeric.d_inv, vec![1.0, -0.5, 1.0 / 3.0]);
    assert_eq!(numeric.positive_pivots, 2);
}

#[test]
fn rejects_lower_triangular_entries() {
    let a = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1.0, 0.5, 1.0]).unwrap();
    assert!(matches!(
        analyze(&a),
        Err(LdlError::NotUpperTriangular { column: 0, row: 1 })
    ));
}

#[test]
fn rejects_empty_columns_and_non_square() {
    let a = CscMatrix::new(2, 2, vec![0, 1, 1], vec![0], vec![1.0]).unwrap();
    assert!(matches!(analyze(&a), Err(LdlError::EmptyColumn { column: 1 })));

    let b = CscMatrix::empty(2, 3);
    assert!(matches!(
        analyze(&b),
        Err(LdlError::NonSquare { nrows: 2, ncols: 3 })
    ));
}

#[test]
fn quasi_definite_factor_reconstructs() {
    let a = small_kkt();
    let symbolic = analyze(&a).unwrap();
    let numeric = factor(&a, &symbolic).unwrap();

    assert_eq!(numeric.positive_pivots, 2);
    assert!(numeric.d[2] < 0.0);
    assert_close(&reconstruct(&numeric), &a.to_dense_symmetric(), 1e-12);
}

#[rstest]
#[case(3)]
#[case(6)]
#[case(11)]
fn arrow_fill_is_complete(#[case] n: usize) {
    let a = arrow_first(n);
    let symbolic = analyze(&a).unwrap();
    assert_eq!(symbolic.total_lnz, n * (n - 1) / 2);

    let numeric = factor(&a, &symbolic).unwrap();
    assert_eq!(numeric.positive_pivots, n);
    assert_close(&reconstruct(&numeric), &a.to_dense_symmetric(), 1e-10);
}

#[test]
fn zero_pivot_is_reported() {
    // [0 1; 1 0] needs pivoting, which LDLᵀ without pivoting cannot do
    let a = upper(2, &[(0, 0, 0.0), (0, 1, 1.0), (1, 1, 0.0)]);
    let symbolic = analyze(&a).unwrap();
    assert!(matches!(
        factor(&a, &symbolic),
        Err(LdlError::ZeroPivot { column: 0 })
    ));
}

#[test]
fn solve_matches_dense_product() {
    let a = small_kkt();
    let symbolic = analyze(&a).unwrap();
    let numeric = factor(&a, &symbolic).unwrap();

    let b = [1.0, -2.0, 0.5];
    let mut x = b;
    solve(&numeric, &mut x);

    let mut ax = [0.0; 3];
    a.symmetric_upper_matvec(&x, &mut ax);
    for (lhs, rhs) in ax.iter().zip(b.iter()) {
        assert!((lhs - rhs).abs() < 1e-12);
    }
}

#[test]
fn refactor_reuses_pattern() {
    let mut a = arrow_first(5);
    let symbolic = analyze(&a).unwrap();
    let mut numeric = factor(&a, &symbolic).unwrap();
    let pattern = numeric.l.row_indices.clone();

    for v in a.values.iter_mut() {
        *v *= 3.0;
    }
    refactor(&a, &symbolic, &mut numeric).unwrap();
    let fresh = factor(&a, &symbolic).unwrap();

    assert_eq!(numeric.l.row_indices, pattern);
    assert_eq!(numeric.l.values, fresh.l.values);
    assert_eq!(numeric.d, fresh.d);
    assert_eq!(numeric.positive_pivots, fresh.positive_pivots);
}

#[test]
fn refactor_after_zero_pivot_recovers() {
    let mut a = upper(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 2.0)]);
    let symbolic = analyze(&a).unwrap();
    let mut numeric = factor(&a, &symbolic).unwrap();

    // d[1] = 1 - 1 = 0
    a.values[2] = 1.0;
    assert!(matches!(
        refactor(&a, &symbolic, &mut numeric),
        Err(LdlError::ZeroPivot { column: 1 })
    ));

    a.values[2] = 5.0;
    refactor(&a, &symbolic, &mut numeric).unwrap();
    assert_eq!(numeric.d, vec![1.0, 4.0]);
    assert_eq!(numeric.l.values, vec![1.0]);
}

#[test]
fn refactor_rejects_other_dimensions() {
    let a = arrow_first(4);
    let symbolic = analyze(&a).unwrap();
    let mut numeric = factor(&a, &symbolic).unwrap();
    let other = arrow_first(5);
    assert!(matches!(
        refactor(&other, &symbolic, &mut numeric),
        Err(LdlError::SymbolicMismatch {
            expected: 4,
            actual: 5
        })
    ));
}
