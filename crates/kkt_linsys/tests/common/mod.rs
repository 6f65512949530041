#![allow(dead_code)]

use kkt_linsys::solver::matrix::builder::MatrixBuilder;
use kkt_linsys::solver::matrix::csc::CscMatrix;

/// xorshift64, enough randomness for test problems
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// uniform in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Random convex QP data: P (upper triangle, diagonally dominant) and A
/// with at least one entry per row.
pub fn random_qp(n: usize, m: usize, density: f64, seed: u64) -> (CscMatrix, CscMatrix) {
    let mut rng = XorShift::new(seed);

    let mut p = MatrixBuilder::new(n, n);
    let mut row_sums = vec![0.0; n];
    for j in 0..n {
        for i in 0..j {
            if rng.next_f64() < density {
                let v = rng.next_f64() - 0.5;
                p.push(j, i, v).unwrap();
                row_sums[i] += v.abs();
                row_sums[j] += v.abs();
            }
        }
    }
    for (j, sum) in row_sums.iter().enumerate() {
        p.push(j, j, sum + 1.0).unwrap();
    }

    let mut a = MatrixBuilder::new(m, n);
    for i in 0..m {
        let j = (rng.next_u64() as usize) % n;
        a.push(j, i, 1.0 + rng.next_f64()).unwrap();
        for j in 0..n {
            if rng.next_f64() < density {
                a.push(j, i, rng.next_f64() - 0.5).unwrap();
            }
        }
    }

    (p.build_csc().unwrap(), a.build_csc().unwrap())
}

pub fn rhs(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = XorShift::new(seed);
    (0..len).map(|_| 2.0 * rng.next_f64() - 1.0).collect()
}

/// y = [P + σI, Aᵗ; A, -diag(lower)] x
pub fn kkt_matvec(p: &CscMatrix, a: &CscMatrix, sigma: f64, lower: &[f64], x: &[f64]) -> Vec<f64> {
    let (n, m) = (p.dim.ncols, a.dim.nrows);
    let mut y = vec![0.0; n + m];
    p.symmetric_upper_matvec(&x[..n], &mut y[..n]);
    for i in 0..n {
        y[i] += sigma * x[i];
    }
    for j in 0..n {
        let (rows, vals) = a.col(j);
        for (&i, &v) in rows.iter().zip(vals.iter()) {
            y[j] += v * x[n + i];
            y[n + i] += v * x[j];
        }
    }
    for i in 0..m {
        y[n + i] -= lower[i] * x[n + i];
    }
    y
}

/// Turn the ADMM output (x̃, z̃) back into the raw KKT solution (x, ν).
pub fn raw_solution(out: &[f64], b: &[f64], n: usize, rho_inv: &[f64]) -> Vec<f64> {
    let mut x = out.to_vec();
    for (j, r) in rho_inv.iter().enumerate() {
        x[n + j] = (out[n + j] - b[n + j]) / r;
    }
    x
}

pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
