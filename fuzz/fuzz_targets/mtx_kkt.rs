#![no_main]

use kkt_linsys::linsys::init_linsys_solver;
use kkt_linsys::settings::LinsysSettings;
use kkt_linsys::solver::matrix::csc::CscMatrix;
use kkt_linsys::solver::matrix::mtx::load_matrix_market_csc_from_reader;
use libfuzzer_sys::fuzz_target;

// P is read from the input, A is the identity
fuzz_target!(|data: &[u8]| {
    let Ok(p) = load_matrix_market_csc_from_reader(std::io::Cursor::new(data)) else {
        return;
    };
    if !p.is_square() || p.dim.ncols > 256 {
        return;
    }
    let n = p.dim.ncols;
    let p = p.upper_triangle();
    let a = CscMatrix::diagonal(&vec![1.0; n]);
    if let Ok(mut solver) = init_linsys_solver(&p, &a, None, &LinsysSettings::default(), false) {
        let mut b = vec![1.0; 2 * n];
        let _ = solver.solve(&mut b, 0);
    }
});
