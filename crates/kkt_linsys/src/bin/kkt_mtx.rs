use clap::{Parser, ValueEnum};
use kkt_linsys::linsys::{LinearSystemSolver, QdldlSolver};
use kkt_linsys::settings::LinsysSettings;
use kkt_linsys::solver::kkt::{DualRegularization, form_kkt};
use kkt_linsys::solver::matrix::csc::CscMatrix;
use kkt_linsys::solver::matrix::mtx::load_matrix_market_csc_file;
use kkt_linsys::solver::ordering::OrderingMethod;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.3}s")
    } else if secs >= 1e-3 {
        format!("{:.3}ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3}us", secs * 1e6)
    } else {
        format!("{}ns", d.as_nanos())
    }
}

fn print_timing_breakdown(stages: &[(&str, Duration)], total_elapsed: Duration) {
    let total_secs = total_elapsed.as_secs_f64();
    let accounted_secs = stages.iter().map(|(_, d)| d.as_secs_f64()).sum::<f64>();

    println!();
    println!(
        "timing breakdown (accounted {}, total {}):",
        fmt_duration(Duration::from_secs_f64(accounted_secs)),
        fmt_duration(total_elapsed)
    );
    for (name, dur) in stages {
        let pct = if total_secs > 0.0 {
            (dur.as_secs_f64() / total_secs) * 100.0
        } else {
            0.0
        };
        println!("  {name:<22} {:>12} ({pct:>6.2}%)", fmt_duration(*dur));
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderingArg {
    Amd,
    MinimumDegree,
    Natural,
}

impl From<OrderingArg> for OrderingMethod {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Amd => OrderingMethod::Amd,
            OrderingArg::MinimumDegree => OrderingMethod::MinimumDegree,
            OrderingArg::Natural => OrderingMethod::Natural,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    about = "Builds the QP KKT system from P and A MatrixMarket files, factors it with LDL^T, solves a demo right-hand side and prints fill and residual stats.",
    after_help = "Notes:\n  - P may be stored symmetric or general; only its upper triangle is used.\n  - Set RUST_LOG=debug to see the solver's own diagnostics.",
    version
)]
struct Args {
    /// JSON file with solver settings; command-line flags override it.
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[arg(long)]
    sigma: Option<f64>,

    #[arg(long)]
    rho: Option<f64>,

    #[arg(long, value_enum)]
    ordering: Option<OrderingArg>,

    /// Build a polishing solver (σ on both diagonal blocks, raw KKT solution).
    #[arg(long)]
    polish: bool,

    /// Quadratic cost matrix P (.mtx, n x n)
    #[arg(value_name = "P")]
    p: PathBuf,

    /// Constraint matrix A (.mtx, m x n)
    #[arg(value_name = "A")]
    a: PathBuf,
}

fn load_settings(args: &Args) -> Result<LinsysSettings, Box<dyn std::error::Error>> {
    let mut settings = match &args.settings {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => LinsysSettings::default(),
    };
    if let Some(sigma) = args.sigma {
        settings.sigma = sigma;
    }
    if let Some(rho) = args.rho {
        settings.rho = rho;
    }
    if let Some(ordering) = args.ordering {
        settings.ordering = ordering.into();
    }
    settings.validate()?;
    Ok(settings)
}

fn load(path: &Path, what: &str) -> CscMatrix {
    match load_matrix_market_csc_file(path) {
        Ok(m) => {
            println!(
                "{what}: {} ({} x {}, nnz {})",
                path.display(),
                m.dim.nrows,
                m.dim.ncols,
                m.nnz()
            );
            m
        }
        Err(e) => {
            eprintln!("failed to load {what} from {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn make_demo_rhs(len: usize) -> Vec<f64> {
    let nf = len as f64;
    (0..len).map(|i| 1.0 + ((i + 1) as f64) / nf).collect()
}

fn vec_inf_norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v.abs()).fold(0.0, f64::max)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let total_start = Instant::now();
    let mut stages: Vec<(&str, Duration)> = Vec::new();
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("invalid settings: {e}");
            std::process::exit(1);
        }
    };

    let t = Instant::now();
    let p = load(&args.p, "P").upper_triangle();
    let a = load(&args.a, "A");
    stages.push(("load_matrices", t.elapsed()));

    let (n, m) = (p.dim.ncols, a.dim.nrows);
    let t = Instant::now();
    let mut solver = match QdldlSolver::new(&p, &a, None, &settings, args.polish) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("init failed (status {}): {e}", e.status().code());
            stages.push(("init", t.elapsed()));
            print_timing_breakdown(&stages, total_start.elapsed());
            std::process::exit(2);
        }
    };
    stages.push(("init", t.elapsed()));

    let b = make_demo_rhs(n + m);
    let mut x = b.clone();
    let t = Instant::now();
    if let Err(e) = solver.solve(&mut x, 0) {
        eprintln!("solve failed: {e}");
        std::process::exit(1);
    }
    stages.push(("solve", t.elapsed()));

    // undo the z̃ reconstruction to get the raw KKT solution back
    let lower = if args.polish {
        DualRegularization::Scalar(settings.sigma)
    } else {
        solver.rho_inv().clone()
    };
    if !args.polish {
        for j in 0..m {
            x[n + j] = (x[n + j] - b[n + j]) / lower.get(j);
        }
    }

    let t = Instant::now();
    let residual = match form_kkt(&p, &a, settings.sigma, &lower, false) {
        Ok(assembly) => {
            let mut kx = vec![0.0; n + m];
            assembly.kkt.symmetric_upper_matvec(&x, &mut kx);
            kx.iter()
                .zip(b.iter())
                .map(|(ki, bi)| (bi - ki).abs())
                .fold(0.0, f64::max)
        }
        Err(e) => {
            eprintln!("failed to rebuild KKT for the residual: {e}");
            std::process::exit(1);
        }
    };
    stages.push(("residual", t.elapsed()));

    let symbolic = solver.symbolic();
    let numeric = solver.numeric();
    println!();
    println!(
        "n {} m {} nnz(P) {} nnz(A) {} nnz(L) {} resid {:.5e}",
        n,
        m,
        p.nnz(),
        a.nnz(),
        symbolic.total_lnz,
        residual
    );
    println!(
        "solver: {} ordering={:?} polish={} positive_pivots={}/{}",
        solver.name(),
        settings.ordering,
        args.polish,
        numeric.positive_pivots,
        n + m
    );
    println!(
        "norms: ||b||_inf {:.5e}  ||x||_inf {:.5e}",
        vec_inf_norm(&b),
        vec_inf_norm(&x)
    );
    print_timing_breakdown(&stages, total_start.elapsed());
}
