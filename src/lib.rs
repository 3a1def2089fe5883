#![doc = include_str!("../README.md")]

use faer::MatRef;

pub use crate::error::Error;
pub use crate::problem::{BoundaryJacobian, BvpProblem, RhsJacobian};
pub use crate::solution::{BvpSolution, Status};
pub use crate::solver::{Config, Verbosity};
pub use crate::spline::CubicSpline;
pub use crate::warnings::Warning;

use crate::field::Field;
use crate::solver::jacobian::JacobianPattern;
use crate::solver::{Layout, newton};

/// The Lobatto IIIA collocation residuals.
mod collocation;
mod error;
/// The wrapped vector field (singular-term folding, Jacobian dispatch).
mod field;
mod linalg;
/// Mesh bookkeeping, node insertion, residual estimation.
mod mesh;
mod problem;
mod solution;
/// Numeric core: layout, sparse assembly, damped Newton.
mod solver;
mod spline;
/// Unit tests
#[cfg(test)]
mod tests;
mod warnings;

/// Solve a two-point boundary value problem by fourth-order collocation.
///
/// `x` is the initial mesh (strictly increasing), `y` the n×m initial guess
/// for the states (column j for node j), `q` an optional initial guess for
/// the quadrature states, and `p` the initial guess for the unknown
/// parameters (empty when the problem has none).
///
/// The solver repeats { assemble → damped Newton → residual estimate →
/// refine } until every interval's estimated RMS relative residual is below
/// `config.tol`, the node budget runs out, or a Jacobian comes out
/// singular. Only input mistakes are reported as [`Error`]; the other two
/// terminations return a populated [`BvpSolution`] with the matching
/// [`Status`].
pub fn solve_bvp<P: BvpProblem>(
    problem: &P,
    x: &[f64],
    y: MatRef<'_, f64>,
    q: Option<MatRef<'_, f64>>,
    p: &[f64],
    config: Config,
) -> Result<BvpSolution, Error> {
    let n = problem.ndim();
    let nq = problem.nquads();
    let k = problem.nparams();

    if x.len() < 2 {
        return Err(Error::MeshTooShort(x.len()));
    }
    for (i, w) in x.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(Error::MeshNotIncreasing { index: i + 1 });
        }
    }
    if y.nrows() != n || y.ncols() != x.len() {
        return Err(Error::BadStateGuess {
            rows: n,
            cols: x.len(),
            actual_rows: y.nrows(),
            actual_cols: y.ncols(),
        });
    }
    if let Some(qg) = q {
        if qg.nrows() != nq || qg.ncols() != x.len() {
            return Err(Error::BadQuadGuess {
                rows: nq,
                cols: x.len(),
                actual_rows: qg.nrows(),
                actual_cols: qg.ncols(),
            });
        }
    }
    if p.len() != k {
        return Err(Error::BadParamGuess {
            expected: k,
            actual: p.len(),
        });
    }

    let mut warnings = Vec::new();
    let mut tol = config.tol;
    let tol_floor = 100.0 * f64::EPSILON;
    if tol < tol_floor {
        tracing::warn!(
            requested = tol,
            used = tol_floor,
            "tolerance below 100 machine epsilons, clamping"
        );
        warnings.push(Warning::ToleranceClamped {
            requested: tol,
            used: tol_floor,
        });
        tol = tol_floor;
    }

    let a = x[0];
    let field = Field::new(problem, a)?;

    let mut x = x.to_vec();
    let mut h = mesh::interval_widths(&x);
    let mut y = y.to_owned();
    // The necessary condition S·y(a) = 0 is imposed on the guess up front.
    if let Some(proj) = field.projectors() {
        let col: Vec<f64> = (0..n).map(|i| y[(i, 0)]).collect();
        let mut out = vec![0.0; n];
        linalg::matvec(proj.b.as_ref(), &col, &mut out);
        for (i, v) in out.iter().enumerate() {
            y[(i, 0)] = *v;
        }
    }
    let mut qa: Vec<f64> = match q {
        Some(qg) => (0..nq).map(|i| qg[(i, 0)]).collect(),
        None => vec![0.0; nq],
    };
    let mut p = p.to_vec();

    let mut niter = 0usize;
    let (status, sol, rms, eval) = loop {
        let m = x.len();
        let layout = Layout { n, nq, k, m };
        let x_mid = mesh::midpoints(&x, &h);
        let pattern = JacobianPattern::new(layout)?;

        let state =
            newton::solve_collocation(&field, layout, &pattern, &x, &h, &x_mid, y, qa, p, tol);
        y = state.y;
        qa = state.qa;
        p = state.p;
        let eval = state.eval;
        niter += 1;

        // Midpoint residuals of the spline follow from the collocation
        // residuals; this identity saves an evaluation.
        let r_mid = faer::Mat::from_fn(n, m - 1, |i, j| 1.5 * eval.col_res[(i, j)] / h[j]);
        let sol = CubicSpline::new(&x, &h, y.as_ref(), eval.f.as_ref());
        let rms = mesh::estimate_rms_residuals(&field, &sol, &x, &h, &p, &r_mid, &eval.f_mid);
        let max_rms = rms.iter().copied().fold(0.0, libm::fmax);

        if state.singular {
            break (Status::SingularJacobian, sol, rms, eval);
        }

        let mut insert_one = Vec::new();
        let mut insert_two = Vec::new();
        for (j, &r) in rms.iter().enumerate() {
            if r > tol && r < 100.0 * tol {
                insert_one.push(j);
            } else if r >= 100.0 * tol {
                insert_two.push(j);
            }
        }
        let nodes_added = insert_one.len() + 2 * insert_two.len();

        if m + nodes_added > config.max_nodes {
            if config.verbosity == Verbosity::Iterations {
                tracing::info!(
                    iteration = niter,
                    max_rms,
                    nodes = m,
                    nodes_wanted = nodes_added,
                    "mesh refinement would exceed the node budget"
                );
            }
            break (Status::MaxNodesExceeded, sol, rms, eval);
        }

        if config.verbosity == Verbosity::Iterations {
            tracing::info!(
                iteration = niter,
                max_rms,
                nodes = m,
                nodes_added,
                "collocation iteration"
            );
        }

        if nodes_added > 0 {
            x = mesh::modify_mesh(&x, &insert_one, &insert_two);
            h = mesh::interval_widths(&x);
            y = sol.values(&x);
        } else {
            break (Status::Converged, sol, rms, eval);
        }
    };

    if config.verbosity != Verbosity::Silent {
        let max_rms = rms.iter().copied().fold(0.0, libm::fmax);
        match status {
            Status::Converged => tracing::info!(
                iterations = niter,
                nodes = x.len(),
                max_rms,
                "solved to the requested tolerance"
            ),
            Status::MaxNodesExceeded => tracing::info!(
                iterations = niter,
                nodes = x.len(),
                max_rms,
                "stopped on the mesh-node budget"
            ),
            Status::SingularJacobian => tracing::info!(
                iterations = niter,
                nodes = x.len(),
                max_rms,
                "stopped on a singular Jacobian"
            ),
        }
    }

    Ok(BvpSolution {
        sol,
        p,
        x,
        y,
        q: eval.q,
        yp: eval.f,
        rms_residuals: rms,
        niter,
        status,
        warnings,
    })
}
