//! Damped Newton iteration on the collocation system.
//!
//! A plain Newton step with a backtracking line search, judged by the
//! affine-invariant criterion Φ = ‖J⁻¹r‖² for the most recently factored J.
//! After a full step the factorization (and the step already computed with
//! it) is reused, so cheap fixed-Jacobian iterations alternate with full
//! ones.

use faer::prelude::Solve;
use faer::sparse::SparseColMatRef;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::{Col, Mat};

use crate::collocation::{self, Evaluation};
use crate::field::Field;
use crate::problem::BvpProblem;
use crate::solver::jacobian::{self, JacobianPattern};
use crate::solver::Layout;

/// Maximum number of Jacobian evaluations/factorizations per Newton call. A
/// small value is recommended in the BVP literature.
const MAX_NJEV: usize = 4;
/// Maximum iterations, counting the fixed-Jacobian ones.
const MAX_ITER: usize = 8;
/// Armijo constant: minimum relative improvement of Φ to accept a step.
const SIGMA: f64 = 0.2;
/// Backtracking step-size factor.
const TAU: f64 = 0.5;
/// Backtracking budget; the smallest step tried is TAU^N_TRIAL.
const N_TRIAL: usize = 4;

/// The committed iterate a Newton call hands back.
pub(crate) struct NewtonState {
    pub y: Mat<f64>,
    pub qa: Vec<f64>,
    pub p: Vec<f64>,
    /// Collocation evaluation at (y, qa, p).
    pub eval: Evaluation,
    /// True if the LU factorization declared the Jacobian singular.
    pub singular: bool,
}

struct Trial {
    alpha: f64,
    y: Mat<f64>,
    qa: Vec<f64>,
    p: Vec<f64>,
    eval: Evaluation,
    res: Vec<f64>,
    step: Vec<f64>,
    cost: f64,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn solve_collocation<P: BvpProblem>(
    field: &Field<'_, P>,
    layout: Layout,
    pattern: &JacobianPattern,
    x: &[f64],
    h: &[f64],
    x_mid: &[f64],
    mut y: Mat<f64>,
    mut qa: Vec<f64>,
    mut p: Vec<f64>,
    bvp_tol: f64,
) -> NewtonState {
    let Layout { n, m, .. } = layout;

    // Solution residuals at the midpoints relate to collocation residuals by
    // r_middle = 1.5·col_res/h, and the driver wants relative residuals 1.5
    // orders below the BVP tolerance. Rewriting that as a bound on col_res:
    let tol_r: Vec<f64> = h.iter().map(|hj| 2.0 / 3.0 * hj * 5e-2 * bvp_tol).collect();
    // Boundary residuals shrink fast once the iteration settles; the same
    // 1.5-orders-below margin is enough.
    let tol_bc = 5e-2 * bvp_tol;

    let mut eval = collocation::evaluate(field, x, h, x_mid, y.as_ref(), &qa, &p);
    let mut res = eval.stacked_residuals();

    // One symbolic analysis serves every factorization on this mesh. Its
    // failure counts as a singular system, like a numeric breakdown.
    let lu_symbolic = match SymbolicLu::try_new(pattern.symbolic().as_ref()) {
        Ok(symbolic) => symbolic,
        Err(_) => {
            return NewtonState {
                y,
                qa,
                p,
                eval,
                singular: true,
            };
        }
    };

    let mut vals = vec![0.0; pattern.nnz()];
    let mut factorization: Option<Lu<usize, f64>> = None;
    let mut step: Vec<f64> = Vec::new();
    let mut cost = 0.0;
    let mut njev = 0usize;
    let mut singular = false;
    let mut recompute_jac = true;

    for _iteration in 0..MAX_ITER {
        if recompute_jac {
            let jacs =
                jacobian::system_jacobians(field, layout, x, x_mid, &eval, y.as_ref(), &p);
            jacobian::fill_values(layout, h, &jacs, pattern, &mut vals);
            njev += 1;

            let matrix = SparseColMatRef::new(pattern.symbolic().as_ref(), &vals);
            let factored = match Lu::try_new_with_symbolic(lu_symbolic.clone(), matrix) {
                Ok(factored) => factored,
                Err(_) => {
                    singular = true;
                    break;
                }
            };
            step = solve_with(&factored, &res);
            if !step.iter().all(|v| v.is_finite()) {
                singular = true;
                break;
            }
            cost = dot(&step, &step);
            factorization = Some(factored);
        }
        let Some(factored) = factorization.as_ref() else {
            break;
        };

        // Backtrack from the full step; every trial restarts from the
        // current iterate. The last trial is committed even when the Armijo
        // test never passes.
        let mut alpha = 1.0;
        let mut last_trial: Option<Trial> = None;
        for trial in 0..=N_TRIAL {
            let mut y_new = Mat::from_fn(n, m, |i, j| y[(i, j)] - alpha * step[j * n + i]);
            if let Some(proj) = field.projectors() {
                project_left_endpoint(&proj.b, &mut y_new);
            }
            let qa_new: Vec<f64> = qa
                .iter()
                .enumerate()
                .map(|(i, q)| q - alpha * step[n * m + i])
                .collect();
            let p_new: Vec<f64> = p
                .iter()
                .enumerate()
                .map(|(i, pv)| pv - alpha * step[n * m + layout.nq + i])
                .collect();

            let eval_new =
                collocation::evaluate(field, x, h, x_mid, y_new.as_ref(), &qa_new, &p_new);
            let res_new = eval_new.stacked_residuals();
            let step_new = solve_with(factored, &res_new);
            let cost_new = dot(&step_new, &step_new);

            let accepted = cost_new < (1.0 - 2.0 * alpha * SIGMA) * cost;
            last_trial = Some(Trial {
                alpha,
                y: y_new,
                qa: qa_new,
                p: p_new,
                eval: eval_new,
                res: res_new,
                step: step_new,
                cost: cost_new,
            });
            if accepted {
                break;
            }
            if trial < N_TRIAL {
                alpha *= TAU;
            }
        }
        let Some(trial) = last_trial else {
            break;
        };
        y = trial.y;
        qa = trial.qa;
        p = trial.p;
        eval = trial.eval;
        res = trial.res;

        if njev == MAX_NJEV {
            break;
        }

        if converged(&eval, &tol_r, tol_bc) {
            break;
        }

        if trial.alpha == 1.0 {
            // Full step taken: keep the factorization, and the step just
            // solved against it already belongs to the committed iterate.
            step = trial.step;
            cost = trial.cost;
            recompute_jac = false;
        } else {
            recompute_jac = true;
        }
    }

    NewtonState {
        y,
        qa,
        p,
        eval,
        singular,
    }
}

fn converged(eval: &Evaluation, tol_r: &[f64], tol_bc: f64) -> bool {
    let n = eval.col_res.nrows();
    for (j, &tr) in tol_r.iter().enumerate() {
        for i in 0..n {
            if libm::fabs(eval.col_res[(i, j)]) >= tr * (1.0 + libm::fabs(eval.f_mid[(i, j)])) {
                return false;
            }
        }
    }
    eval.bc_res.iter().all(|r| libm::fabs(*r) < tol_bc)
}

fn project_left_endpoint(b: &Mat<f64>, y: &mut Mat<f64>) {
    let n = y.nrows();
    let col: Vec<f64> = (0..n).map(|i| y[(i, 0)]).collect();
    for i in 0..n {
        let mut acc = 0.0;
        for (j, cj) in col.iter().enumerate() {
            acc += b[(i, j)] * cj;
        }
        y[(i, 0)] = acc;
    }
}

fn solve_with(factored: &Lu<usize, f64>, res: &[f64]) -> Vec<f64> {
    let rhs = Col::from_fn(res.len(), |i| res[i]);
    factored.solve(&rhs).iter().copied().collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
