//! Forward-difference Jacobian estimates and sparse assembly of the
//! collocation Jacobian.
//!
//! The sparsity pattern depends only on the layout, so it is built once per
//! outer iteration: a pair list in a fixed emission order, the CSC symbolic
//! structure, and a map from emission order to CSC value slot. Refilling the
//! value buffer is then a scatter, with no re-sorting.

use std::collections::HashMap;

use faer::sparse::{Pair, SymbolicSparseColMat};
use faer::{Mat, MatRef};

use crate::collocation::Evaluation;
use crate::error::Error;
use crate::field::Field;
use crate::problem::{BoundaryJacobian, BvpProblem, RhsJacobian};
use crate::solver::Layout;

/// Forward differences of a grid-evaluated function with `rows` outputs per
/// point, with respect to the states and the parameters.
///
/// The step for coordinate v is √ε·(1 + |v|), and the divisor is the step
/// actually taken, (v + h) − v, not the step requested.
pub(crate) fn estimate_grid_jacobian(
    rows: usize,
    k: usize,
    x: &[f64],
    y: MatRef<'_, f64>,
    p: &[f64],
    f0: &Mat<f64>,
    eval: impl Fn(&[f64], MatRef<'_, f64>, &[f64]) -> Mat<f64>,
) -> RhsJacobian {
    let n = y.nrows();
    let m = x.len();
    let sqrt_eps = libm::sqrt(f64::EPSILON);

    let mut df_dy = vec![Mat::zeros(rows, n); m];
    let mut y_pert = y.to_owned();
    let mut steps = vec![0.0; m];
    for i in 0..n {
        for j in 0..m {
            let h = sqrt_eps * (1.0 + libm::fabs(y[(i, j)]));
            y_pert[(i, j)] = y[(i, j)] + h;
            steps[j] = y_pert[(i, j)] - y[(i, j)];
        }
        let f_new = eval(x, y_pert.as_ref(), p);
        for j in 0..m {
            for r in 0..rows {
                df_dy[j][(r, i)] = (f_new[(r, j)] - f0[(r, j)]) / steps[j];
            }
        }
        for j in 0..m {
            y_pert[(i, j)] = y[(i, j)];
        }
    }

    let df_dp = if k == 0 {
        Vec::new()
    } else {
        let mut blocks = vec![Mat::zeros(rows, k); m];
        let mut p_pert = p.to_vec();
        for i in 0..k {
            let h = sqrt_eps * (1.0 + libm::fabs(p[i]));
            p_pert[i] = p[i] + h;
            let step = p_pert[i] - p[i];
            let f_new = eval(x, y, &p_pert);
            for j in 0..m {
                for r in 0..rows {
                    blocks[j][(r, i)] = (f_new[(r, j)] - f0[(r, j)]) / step;
                }
            }
            p_pert[i] = p[i];
        }
        blocks
    };

    RhsJacobian { df_dy, df_dp }
}

/// Forward differences of the boundary residuals with respect to each of
/// their five argument groups.
pub(crate) fn estimate_boundary_jacobian<P: BvpProblem>(
    problem: &P,
    ya: &[f64],
    qa: &[f64],
    yb: &[f64],
    qb: &[f64],
    p: &[f64],
    bc0: &[f64],
) -> BoundaryJacobian {
    let nbc = bc0.len();

    let dbc_dya = columnwise_diff(ya, nbc, bc0, |pert| {
        let mut out = vec![0.0; nbc];
        problem.boundary(pert, qa, yb, qb, p, &mut out);
        out
    });
    let dbc_dqa = columnwise_diff(qa, nbc, bc0, |pert| {
        let mut out = vec![0.0; nbc];
        problem.boundary(ya, pert, yb, qb, p, &mut out);
        out
    });
    let dbc_dyb = columnwise_diff(yb, nbc, bc0, |pert| {
        let mut out = vec![0.0; nbc];
        problem.boundary(ya, qa, pert, qb, p, &mut out);
        out
    });
    let dbc_dqb = columnwise_diff(qb, nbc, bc0, |pert| {
        let mut out = vec![0.0; nbc];
        problem.boundary(ya, qa, yb, pert, p, &mut out);
        out
    });
    let dbc_dp = columnwise_diff(p, nbc, bc0, |pert| {
        let mut out = vec![0.0; nbc];
        problem.boundary(ya, qa, yb, qb, pert, &mut out);
        out
    });

    BoundaryJacobian {
        dbc_dya,
        dbc_dqa,
        dbc_dyb,
        dbc_dqb,
        dbc_dp,
    }
}

fn columnwise_diff(
    vals: &[f64],
    nbc: usize,
    bc0: &[f64],
    mut eval: impl FnMut(&[f64]) -> Vec<f64>,
) -> Mat<f64> {
    let sqrt_eps = libm::sqrt(f64::EPSILON);
    let mut block = Mat::zeros(nbc, vals.len());
    let mut pert = vals.to_vec();
    for i in 0..vals.len() {
        let h = sqrt_eps * (1.0 + libm::fabs(vals[i]));
        pert[i] = vals[i] + h;
        let step = pert[i] - vals[i];
        let out = eval(&pert);
        for r in 0..nbc {
            block[(r, i)] = (out[r] - bc0[r]) / step;
        }
        pert[i] = vals[i];
    }
    block
}

/// All per-point Jacobians needed to assemble the collocation Jacobian.
pub(crate) struct SystemJacobians {
    pub rhs_nodes: RhsJacobian,
    pub rhs_mid: RhsJacobian,
    pub quad_nodes: RhsJacobian,
    pub quad_mid: RhsJacobian,
    pub bc: BoundaryJacobian,
}

pub(crate) fn system_jacobians<P: BvpProblem>(
    field: &Field<'_, P>,
    layout: Layout,
    x: &[f64],
    x_mid: &[f64],
    eval: &Evaluation,
    y: MatRef<'_, f64>,
    p: &[f64],
) -> SystemJacobians {
    let rhs_nodes = field.rhs_jacobians(x, y, p, &eval.f);
    let rhs_mid = field.rhs_jacobians(x_mid, eval.y_mid.as_ref(), p, &eval.f_mid);

    let (quad_nodes, quad_mid) = if layout.nq > 0 {
        (
            field.quad_jacobians(x, y, p, &eval.g),
            field.quad_jacobians(x_mid, eval.y_mid.as_ref(), p, &eval.g_mid),
        )
    } else {
        (
            RhsJacobian {
                df_dy: Vec::new(),
                df_dp: Vec::new(),
            },
            RhsJacobian {
                df_dy: Vec::new(),
                df_dp: Vec::new(),
            },
        )
    };

    let m = layout.m;
    let ya: Vec<f64> = (0..layout.n).map(|i| y[(i, 0)]).collect();
    let yb: Vec<f64> = (0..layout.n).map(|i| y[(i, m - 1)]).collect();
    let qa: Vec<f64> = (0..layout.nq).map(|i| eval.q[(i, 0)]).collect();
    let qb: Vec<f64> = (0..layout.nq).map(|i| eval.q[(i, m - 1)]).collect();
    let bc = field.boundary_jacobians(&ya, &qa, &yb, &qb, p, &eval.bc_res);

    SystemJacobians {
        rhs_nodes,
        rhs_mid,
        quad_nodes,
        quad_mid,
        bc,
    }
}

/// Every structurally nonzero (row, column) of the collocation Jacobian, in
/// the fixed order the value filler emits them.
///
/// Collocation rows carry the two n×n blocks per interval and, with
/// parameters, one n×k block. Boundary rows carry the endpoint Y blocks
/// (every node's Y block when quadrature states couple them through q(b))
/// plus the Q and P blocks.
fn for_each_entry(layout: Layout, mut visit: impl FnMut(usize, usize)) {
    let Layout { n, nq, k, m } = layout;
    let nbc = layout.num_bc();

    for iv in 0..m - 1 {
        for c in 0..n {
            for r in 0..n {
                visit(iv * n + r, layout.y_col(iv, c));
            }
        }
    }
    for iv in 0..m - 1 {
        for c in 0..n {
            for r in 0..n {
                visit(iv * n + r, layout.y_col(iv + 1, c));
            }
        }
    }
    if nq == 0 {
        for c in 0..n {
            for r in 0..nbc {
                visit(layout.bc_row(r), layout.y_col(0, c));
            }
        }
        for c in 0..n {
            for r in 0..nbc {
                visit(layout.bc_row(r), layout.y_col(m - 1, c));
            }
        }
    } else {
        for node in 0..m {
            for c in 0..n {
                for r in 0..nbc {
                    visit(layout.bc_row(r), layout.y_col(node, c));
                }
            }
        }
    }
    for iv in 0..m - 1 {
        for c in 0..k {
            for r in 0..n {
                visit(iv * n + r, layout.p_col(c));
            }
        }
    }
    for c in 0..nq {
        for r in 0..nbc {
            visit(layout.bc_row(r), layout.q_col(c));
        }
    }
    for c in 0..k {
        for r in 0..nbc {
            visit(layout.bc_row(r), layout.p_col(c));
        }
    }
}

/// The sparsity pattern of the collocation Jacobian for one mesh.
pub(crate) struct JacobianPattern {
    symbolic: SymbolicSparseColMat<usize>,
    /// CSC value slot of each entry, in emission order.
    slots: Vec<usize>,
}

impl JacobianPattern {
    pub fn new(layout: Layout) -> Result<Self, Error> {
        let mut pairs = Vec::new();
        for_each_entry(layout, |row, col| pairs.push(Pair { row, col }));

        let size = layout.num_unknowns();
        let (symbolic, _) = SymbolicSparseColMat::try_new_from_indices(size, size, &pairs)?;

        let nnz = symbolic.col_ptr()[symbolic.ncols()];
        let mut slot_of = HashMap::with_capacity(nnz);
        for col in 0..symbolic.ncols() {
            for idx in symbolic.col_ptr()[col]..symbolic.col_ptr()[col + 1] {
                slot_of.insert((symbolic.row_idx()[idx], col), idx);
            }
        }
        let slots: Vec<usize> = pairs.iter().map(|pr| slot_of[&(pr.row, pr.col)]).collect();

        Ok(Self { symbolic, slots })
    }

    pub fn symbolic(&self) -> &SymbolicSparseColMat<usize> {
        &self.symbolic
    }

    pub fn nnz(&self) -> usize {
        self.symbolic.col_ptr()[self.symbolic.ncols()]
    }
}

/// Fill the CSC value buffer from the per-point Jacobians.
///
/// Emission must mirror `for_each_entry` block for block. The n×n collocation
/// blocks come from differentiating the collocation residual
/// Φ_i = y_{i+1} − y_i − (h/6)(f_i + f_{i+1} + 4 f_mid) through the midpoint
/// state y_mid = ½(y_i + y_{i+1}) − (h/8)(f_{i+1} − f_i).
pub(crate) fn fill_values(
    layout: Layout,
    h: &[f64],
    jac: &SystemJacobians,
    pattern: &JacobianPattern,
    vals: &mut [f64],
) {
    let Layout { n, nq, k, m } = layout;
    let nbc = layout.num_bc();
    let mut values: Vec<f64> = Vec::with_capacity(pattern.slots.len());

    // Diagonal blocks: −I − (h/6)(J_i + 2·J_mid) − (h²/12)·J_mid·J_i.
    for iv in 0..m - 1 {
        let t = &jac.rhs_mid.df_dy[iv] * &jac.rhs_nodes.df_dy[iv];
        for c in 0..n {
            for r in 0..n {
                let ident = if r == c { 1.0 } else { 0.0 };
                values.push(
                    -ident
                        - h[iv] / 6.0
                            * (jac.rhs_nodes.df_dy[iv][(r, c)]
                                + 2.0 * jac.rhs_mid.df_dy[iv][(r, c)])
                        - h[iv] * h[iv] / 12.0 * t[(r, c)],
                );
            }
        }
    }

    // Off-diagonal blocks: I − (h/6)(J_{i+1} + 2·J_mid) + (h²/12)·J_mid·J_{i+1}.
    for iv in 0..m - 1 {
        let t = &jac.rhs_mid.df_dy[iv] * &jac.rhs_nodes.df_dy[iv + 1];
        for c in 0..n {
            for r in 0..n {
                let ident = if r == c { 1.0 } else { 0.0 };
                values.push(
                    ident
                        - h[iv] / 6.0
                            * (jac.rhs_nodes.df_dy[iv + 1][(r, c)]
                                + 2.0 * jac.rhs_mid.df_dy[iv][(r, c)])
                        + h[iv] * h[iv] / 12.0 * t[(r, c)],
                );
            }
        }
    }

    // Boundary rows against Y.
    if nq == 0 {
        for c in 0..n {
            for r in 0..nbc {
                values.push(jac.bc.dbc_dya[(r, c)]);
            }
        }
        for c in 0..n {
            for r in 0..nbc {
                values.push(jac.bc.dbc_dyb[(r, c)]);
            }
        }
    } else {
        // q(b) is an integral of the quadrature rhs over the whole mesh, so
        // boundary conditions on it feel every node. Node j picks up the
        // derivative of the interval increments it touches; the structure
        // mirrors the collocation blocks with dq_dy in the outer role.
        for node in 0..m {
            let mut dqb_dy = Mat::<f64>::zeros(nq, n);
            if node < m - 1 {
                let iv = node;
                let t = &jac.quad_mid.df_dy[iv] * &jac.rhs_nodes.df_dy[node];
                for r in 0..nq {
                    for c in 0..n {
                        dqb_dy[(r, c)] += h[iv] / 6.0
                            * (jac.quad_nodes.df_dy[node][(r, c)]
                                + 2.0 * jac.quad_mid.df_dy[iv][(r, c)])
                            + h[iv] * h[iv] / 12.0 * t[(r, c)];
                    }
                }
            }
            if node > 0 {
                let iv = node - 1;
                let t = &jac.quad_mid.df_dy[iv] * &jac.rhs_nodes.df_dy[node];
                for r in 0..nq {
                    for c in 0..n {
                        dqb_dy[(r, c)] += h[iv] / 6.0
                            * (jac.quad_nodes.df_dy[node][(r, c)]
                                + 2.0 * jac.quad_mid.df_dy[iv][(r, c)])
                            - h[iv] * h[iv] / 12.0 * t[(r, c)];
                    }
                }
            }
            let coupled = &jac.bc.dbc_dqb * &dqb_dy;
            for c in 0..n {
                for r in 0..nbc {
                    let mut v = coupled[(r, c)];
                    if node == 0 {
                        v += jac.bc.dbc_dya[(r, c)];
                    }
                    if node == m - 1 {
                        v += jac.bc.dbc_dyb[(r, c)];
                    }
                    values.push(v);
                }
            }
        }
    }

    // Collocation rows against P, with the midpoint block corrected for the
    // midpoint state's own p-dependence.
    if k > 0 {
        for iv in 0..m - 1 {
            let diff = Mat::from_fn(n, k, |r, c| {
                jac.rhs_nodes.df_dp[iv][(r, c)] - jac.rhs_nodes.df_dp[iv + 1][(r, c)]
            });
            let t = &jac.rhs_mid.df_dy[iv] * &diff;
            for c in 0..k {
                for r in 0..n {
                    let mid_adj = jac.rhs_mid.df_dp[iv][(r, c)] + 0.125 * h[iv] * t[(r, c)];
                    values.push(
                        -h[iv] / 6.0
                            * (jac.rhs_nodes.df_dp[iv][(r, c)]
                                + jac.rhs_nodes.df_dp[iv + 1][(r, c)]
                                + 4.0 * mid_adj),
                    );
                }
            }
        }
    }

    // Boundary rows against Q: both endpoints of q move one-for-one with q(a).
    for c in 0..nq {
        for r in 0..nbc {
            values.push(jac.bc.dbc_dqa[(r, c)] + jac.bc.dbc_dqb[(r, c)]);
        }
    }

    // Boundary rows against P, including the path through q(b).
    if k > 0 {
        let mut bc_p = jac.bc.dbc_dp.clone();
        if nq > 0 {
            let mut dqb_dp = Mat::<f64>::zeros(nq, k);
            for iv in 0..m - 1 {
                let diff = Mat::from_fn(n, k, |r, c| {
                    jac.rhs_nodes.df_dp[iv][(r, c)] - jac.rhs_nodes.df_dp[iv + 1][(r, c)]
                });
                let t = &jac.quad_mid.df_dy[iv] * &diff;
                for r in 0..nq {
                    for c in 0..k {
                        let mid_adj = jac.quad_mid.df_dp[iv][(r, c)] + 0.125 * h[iv] * t[(r, c)];
                        dqb_dp[(r, c)] += h[iv] / 6.0
                            * (jac.quad_nodes.df_dp[iv][(r, c)]
                                + jac.quad_nodes.df_dp[iv + 1][(r, c)]
                                + 4.0 * mid_adj);
                    }
                }
            }
            let chain = &jac.bc.dbc_dqb * &dqb_dp;
            for r in 0..nbc {
                for c in 0..k {
                    bc_p[(r, c)] += chain[(r, c)];
                }
            }
        }
        for c in 0..k {
            for r in 0..nbc {
                values.push(bc_p[(r, c)]);
            }
        }
    }

    debug_assert_eq!(values.len(), pattern.slots.len());
    for (slot, v) in pattern.slots.iter().zip(values) {
        vals[*slot] = v;
    }
}
