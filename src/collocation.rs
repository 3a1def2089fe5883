//! The Lobatto IIIA collocation residuals.
//!
//! The solution is sought as a C¹ cubic spline whose derivative matches the
//! ODE rhs at the mesh nodes; the collocation condition asks the same at
//! every interval midpoint. The midpoint state is not an independent
//! unknown: it is the cubic Hermite interpolant through the node data.

use faer::{Mat, MatRef};

use crate::field::Field;
use crate::problem::BvpProblem;

/// Everything one evaluation of the collocation system produces.
pub(crate) struct Evaluation {
    /// Wrapped rhs at the mesh nodes, n×m.
    pub f: Mat<f64>,
    /// Interpolated states at the interval midpoints, n×(m−1).
    pub y_mid: Mat<f64>,
    /// Wrapped rhs at the midpoints, n×(m−1).
    pub f_mid: Mat<f64>,
    /// Collocation residuals, n×(m−1).
    pub col_res: Mat<f64>,
    /// Quadrature rhs at the nodes, nq×m.
    pub g: Mat<f64>,
    /// Quadrature rhs at the midpoints, nq×(m−1).
    pub g_mid: Mat<f64>,
    /// Quadrature grid: q(a) plus cumulative Lobatto increments, nq×m.
    pub q: Mat<f64>,
    /// Boundary residuals, length n + nq + k.
    pub bc_res: Vec<f64>,
}

pub(crate) fn evaluate<P: BvpProblem>(
    field: &Field<'_, P>,
    x: &[f64],
    h: &[f64],
    x_mid: &[f64],
    y: MatRef<'_, f64>,
    qa: &[f64],
    p: &[f64],
) -> Evaluation {
    let n = field.n;
    let nq = field.nq;
    let m = x.len();

    let f = field.rhs(x, y, p);

    let mut y_mid = Mat::zeros(n, m - 1);
    for j in 0..m - 1 {
        for i in 0..n {
            y_mid[(i, j)] = 0.5 * (y[(i, j + 1)] + y[(i, j)])
                - 0.125 * h[j] * (f[(i, j + 1)] - f[(i, j)]);
        }
    }
    let f_mid = field.rhs(x_mid, y_mid.as_ref(), p);

    let mut col_res = Mat::zeros(n, m - 1);
    for j in 0..m - 1 {
        for i in 0..n {
            col_res[(i, j)] = y[(i, j + 1)]
                - y[(i, j)]
                - h[j] / 6.0 * (f[(i, j)] + f[(i, j + 1)] + 4.0 * f_mid[(i, j)]);
        }
    }

    // Quadrature states are pure integrals of their rhs: the grid is q(a)
    // plus per-interval Lobatto increments, never an unknown of its own.
    let (g, g_mid, q) = if nq > 0 {
        let g = field.quad_rhs(x, y, p);
        let g_mid = field.quad_rhs(x_mid, y_mid.as_ref(), p);
        let mut q = Mat::zeros(nq, m);
        for (i, &qi) in qa.iter().enumerate() {
            q[(i, 0)] = qi;
        }
        for j in 0..m - 1 {
            for i in 0..nq {
                q[(i, j + 1)] = q[(i, j)]
                    + h[j] / 6.0 * (g[(i, j)] + g[(i, j + 1)] + 4.0 * g_mid[(i, j)]);
            }
        }
        (g, g_mid, q)
    } else {
        (Mat::zeros(0, m), Mat::zeros(0, m - 1), Mat::zeros(0, m))
    };

    let ya: Vec<f64> = (0..n).map(|i| y[(i, 0)]).collect();
    let yb: Vec<f64> = (0..n).map(|i| y[(i, m - 1)]).collect();
    let qa_col: Vec<f64> = (0..nq).map(|i| q[(i, 0)]).collect();
    let qb_col: Vec<f64> = (0..nq).map(|i| q[(i, m - 1)]).collect();
    let mut bc_res = vec![0.0; n + nq + field.k];
    field
        .problem
        .boundary(&ya, &qa_col, &yb, &qb_col, p, &mut bc_res);

    Evaluation {
        f,
        y_mid,
        f_mid,
        col_res,
        g,
        g_mid,
        q,
        bc_res,
    }
}

impl Evaluation {
    /// Collocation residuals (column-major) followed by boundary residuals,
    /// in the row order of the collocation Jacobian.
    pub fn stacked_residuals(&self) -> Vec<f64> {
        let n = self.col_res.nrows();
        let intervals = self.col_res.ncols();
        let mut res = Vec::with_capacity(n * intervals + self.bc_res.len());
        for j in 0..intervals {
            for i in 0..n {
                res.push(self.col_res[(i, j)]);
            }
        }
        res.extend_from_slice(&self.bc_res);
        res
    }
}
