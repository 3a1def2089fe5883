//! Mesh bookkeeping, node insertion and residual estimation.

use faer::Mat;

use crate::field::Field;
use crate::problem::BvpProblem;
use crate::spline::CubicSpline;

pub(crate) fn interval_widths(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

pub(crate) fn midpoints(x: &[f64], h: &[f64]) -> Vec<f64> {
    (0..h.len()).map(|j| x[j] + 0.5 * h[j]).collect()
}

/// Insert nodes into a mesh: one midpoint node per `insert_one` interval,
/// two thirds-point nodes per `insert_two` interval.
///
/// Nodes are never removed. The insertion sets must be disjoint; a
/// sort-based merge keeps the result ordered.
pub(crate) fn modify_mesh(x: &[f64], insert_one: &[usize], insert_two: &[usize]) -> Vec<f64> {
    let mut out = x.to_vec();
    for &j in insert_one {
        out.push(0.5 * (x[j] + x[j + 1]));
    }
    for &j in insert_two {
        out.push((2.0 * x[j] + x[j + 1]) / 3.0);
        out.push((x[j] + 2.0 * x[j + 1]) / 3.0);
    }
    out.sort_by(f64::total_cmp);
    out
}

/// Estimate per-interval RMS values of the relative ODE residual by 5-point
/// Lobatto quadrature.
///
/// The residual r = y'(x) − f̂(x, y(x)) vanishes at the mesh nodes by
/// construction, so the quadrature needs only the midpoint (where
/// r_mid = 1.5·col_res/h is already known) and the two interior points
/// x_mid ± (h/2)·√(3/7). Residuals are normalized by 1 + |f̂| before
/// squaring, which makes the result an RMS of relative residuals.
pub(crate) fn estimate_rms_residuals<P: BvpProblem>(
    field: &Field<'_, P>,
    sol: &CubicSpline,
    x: &[f64],
    h: &[f64],
    p: &[f64],
    r_mid: &Mat<f64>,
    f_mid: &Mat<f64>,
) -> Vec<f64> {
    let n = field.n;
    let intervals = h.len();

    let x_mid = midpoints(x, h);
    let offset: Vec<f64> = h.iter().map(|hj| 0.5 * hj * libm::sqrt(3.0 / 7.0)).collect();
    let x1: Vec<f64> = (0..intervals).map(|j| x_mid[j] + offset[j]).collect();
    let x2: Vec<f64> = (0..intervals).map(|j| x_mid[j] - offset[j]).collect();

    let y1 = sol.values(&x1);
    let y2 = sol.values(&x2);
    let y1_prime = sol.derivatives(&x1);
    let y2_prime = sol.derivatives(&x2);
    let f1 = field.rhs(&x1, y1.as_ref(), p);
    let f2 = field.rhs(&x2, y2.as_ref(), p);

    let mut rms = vec![0.0; intervals];
    for j in 0..intervals {
        let mut sum_mid = 0.0;
        let mut sum_1 = 0.0;
        let mut sum_2 = 0.0;
        for i in 0..n {
            let rm = r_mid[(i, j)] / (1.0 + libm::fabs(f_mid[(i, j)]));
            sum_mid += rm * rm;
            let r1 = (y1_prime[(i, j)] - f1[(i, j)]) / (1.0 + libm::fabs(f1[(i, j)]));
            sum_1 += r1 * r1;
            let r2 = (y2_prime[(i, j)] - f2[(i, j)]) / (1.0 + libm::fabs(f2[(i, j)]));
            sum_2 += r2 * r2;
        }
        rms[j] = libm::sqrt(0.5 * (32.0 / 45.0 * sum_mid + 49.0 / 90.0 * (sum_1 + sum_2)));
    }
    rms
}
