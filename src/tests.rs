use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use faer::{Mat, MatMut, MatRef};

use super::*;

mod proptests;

fn linspace(a: f64, b: f64, m: usize) -> Vec<f64> {
    (0..m)
        .map(|i| a + (b - a) * i as f64 / (m - 1) as f64)
        .collect()
}

/// y' = (y₂, −y₁) with y₁(0) = 1 and y₁(π/2) = 0; the solution is
/// (cos x, −sin x), so y(π/2) = (0, −1).
struct Rotation;

impl BvpProblem for Rotation {
    fn ndim(&self) -> usize {
        2
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = y[(1, j)];
            f[(1, j)] = -y[(0, j)];
        }
    }

    fn boundary(
        &self,
        ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = ya[0] - 1.0;
        out[1] = yb[0];
    }
}

#[test_log::test]
fn linear_rotation() {
    let x = linspace(0.0, FRAC_PI_2, 5);
    let mut y: Mat<f64> = Mat::zeros(2, 5);
    y[(0, 0)] = 1.0;
    y[(1, 4)] = -1.0;

    let config = Config::default().with_verbosity(Verbosity::Iterations);
    let solution = solve_bvp(&Rotation, &x, y.as_ref(), None, &[], config).unwrap();

    assert_eq!(solution.status(), Status::Converged);
    assert!(solution.success());
    assert!(solution.rms_residuals().iter().all(|&r| r <= 1e-3));

    let mid = solution.sol().value(FRAC_PI_4);
    assert!((mid[0] - FRAC_PI_4.cos()).abs() < 1e-3);
    assert!((mid[1] + FRAC_PI_4.sin()).abs() < 1e-3);
}

#[test]
fn mesh_stays_increasing_and_grows() {
    let x = linspace(0.0, FRAC_PI_2, 5);
    let mut y: Mat<f64> = Mat::zeros(2, 5);
    y[(0, 0)] = 1.0;
    y[(1, 4)] = -1.0;

    let solution = solve_bvp(
        &Rotation,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default().with_tol(1e-8),
    )
    .unwrap();

    assert!(solution.x().len() >= 5);
    assert!(solution.x().windows(2).all(|w| w[1] > w[0]));
    // yp holds the rhs at the final iterate, and the spline reproduces both
    // grids at the nodes.
    for (j, &t) in solution.x().iter().enumerate() {
        let v = solution.sol().value(t);
        let d = solution.sol().derivative(t);
        for i in 0..2 {
            assert!((v[i] - solution.y()[(i, j)]).abs() < 1e-12);
            assert!((d[i] - solution.yp()[(i, j)]).abs() < 1e-11);
        }
    }
}

/// Bratu's problem y'' + exp(y) = 0, y(0) = y(1) = 0. Two solutions; the
/// initial guess picks the branch.
struct Bratu;

impl BvpProblem for Bratu {
    fn ndim(&self) -> usize {
        2
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = y[(1, j)];
            f[(1, j)] = -libm::exp(y[(0, j)]);
        }
    }

    fn boundary(
        &self,
        ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = ya[0];
        out[1] = yb[0];
    }
}

/// Closed form: y(x) = −2·ln(cosh(b(x−½))/cosh(b/2)) solves Bratu when
/// b = cosh(b/2)/√2; its midpoint value is 2·ln(cosh(b/2)). The equation has
/// two roots, one per solution branch.
fn bratu_midpoint_value(b_lo: f64, b_hi: f64) -> f64 {
    let f = |b: f64| libm::cosh(b / 2.0) / libm::sqrt(2.0) - b;
    let (mut lo, mut hi) = (b_lo, b_hi);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if f(lo) * f(mid) <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    2.0 * libm::log(libm::cosh(0.5 * lo))
}

#[test]
fn bratu_lower_branch() {
    let x = linspace(0.0, 1.0, 5);
    let y: Mat<f64> = Mat::zeros(2, 5);

    let solution = solve_bvp(
        &Bratu,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default().with_tol(1e-5),
    )
    .unwrap();

    assert_eq!(solution.status(), Status::Converged);
    let expected = bratu_midpoint_value(0.5, 1.0);
    assert!((solution.sol().value(0.5)[0] - expected).abs() < 1e-3);
}

#[test]
fn bratu_upper_branch() {
    let x = linspace(0.0, 1.0, 5);
    let y = Mat::from_fn(2, 5, |i, _| if i == 0 { 3.0 } else { 0.0 });

    let solution = solve_bvp(
        &Bratu,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default().with_tol(1e-5),
    )
    .unwrap();

    assert_eq!(solution.status(), Status::Converged);
    let expected = bratu_midpoint_value(4.0, 8.0);
    assert!((solution.sol().value(0.5)[0] - expected).abs() < 1e-3);
}

/// Sturm–Liouville with the frequency as an unknown parameter:
/// y'' + k²y = 0, y(0) = y(1) = 0, y'(0) = k. The guess steers the solve
/// toward k = 2π.
struct SturmLiouville;

impl BvpProblem for SturmLiouville {
    fn ndim(&self) -> usize {
        2
    }

    fn nparams(&self) -> usize {
        1
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = y[(1, j)];
            f[(1, j)] = -p[0] * p[0] * y[(0, j)];
        }
    }

    fn boundary(
        &self,
        ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        _qb: &[f64],
        p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = ya[0];
        out[1] = yb[0];
        out[2] = ya[1] - p[0];
    }
}

#[test_log::test]
fn sturm_liouville_finds_eigenvalue() {
    let x = linspace(0.0, 1.0, 5);
    let mut y: Mat<f64> = Mat::zeros(2, 5);
    y[(0, 1)] = 1.0;
    y[(0, 3)] = -1.0;

    let solution = solve_bvp(
        &SturmLiouville,
        &x,
        y.as_ref(),
        None,
        &[6.0],
        Config::default().with_tol(1e-5),
    )
    .unwrap();

    assert_eq!(solution.status(), Status::Converged);
    assert_eq!(solution.p().len(), 1);
    assert!((solution.p()[0] - 2.0 * PI).abs() < 1e-4);
}

/// A singular left endpoint with a manufactured solution: with
/// S = [[0, 0], [0, −1]] and f = (2x, 3x) the exact solution of
/// y' = f + S·y/x is y = (x², x²), which satisfies S·y(0) = 0.
struct SingularManufactured;

impl BvpProblem for SingularManufactured {
    fn ndim(&self) -> usize {
        2
    }

    fn rhs(&self, x: &[f64], _y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for (j, &xj) in x.iter().enumerate() {
            f[(0, j)] = 2.0 * xj;
            f[(1, j)] = 3.0 * xj;
        }
    }

    fn boundary(
        &self,
        _ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = yb[0] - 1.0;
        out[1] = yb[1] - 1.0;
    }

    fn singular_term(&self) -> Option<Mat<f64>> {
        Some(Mat::from_fn(2, 2, |i, j| {
            if i == 1 && j == 1 { -1.0 } else { 0.0 }
        }))
    }
}

#[test]
fn singular_left_endpoint() {
    let x = linspace(0.0, 1.0, 5);
    let y: Mat<f64> = Mat::zeros(2, 5);

    let solution = solve_bvp(
        &SingularManufactured,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default(),
    )
    .unwrap();

    assert_eq!(solution.status(), Status::Converged);
    assert!(solution.rms_residuals().iter().all(|&r| r <= 1e-3));
    // S·y(a) = 0 at termination: the second component vanishes at x = 0.
    assert!(solution.y()[(1, 0)].abs() < 1e-10);
    let mid = solution.sol().value(0.5);
    assert!((mid[0] - 0.25).abs() < 1e-4);
    assert!((mid[1] - 0.25).abs() < 1e-4);
}

/// εy'' = y with ε = 10⁻⁴ has boundary layers that a 10-node budget cannot
/// resolve.
struct BoundaryLayer;

impl BvpProblem for BoundaryLayer {
    fn ndim(&self) -> usize {
        2
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = y[(1, j)];
            f[(1, j)] = y[(0, j)] / 1e-4;
        }
    }

    fn boundary(
        &self,
        ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = ya[0] - 1.0;
        out[1] = yb[0];
    }
}

#[test]
fn node_budget_exhaustion() {
    let x = linspace(0.0, 1.0, 5);
    let y: Mat<f64> = Mat::zeros(2, 5);

    let solution = solve_bvp(
        &BoundaryLayer,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default().with_max_nodes(10),
    )
    .unwrap();

    assert_eq!(solution.status(), Status::MaxNodesExceeded);
    assert_eq!(solution.status().code(), 1);
    assert!(!solution.success());
    assert!(solution.x().len() <= 10);
    // The record is still populated: a spline, residual estimates, grids.
    assert_eq!(solution.rms_residuals().len(), solution.x().len() - 1);
    assert_eq!(solution.y().ncols(), solution.x().len());
    let _ = solution.sol().value(0.5);
}

/// Duplicated boundary conditions make the collocation Jacobian rank
/// deficient on the very first Newton step.
struct DuplicateBc;

impl BvpProblem for DuplicateBc {
    fn ndim(&self) -> usize {
        2
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = y[(1, j)];
            f[(1, j)] = y[(0, j)];
        }
    }

    fn boundary(
        &self,
        ya: &[f64],
        _qa: &[f64],
        _yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = ya[0] - 1.0;
        out[1] = ya[0] - 1.0;
    }
}

#[test]
fn singular_jacobian_is_reported_not_raised() {
    let x = linspace(0.0, 1.0, 5);
    let y: Mat<f64> = Mat::zeros(2, 5);

    let solution = solve_bvp(&DuplicateBc, &x, y.as_ref(), None, &[], Config::default()).unwrap();

    assert_eq!(solution.status(), Status::SingularJacobian);
    assert_eq!(solution.status().code(), 2);
    assert!(!solution.success());
    assert_eq!(
        solution.message(),
        "A singular Jacobian encountered when solving the collocation system."
    );
}

/// One state, one quadrature: y' = 0, q' = y, with boundary conditions
/// y(1) = 2 and q(1) = 1. Then y ≡ 2, q(x) = q(0) + 2x, and q(0) = −1.
struct WithQuadrature;

impl BvpProblem for WithQuadrature {
    fn ndim(&self) -> usize {
        1
    }

    fn nquads(&self) -> usize {
        1
    }

    fn rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut f: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            f[(0, j)] = 0.0;
        }
    }

    fn quad_rhs(&self, _x: &[f64], y: MatRef<'_, f64>, _p: &[f64], mut g: MatMut<'_, f64>) {
        for j in 0..y.ncols() {
            g[(0, j)] = y[(0, j)];
        }
    }

    fn boundary(
        &self,
        _ya: &[f64],
        _qa: &[f64],
        yb: &[f64],
        qb: &[f64],
        _p: &[f64],
        out: &mut [f64],
    ) {
        out[0] = yb[0] - 2.0;
        out[1] = qb[0] - 1.0;
    }
}

#[test]
fn quadrature_states_reach_boundary_conditions() {
    let x = linspace(0.0, 1.0, 4);
    let y = Mat::from_fn(1, 4, |_, _| 1.0);

    let solution =
        solve_bvp(&WithQuadrature, &x, y.as_ref(), None, &[], Config::default()).unwrap();

    assert_eq!(solution.status(), Status::Converged);
    let m = solution.x().len();
    for j in 0..m {
        assert!((solution.y()[(0, j)] - 2.0).abs() < 1e-10);
    }
    // q is reported on the whole mesh: q(0) = −1 and q(1) = 1.
    assert!((solution.q()[(0, 0)] + 1.0).abs() < 1e-10);
    assert!((solution.q()[(0, m - 1)] - 1.0).abs() < 1e-10);
}

#[test]
fn rejects_short_mesh() {
    let y: Mat<f64> = Mat::zeros(2, 1);
    let err = solve_bvp(&Rotation, &[0.0], y.as_ref(), None, &[], Config::default()).unwrap_err();
    assert!(matches!(err, Error::MeshTooShort(1)));
}

#[test]
fn rejects_decreasing_mesh() {
    let y: Mat<f64> = Mat::zeros(2, 3);
    let err = solve_bvp(
        &Rotation,
        &[0.0, 0.7, 0.7],
        y.as_ref(),
        None,
        &[],
        Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MeshNotIncreasing { index: 2 }));
}

#[test]
fn rejects_misshapen_guess() {
    let y: Mat<f64> = Mat::zeros(3, 5);
    let err = solve_bvp(
        &Rotation,
        &linspace(0.0, 1.0, 5),
        y.as_ref(),
        None,
        &[],
        Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::BadStateGuess { rows: 2, .. }));
}

#[test]
fn rejects_wrong_parameter_count() {
    let y: Mat<f64> = Mat::zeros(2, 5);
    let err = solve_bvp(
        &SturmLiouville,
        &linspace(0.0, 1.0, 5),
        y.as_ref(),
        None,
        &[],
        Config::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::BadParamGuess {
            expected: 1,
            actual: 0
        }
    ));
}

#[test]
fn clamps_tiny_tolerance_with_warning() {
    let x = linspace(0.0, FRAC_PI_2, 5);
    let mut y: Mat<f64> = Mat::zeros(2, 5);
    y[(0, 0)] = 1.0;
    y[(1, 4)] = -1.0;

    let solution = solve_bvp(
        &Rotation,
        &x,
        y.as_ref(),
        None,
        &[],
        Config::default().with_tol(1e-18).with_max_nodes(64),
    )
    .unwrap();

    assert!(matches!(
        solution.warnings(),
        [Warning::ToleranceClamped { requested, .. }] if *requested == 1e-18
    ));
}
