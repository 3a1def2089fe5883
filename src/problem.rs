//! Describing a boundary value problem to the solver.

use faer::{Mat, MatMut, MatRef};

/// Jacobians of a grid-evaluated right-hand side, one dense block per point.
///
/// For the ODE rhs the blocks are n×n and n×k; for the quadrature rhs they
/// are nq×n and nq×k. `df_dp` is empty when the problem has no unknown
/// parameters.
pub struct RhsJacobian {
    /// ∂f/∂y at each evaluation point.
    pub df_dy: Vec<Mat<f64>>,
    /// ∂f/∂p at each evaluation point; empty when `nparams() == 0`.
    pub df_dp: Vec<Mat<f64>>,
}

/// Jacobian of the boundary residuals.
///
/// Every block has n + nq + k rows. Blocks for absent quadrature states or
/// parameters are matrices with zero columns.
pub struct BoundaryJacobian {
    /// ∂bc/∂y(a), (n+nq+k)×n.
    pub dbc_dya: Mat<f64>,
    /// ∂bc/∂q(a), (n+nq+k)×nq.
    pub dbc_dqa: Mat<f64>,
    /// ∂bc/∂y(b), (n+nq+k)×n.
    pub dbc_dyb: Mat<f64>,
    /// ∂bc/∂q(b), (n+nq+k)×nq.
    pub dbc_dqb: Mat<f64>,
    /// ∂bc/∂p, (n+nq+k)×k.
    pub dbc_dp: Mat<f64>,
}

/// A two-point boundary value problem
///
/// ```text
/// y'(x) = f(x, y, p) + S·y/(x − a),    a ≤ x ≤ b
/// bc(y(a), q(a), y(b), q(b), p) = 0
/// ```
///
/// Only [`ndim`](Self::ndim), [`rhs`](Self::rhs) and
/// [`boundary`](Self::boundary) are required. Unknown parameters, quadrature
/// states and the singular term are opt-in through the defaulted methods, and
/// overriding a `*_jacobian` method is how a problem declares that it can
/// evaluate that derivative analytically; everything left at `None` is
/// estimated by forward differences.
///
/// All grid callbacks are vectorized: they receive every evaluation point at
/// once, with column j of `y` (and of the output) belonging to `x[j]`.
pub trait BvpProblem {
    /// State dimension n.
    fn ndim(&self) -> usize;

    /// Number of unknown parameters k.
    fn nparams(&self) -> usize {
        0
    }

    /// Number of quadrature states nq.
    fn nquads(&self) -> usize {
        0
    }

    /// The ODE right-hand side, written into the n×m matrix `f`.
    fn rhs(&self, x: &[f64], y: MatRef<'_, f64>, p: &[f64], f: MatMut<'_, f64>);

    /// The quadrature right-hand side, written into the nq×m matrix `g`.
    /// Must be overridden when `nquads() > 0`.
    fn quad_rhs(&self, _x: &[f64], _y: MatRef<'_, f64>, _p: &[f64], _g: MatMut<'_, f64>) {}

    /// Boundary residuals, written into `out` of length n + nq + k.
    fn boundary(&self, ya: &[f64], qa: &[f64], yb: &[f64], qb: &[f64], p: &[f64], out: &mut [f64]);

    /// Analytic Jacobians of the rhs, without the singular term (the solver
    /// folds that in itself).
    fn rhs_jacobian(&self, _x: &[f64], _y: MatRef<'_, f64>, _p: &[f64]) -> Option<RhsJacobian> {
        None
    }

    /// Analytic Jacobians of the quadrature rhs.
    fn quad_jacobian(&self, _x: &[f64], _y: MatRef<'_, f64>, _p: &[f64]) -> Option<RhsJacobian> {
        None
    }

    /// Analytic Jacobian of the boundary residuals.
    fn boundary_jacobian(
        &self,
        _ya: &[f64],
        _qa: &[f64],
        _yb: &[f64],
        _qb: &[f64],
        _p: &[f64],
    ) -> Option<BoundaryJacobian> {
        None
    }

    /// The n×n matrix S of the singular term, if the problem has one. The
    /// solution then has to satisfy S·y(a) = 0, which the solver enforces.
    fn singular_term(&self) -> Option<Mat<f64>> {
        None
    }
}
