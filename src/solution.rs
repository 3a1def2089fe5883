use faer::Mat;

use crate::spline::CubicSpline;
use crate::warnings::Warning;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Converged to the requested tolerance.
    Converged,
    /// A refinement would have exceeded the mesh-node budget.
    MaxNodesExceeded,
    /// The sparse LU declared the collocation Jacobian singular.
    SingularJacobian,
}

impl Status {
    /// Numeric code: 0 converged, 1 node budget, 2 singular Jacobian.
    pub fn code(&self) -> u8 {
        match self {
            Status::Converged => 0,
            Status::MaxNodesExceeded => 1,
            Status::SingularJacobian => 2,
        }
    }

    /// Verbal description of the termination reason.
    pub fn message(&self) -> &'static str {
        match self {
            Status::Converged => "The algorithm converged to the desired accuracy.",
            Status::MaxNodesExceeded => "The maximum number of mesh nodes is exceeded.",
            Status::SingularJacobian => {
                "A singular Jacobian encountered when solving the collocation system."
            }
        }
    }
}

impl std::fmt::Display for Status {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Everything a finished solve hands back.
///
/// A solve that stops on the node budget or a singular Jacobian still
/// returns the most recent iterate here, often useful as a warm start.
#[derive(Debug)]
pub struct BvpSolution {
    pub(crate) sol: CubicSpline,
    pub(crate) p: Vec<f64>,
    pub(crate) x: Vec<f64>,
    pub(crate) y: Mat<f64>,
    pub(crate) q: Mat<f64>,
    pub(crate) yp: Mat<f64>,
    pub(crate) rms_residuals: Vec<f64>,
    pub(crate) niter: usize,
    pub(crate) status: Status,
    pub(crate) warnings: Vec<Warning>,
}

impl BvpSolution {
    /// The solution as a C¹ cubic spline, for evaluation anywhere in [a, b].
    pub fn sol(&self) -> &CubicSpline {
        &self.sol
    }

    /// Consume the record, keeping only the spline.
    pub fn into_spline(self) -> CubicSpline {
        self.sol
    }

    /// Found parameters; empty when the problem has none.
    pub fn p(&self) -> &[f64] {
        &self.p
    }

    /// Nodes of the final mesh.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Solution values at the mesh nodes, column j for node j.
    pub fn y(&self) -> &Mat<f64> {
        &self.y
    }

    /// Quadrature states at the mesh nodes; 0×m when the problem has none.
    pub fn q(&self) -> &Mat<f64> {
        &self.q
    }

    /// Solution derivatives at the mesh nodes (the wrapped rhs at the final
    /// iterate).
    pub fn yp(&self) -> &Mat<f64> {
        &self.yp
    }

    /// Estimated RMS values of the relative residuals over each interval.
    pub fn rms_residuals(&self) -> &[f64] {
        &self.rms_residuals
    }

    /// Number of completed outer iterations.
    pub fn niter(&self) -> usize {
        self.niter
    }

    /// Why the solver stopped.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Verbal description of the termination reason.
    #[mutants::skip]
    pub fn message(&self) -> &'static str {
        self.status.message()
    }

    /// True when the solve converged to the requested tolerance.
    pub fn success(&self) -> bool {
        self.status == Status::Converged
    }

    /// Non-fatal diagnostics recorded during the solve.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}
