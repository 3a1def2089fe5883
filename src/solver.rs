//! Numeric core: unknown-vector layout, Jacobian assembly and the damped
//! Newton iteration.

pub(crate) mod jacobian;
pub(crate) mod newton;

/// Index bookkeeping for the collocation system.
///
/// Unknowns are ordered (vec(Y) column-major, q(a), p); residuals are
/// ordered (collocation residuals column-major, boundary residuals). The
/// Jacobian is square of side `num_unknowns()`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    /// State dimension n.
    pub n: usize,
    /// Quadrature dimension nq.
    pub nq: usize,
    /// Parameter dimension k.
    pub k: usize,
    /// Mesh size m.
    pub m: usize,
}

impl Layout {
    pub fn num_unknowns(&self) -> usize {
        self.n * self.m + self.nq + self.k
    }

    pub fn num_bc(&self) -> usize {
        self.n + self.nq + self.k
    }

    pub fn collocation_rows(&self) -> usize {
        self.n * (self.m - 1)
    }

    pub fn bc_row(&self, i: usize) -> usize {
        self.collocation_rows() + i
    }

    pub fn y_col(&self, node: usize, comp: usize) -> usize {
        node * self.n + comp
    }

    pub fn q_col(&self, i: usize) -> usize {
        self.n * self.m + i
    }

    pub fn p_col(&self, i: usize) -> usize {
        self.n * self.m + self.nq + i
    }
}

/// How chatty the solver is. Output goes through `tracing` events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Work silently.
    #[default]
    Silent,
    /// Emit a termination report.
    Report,
    /// Emit per-iteration progress and a termination report.
    Iterations,
}

/// Knobs for a solve.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Target for the per-interval RMS relative residuals. Values below
    /// 100·ε are clamped (with a [`crate::Warning`] in the result).
    pub tol: f64,
    /// Hard ceiling on the mesh size. A refinement that would exceed it ends
    /// the solve with [`crate::Status::MaxNodesExceeded`].
    pub max_nodes: usize,
    /// Progress reporting level.
    pub verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tol: 1e-3,
            max_nodes: 1000,
            verbosity: Verbosity::Silent,
        }
    }
}

impl Config {
    /// Set the residual tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the mesh-size ceiling.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Set the reporting level.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}
