//! The vector field the collocation scheme actually sees.
//!
//! When a singular term is present the quotient S·y/(x − a) is folded into
//! the rhs here. At x = a the quotient is replaced by the regular limit:
//! f̂(a, y, p) = D·f(a, y, p) with D = (I − S)⁺.

use faer::{Mat, MatRef};

use crate::error::Error;
use crate::linalg::{Projectors, matvec};
use crate::problem::{BoundaryJacobian, BvpProblem, RhsJacobian};
use crate::solver::jacobian::{estimate_boundary_jacobian, estimate_grid_jacobian};

pub(crate) struct Field<'p, P: BvpProblem> {
    pub problem: &'p P,
    /// Left endpoint of the mesh.
    pub a: f64,
    pub n: usize,
    pub nq: usize,
    pub k: usize,
    projectors: Option<Projectors>,
}

impl<'p, P: BvpProblem> Field<'p, P> {
    pub fn new(problem: &'p P, a: f64) -> Result<Self, Error> {
        let n = problem.ndim();
        let projectors = match problem.singular_term() {
            Some(s) => {
                if s.nrows() != n || s.ncols() != n {
                    return Err(Error::BadSingularTerm {
                        n,
                        rows: s.nrows(),
                        cols: s.ncols(),
                    });
                }
                Some(Projectors::new(s)?)
            }
            None => None,
        };
        Ok(Self {
            problem,
            a,
            n,
            nq: problem.nquads(),
            k: problem.nparams(),
            projectors,
        })
    }

    pub fn projectors(&self) -> Option<&Projectors> {
        self.projectors.as_ref()
    }

    /// The wrapped rhs f̂ at every point of `x`.
    pub fn rhs(&self, x: &[f64], y: MatRef<'_, f64>, p: &[f64]) -> Mat<f64> {
        let mut f = Mat::zeros(self.n, x.len());
        self.problem.rhs(x, y, p, f.as_mut());
        if let Some(proj) = &self.projectors {
            let mut col = vec![0.0; self.n];
            let mut out = vec![0.0; self.n];
            for (j, &xj) in x.iter().enumerate() {
                if xj == self.a {
                    for i in 0..self.n {
                        col[i] = f[(i, j)];
                    }
                    matvec(proj.d.as_ref(), &col, &mut out);
                    for i in 0..self.n {
                        f[(i, j)] = out[i];
                    }
                } else {
                    for i in 0..self.n {
                        col[i] = y[(i, j)];
                    }
                    matvec(proj.s.as_ref(), &col, &mut out);
                    let w = 1.0 / (xj - self.a);
                    for i in 0..self.n {
                        f[(i, j)] += out[i] * w;
                    }
                }
            }
        }
        f
    }

    /// The quadrature rhs at every point of `x`. The singular term does not
    /// touch the quadrature states.
    pub fn quad_rhs(&self, x: &[f64], y: MatRef<'_, f64>, p: &[f64]) -> Mat<f64> {
        let mut g = Mat::zeros(self.nq, x.len());
        self.problem.quad_rhs(x, y, p, g.as_mut());
        g
    }

    /// Jacobians of the wrapped rhs: analytic when the problem supplies
    /// them (the singular term is folded in here), forward differences
    /// through the wrapped rhs otherwise.
    pub fn rhs_jacobians(
        &self,
        x: &[f64],
        y: MatRef<'_, f64>,
        p: &[f64],
        f0: &Mat<f64>,
    ) -> RhsJacobian {
        match self.problem.rhs_jacobian(x, y, p) {
            Some(mut jac) => {
                if let Some(proj) = &self.projectors {
                    for (j, block) in jac.df_dy.iter_mut().enumerate() {
                        if x[j] == self.a {
                            *block = &proj.d * &*block;
                        } else {
                            let w = 1.0 / (x[j] - self.a);
                            for r in 0..self.n {
                                for c in 0..self.n {
                                    block[(r, c)] += proj.s[(r, c)] * w;
                                }
                            }
                        }
                    }
                }
                jac
            }
            None => estimate_grid_jacobian(self.n, self.k, x, y, p, f0, |x, y, p| {
                self.rhs(x, y, p)
            }),
        }
    }

    /// Jacobians of the quadrature rhs, analytic or estimated.
    pub fn quad_jacobians(
        &self,
        x: &[f64],
        y: MatRef<'_, f64>,
        p: &[f64],
        g0: &Mat<f64>,
    ) -> RhsJacobian {
        match self.problem.quad_jacobian(x, y, p) {
            Some(jac) => jac,
            None => estimate_grid_jacobian(self.nq, self.k, x, y, p, g0, |x, y, p| {
                self.quad_rhs(x, y, p)
            }),
        }
    }

    /// Jacobian of the boundary residuals, analytic or estimated.
    pub fn boundary_jacobians(
        &self,
        ya: &[f64],
        qa: &[f64],
        yb: &[f64],
        qb: &[f64],
        p: &[f64],
        bc0: &[f64],
    ) -> BoundaryJacobian {
        match self.problem.boundary_jacobian(ya, qa, yb, qb, p) {
            Some(jac) => jac,
            None => estimate_boundary_jacobian(self.problem, ya, qa, yb, qb, p, bc0),
        }
    }
}
