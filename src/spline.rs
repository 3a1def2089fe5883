//! Piecewise cubic reconstruction of the solution.

use faer::{Mat, MatRef};

/// A C¹ piecewise cubic interpolant built from values and first derivatives
/// at the mesh nodes.
///
/// It reproduces both to round-off at the nodes. Evaluation outside the mesh
/// extrapolates with the first or last segment's cubic.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    // Per-segment coefficients of (t − x_j)³ … (t − x_j)⁰, each n×(m−1).
    c0: Mat<f64>,
    c1: Mat<f64>,
    c2: Mat<f64>,
    c3: Mat<f64>,
}

impl CubicSpline {
    pub(crate) fn new(x: &[f64], h: &[f64], y: MatRef<'_, f64>, yp: MatRef<'_, f64>) -> Self {
        let n = y.nrows();
        let m = y.ncols();
        let mut c0 = Mat::zeros(n, m - 1);
        let mut c1 = Mat::zeros(n, m - 1);
        let mut c2 = Mat::zeros(n, m - 1);
        let mut c3 = Mat::zeros(n, m - 1);
        for j in 0..m - 1 {
            for i in 0..n {
                let slope = (y[(i, j + 1)] - y[(i, j)]) / h[j];
                let t = (yp[(i, j)] + yp[(i, j + 1)] - 2.0 * slope) / h[j];
                c0[(i, j)] = t / h[j];
                c1[(i, j)] = (slope - yp[(i, j)]) / h[j] - t;
                c2[(i, j)] = yp[(i, j)];
                c3[(i, j)] = y[(i, j)];
            }
        }
        Self {
            x: x.to_vec(),
            c0,
            c1,
            c2,
            c3,
        }
    }

    /// Dimension of the interpolated vector function.
    pub fn ndim(&self) -> usize {
        self.c0.nrows()
    }

    /// The mesh this spline was built on.
    pub fn breakpoints(&self) -> &[f64] {
        &self.x
    }

    fn segment(&self, t: f64) -> usize {
        // Count of nodes ≤ t, clamped to a valid segment so that points
        // outside the mesh use the end cubics.
        let idx = self.x.partition_point(|&node| node <= t);
        idx.saturating_sub(1).min(self.x.len() - 2)
    }

    /// Value at `t`, one entry per component.
    pub fn value(&self, t: f64) -> Vec<f64> {
        let j = self.segment(t);
        let d = t - self.x[j];
        (0..self.ndim())
            .map(|i| {
                ((self.c0[(i, j)] * d + self.c1[(i, j)]) * d + self.c2[(i, j)]) * d
                    + self.c3[(i, j)]
            })
            .collect()
    }

    /// First derivative at `t`, one entry per component.
    pub fn derivative(&self, t: f64) -> Vec<f64> {
        let j = self.segment(t);
        let d = t - self.x[j];
        (0..self.ndim())
            .map(|i| (3.0 * self.c0[(i, j)] * d + 2.0 * self.c1[(i, j)]) * d + self.c2[(i, j)])
            .collect()
    }

    /// Values at many points, one column per point.
    pub fn values(&self, ts: &[f64]) -> Mat<f64> {
        Mat::from_fn(self.ndim(), ts.len(), |i, col| {
            let j = self.segment(ts[col]);
            let d = ts[col] - self.x[j];
            ((self.c0[(i, j)] * d + self.c1[(i, j)]) * d + self.c2[(i, j)]) * d + self.c3[(i, j)]
        })
    }

    /// First derivatives at many points, one column per point.
    pub fn derivatives(&self, ts: &[f64]) -> Mat<f64> {
        Mat::from_fn(self.ndim(), ts.len(), |i, col| {
            let j = self.segment(ts[col]);
            let d = ts[col] - self.x[j];
            (3.0 * self.c0[(i, j)] * d + 2.0 * self.c1[(i, j)]) * d + self.c2[(i, j)]
        })
    }
}
