//! Small dense helpers for the singular-term projectors.

use faer::{Mat, MatRef};

use crate::error::Error;

/// Moore–Penrose pseudoinverse via a dense SVD.
///
/// Singular values below `max(nrows, ncols) · ε · σ_max` count as zero.
pub(crate) fn pseudoinverse(a: MatRef<'_, f64>) -> Result<Mat<f64>, Error> {
    let svd = a.svd().map_err(Error::FaerSvd)?;
    let u = svd.U();
    let v = svd.V();
    let sigma: Vec<f64> = svd.S().column_vector().iter().copied().collect();

    let sigma_max = sigma.iter().copied().fold(0.0, libm::fmax);
    let cutoff = a.nrows().max(a.ncols()) as f64 * f64::EPSILON * sigma_max;
    let sigma_inv: Vec<f64> = sigma
        .iter()
        .map(|&s| if s > cutoff { 1.0 / s } else { 0.0 })
        .collect();

    // pinv(A) = V Σ⁺ Uᵀ.
    Ok(Mat::from_fn(a.ncols(), a.nrows(), |i, j| {
        let mut acc = 0.0;
        for (r, w) in sigma_inv.iter().enumerate() {
            acc += v.get(i, r) * w * u.get(j, r);
        }
        acc
    }))
}

/// out = A·v for a small dense A.
pub(crate) fn matvec(a: MatRef<'_, f64>, v: &[f64], out: &mut [f64]) {
    for i in 0..a.nrows() {
        let mut acc = 0.0;
        for (j, vj) in v.iter().enumerate() {
            acc += a[(i, j)] * vj;
        }
        out[i] = acc;
    }
}

/// Constants derived from the singular term S, fixed for the whole solve.
pub(crate) struct Projectors {
    /// S itself.
    pub s: Mat<f64>,
    /// B = I − S⁺S. Applying it to y(a) enforces the necessary condition S·y(a) = 0.
    pub b: Mat<f64>,
    /// D = (I − S)⁺. Replaces the rhs at x = a with its regular limit.
    pub d: Mat<f64>,
}

impl Projectors {
    pub fn new(s: Mat<f64>) -> Result<Self, Error> {
        let n = s.nrows();
        let s_pinv = pseudoinverse(s.as_ref())?;
        let sps = &s_pinv * &s;
        let b = Mat::from_fn(n, n, |i, j| {
            let ident = if i == j { 1.0 } else { 0.0 };
            ident - sps[(i, j)]
        });
        let eye_minus_s = Mat::from_fn(n, n, |i, j| {
            let ident = if i == j { 1.0 } else { 0.0 };
            ident - s[(i, j)]
        });
        let d = pseudoinverse(eye_minus_s.as_ref())?;
        Ok(Self { s, b, d })
    }
}
