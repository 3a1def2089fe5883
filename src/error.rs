use faer::linalg::svd::SvdError;
use faer::sparse::CreationError;

/// All errors that can stop a solve before the first collocation iteration.
///
/// Non-convergence is never reported here: running out of mesh nodes or
/// hitting a singular Jacobian mid-solve ends the solve normally and is
/// reported through [`crate::BvpSolution::status`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The mesh needs at least two nodes.
    #[error("the mesh must contain at least 2 nodes, but has {0}")]
    MeshTooShort(usize),
    /// Mesh nodes must be strictly increasing.
    #[error("mesh nodes must be strictly increasing, but node {index} is not above its predecessor")]
    MeshNotIncreasing {
        /// Index of the offending node.
        index: usize,
    },
    /// The initial guess for y disagrees with the problem or the mesh.
    #[error("the initial guess for y must be {rows}x{cols}, but is {actual_rows}x{actual_cols}")]
    BadStateGuess {
        /// Expected row count (the problem's state dimension).
        rows: usize,
        /// Expected column count (the mesh size).
        cols: usize,
        /// Rows of the supplied guess.
        actual_rows: usize,
        /// Columns of the supplied guess.
        actual_cols: usize,
    },
    /// The initial guess for the quadrature grid disagrees with the problem or the mesh.
    #[error("the initial guess for q must be {rows}x{cols}, but is {actual_rows}x{actual_cols}")]
    BadQuadGuess {
        /// Expected row count (the problem's quadrature dimension).
        rows: usize,
        /// Expected column count (the mesh size).
        cols: usize,
        /// Rows of the supplied guess.
        actual_rows: usize,
        /// Columns of the supplied guess.
        actual_cols: usize,
    },
    /// The parameter guess disagrees with the problem's parameter count.
    #[error("the problem declares {expected} unknown parameters, but the guess has {actual}")]
    BadParamGuess {
        /// The problem's parameter count.
        expected: usize,
        /// Length of the supplied guess.
        actual: usize,
    },
    /// The singular term matrix must be square with the state dimension.
    #[error("the singular term matrix must be {n}x{n}, but is {rows}x{cols}")]
    BadSingularTerm {
        /// The problem's state dimension.
        n: usize,
        /// Rows of the supplied matrix.
        rows: usize,
        /// Columns of the supplied matrix.
        cols: usize,
    },
    /// Faer: could not create the sparse collocation Jacobian.
    #[error("could not create the collocation Jacobian: {error}")]
    FaerMatrix {
        /// The underlying faer error.
        #[from]
        error: CreationError,
    },
    /// Faer: could not decompose the singular term matrix.
    #[error("something went wrong doing SVD in faer")]
    FaerSvd(SvdError),
}
