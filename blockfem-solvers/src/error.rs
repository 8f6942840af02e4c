use std::error::Error;
use thiserror::Error;

/// Failure of a linear solve.
///
/// Every variant maps to a negative diagnostic code through [`SolverError::code`], following the
/// "converged reason" numbering of PETSc Krylov solvers so that callers used to that convention
/// can interpret failures directly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolverError {
    #[error("invalid solver option {key} = {value:?}")]
    InvalidOption { key: String, value: String },
    #[error("dimension mismatch: {nrows}x{ncols} operator with right-hand side of length {rhs_len}")]
    DimensionMismatch { nrows: usize, ncols: usize, rhs_len: usize },
    #[error("maximum number of iterations ({max_iter}) reached")]
    MaxIterationsReached { max_iter: usize },
    #[error("breakdown in iterative method")]
    Breakdown,
    #[error("preconditioner appears to be indefinite")]
    IndefinitePreconditioner,
    #[error("solution or residual is not finite")]
    NonFinite,
    #[error("operator appears to be indefinite")]
    IndefiniteOperator,
    #[error("factorization failed: matrix is singular")]
    SingularMatrix,
    #[error("factorization failed: matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("error applying operator: {0}")]
    Operator(Box<dyn Error + Send + Sync>),
}

impl SolverError {
    /// Negative diagnostic code of this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidOption { .. } | Self::DimensionMismatch { .. } => -1,
            Self::Operator(_) => -2,
            Self::MaxIterationsReached { .. } => -3,
            Self::Breakdown => -5,
            Self::IndefinitePreconditioner => -8,
            Self::NonFinite => -9,
            Self::IndefiniteOperator => -10,
            Self::SingularMatrix | Self::NotPositiveDefinite => -11,
        }
    }
}
