use crate::operator::LinearOperator;
use crate::SolverError;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};

/// Stopping rule shared by the Krylov solvers: `||r|| <= rtol * ||b||` or `max_iter` updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeSettings<T> {
    pub relative_tolerance: T,
    pub max_iter: usize,
}

impl Default for IterativeSettings<f64> {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-8,
            max_iter: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterativeOutput<T> {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
    /// Norm of the recursively updated residual at termination.
    pub residual_norm: T,
}

/// y = A x, mapping operator failures into [`SolverError::Operator`].
pub(crate) fn apply_operator<T, A>(a: &A, y: &mut DVector<T>, x: DVectorView<T>) -> Result<(), SolverError>
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    let y: DVectorViewMut<T> = y.into();
    a.apply(y, x).map_err(SolverError::Operator)
}

pub(crate) fn check_finite<T: RealField + Copy>(value: T) -> Result<T, SolverError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SolverError::NonFinite)
    }
}
