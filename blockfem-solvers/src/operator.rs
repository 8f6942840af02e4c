use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

pub type OperatorResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A linear map `y = A x` on vectors of a fixed dimension.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T: RealField + Copy> LinearOperator<T> for DMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T: RealField + Copy> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult {
        if self.nrows() != y.len() || self.ncols() != x.len() {
            return Err(format!(
                "cannot apply {}x{} matrix to vector of length {} (output length {})",
                self.nrows(),
                self.ncols(),
                x.len(),
                y.len()
            )
            .into());
        }
        for (i, row) in self.row_iter().enumerate() {
            let mut sum = T::zero();
            for (&j, &a_ij) in row.col_indices().iter().zip(row.values()) {
                sum += a_ij * x[j];
            }
            y[i] = sum;
        }
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult {
        y.copy_from(&x);
        Ok(())
    }
}

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
///
/// Zero diagonal entries are replaced by one.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField + Copy> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let mut inverse_diagonal = DVector::repeat(matrix.nrows(), T::one());
        for (i, row) in matrix.row_iter().enumerate() {
            if let Some(a_ii) = row.get_entry(i).map(|entry| entry.into_value()) {
                if a_ii != T::zero() {
                    inverse_diagonal[i] = T::one() / a_ii;
                }
            }
        }
        Self { inverse_diagonal }
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField + Copy> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> OperatorResult {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
        Ok(())
    }
}
