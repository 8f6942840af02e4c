//! Direct (factorization based) solves.
use crate::SolverError;
use faer::solvers::SpSolver;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Normwise backward error above which an LU solution is rejected.
const LU_BACKWARD_ERROR_TOLERANCE: f64 = 1e-8;

/// Solves `A x = b` with a sparse LU factorization with partial pivoting.
///
/// Works for general square systems, including indefinite saddle point systems for which
/// Cholesky is not applicable. The matrix is never densified. Structurally singular matrices,
/// as well as numerically singular ones (detected through a non-finite solution or a normwise
/// backward error `|b - A x| / (|A| |x| + |b|)` exceeding `1e-8`), are reported as
/// [`SolverError::SingularMatrix`].
pub fn solve_lu(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
    check_dimensions(matrix, rhs)?;
    let n = matrix.nrows();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }
    if !matrix.values().iter().chain(rhs.iter()).all(|v| v.is_finite()) {
        return Err(SolverError::NonFinite);
    }

    let (col_offsets, row_indices, values) = CscMatrix::from(matrix).disassemble();
    let symbolic = SymbolicSparseColMat::new_checked(n, n, col_offsets, None, row_indices);
    let lu = SparseColMat::new(symbolic, values).sp_lu().map_err(|err| {
        debug!("Sparse LU factorization failed: {err:?}");
        SolverError::SingularMatrix
    })?;
    let solution = DVector::from_vec(
        lu.solve(faer::col::from_slice(rhs.as_slice()))
            .as_slice()
            .to_vec(),
    );
    if !solution.iter().all(|x_i| x_i.is_finite()) {
        return Err(SolverError::SingularMatrix);
    }

    let backward_error = backward_error(matrix, &solution, rhs);
    if backward_error > LU_BACKWARD_ERROR_TOLERANCE {
        debug!("Rejecting LU solution with backward error {backward_error:e}");
        return Err(SolverError::SingularMatrix);
    }
    Ok(solution)
}

/// `|b - A x|_inf / (|A|_inf |x|_inf + |b|_inf)`, zero for the trivial system.
fn backward_error(matrix: &CsrMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let mut residual_norm: f64 = 0.0;
    let mut matrix_norm: f64 = 0.0;
    for (i, row) in matrix.row_iter().enumerate() {
        let (cols, values) = (row.col_indices(), row.values());
        let a_x: f64 = cols.iter().zip(values).map(|(&j, a_ij)| a_ij * x[j]).sum();
        residual_norm = residual_norm.max((b[i] - a_x).abs());
        matrix_norm = matrix_norm.max(values.iter().map(|a_ij| a_ij.abs()).sum());
    }
    let scale = matrix_norm * x.amax() + b.amax();
    if scale == 0.0 {
        0.0
    } else {
        residual_norm / scale
    }
}

/// Solves `A x = b` with a sparse Cholesky factorization.
///
/// Only the values of `matrix` are used; the caller is responsible for symmetry.
pub fn solve_cholesky(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
    check_dimensions(matrix, rhs)?;
    if matrix.nrows() == 0 {
        return Ok(DVector::zeros(0));
    }

    let csc = CscMatrix::from(matrix);
    let cholesky = CscCholesky::factor(&csc).map_err(|_| SolverError::NotPositiveDefinite)?;
    let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
    let solution = cholesky.solve(&b);
    ensure_finite(solution.column(0).into_owned())
}

pub(crate) fn check_dimensions(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<(), SolverError> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        Err(SolverError::DimensionMismatch {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            rhs_len: rhs.len(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn ensure_finite(solution: DVector<f64>) -> Result<DVector<f64>, SolverError> {
    if solution.iter().all(|x_i| x_i.is_finite()) {
        Ok(solution)
    } else {
        Err(SolverError::NonFinite)
    }
}
