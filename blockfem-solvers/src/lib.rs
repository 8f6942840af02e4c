//! Linear solver backends for block-structured finite element systems.
//!
//! The entry point is the [`SolverBackend`] trait, which solves a square system given as a
//! [`CsrMatrix`] together with [`SolverOptions`]. [`DefaultBackend`] dispatches to a sparse LU
//! or sparse Cholesky factorization, or to preconditioned Conjugate Gradient / BiCGStab.
pub mod bicgstab;
pub mod cg;
pub mod direct;
pub mod iterative;
pub mod operator;
pub mod options;

mod error;

pub use error::SolverError;
pub use iterative::{IterativeOutput, IterativeSettings};
pub use options::{KrylovMethod, PreconditionerType, SolverOptions};

use crate::bicgstab::BiCgStab;
use crate::cg::ConjugateGradient;
use crate::operator::{IdentityOperator, JacobiPreconditioner, LinearOperator};
use log::{debug, info};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

/// A linear solver for square sparse systems `A x = b`.
pub trait SolverBackend {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
        options: &SolverOptions,
    ) -> Result<DVector<f64>, SolverError>;
}

impl<'a, B: ?Sized + SolverBackend> SolverBackend for &'a B {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
        options: &SolverOptions,
    ) -> Result<DVector<f64>, SolverError> {
        <B as SolverBackend>::solve(self, matrix, rhs, options)
    }
}

/// The solvers shipped with this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackend;

impl SolverBackend for DefaultBackend {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
        options: &SolverOptions,
    ) -> Result<DVector<f64>, SolverError> {
        direct::check_dimensions(matrix, rhs)?;
        debug!(
            "Solving {n}x{n} system ({nnz} non-zeros) with ksp_type={method}, pc_type={pc}",
            n = matrix.nrows(),
            nnz = matrix.nnz(),
            method = options.method,
            pc = options.preconditioner
        );
        if let Some(package) = &options.factorization_package {
            debug!("Factorization package {package:?} requested, using built-in factorization");
        }

        let invalid_combination = || SolverError::InvalidOption {
            key: "pc_type".to_string(),
            value: options.preconditioner.to_string(),
        };

        let solution = match options.method {
            KrylovMethod::Preonly => match options.preconditioner {
                PreconditionerType::Lu => direct::solve_lu(matrix, rhs)?,
                PreconditionerType::Cholesky => direct::solve_cholesky(matrix, rhs)?,
                PreconditionerType::None | PreconditionerType::Jacobi => return Err(invalid_combination()),
            },
            KrylovMethod::Cg | KrylovMethod::Bcgs => {
                let jacobi;
                let preconditioner: &dyn LinearOperator<f64> = match options.preconditioner {
                    PreconditionerType::None => &IdentityOperator,
                    PreconditionerType::Jacobi => {
                        jacobi = JacobiPreconditioner::from_csr(matrix);
                        &jacobi
                    }
                    PreconditionerType::Lu | PreconditionerType::Cholesky => return Err(invalid_combination()),
                };
                let settings = IterativeSettings {
                    relative_tolerance: options.relative_tolerance,
                    max_iter: options.max_iterations,
                };
                let mut x = DVector::zeros(rhs.len());
                let output = if options.method == KrylovMethod::Cg {
                    ConjugateGradient::new(settings).solve_with_guess(matrix, preconditioner, rhs, &mut x)?
                } else {
                    BiCgStab::new(settings).solve_with_guess(matrix, preconditioner, rhs, &mut x)?
                };
                info!(
                    "{} converged in {} iterations (residual norm {:.3e})",
                    options.method, output.num_iterations, output.residual_norm
                );
                direct::ensure_finite(x)?
            }
        };
        Ok(solution)
    }
}
