//! Preconditioned Conjugate Gradient for symmetric positive definite operators.
use crate::iterative::{apply_operator, check_finite, IterativeOutput, IterativeSettings};
use crate::operator::LinearOperator;
use crate::SolverError;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

impl<T: RealField + Copy> CgWorkspace<T> {
    fn new() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }

    fn resize(&mut self, dim: usize) {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, T::zero());
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConjugateGradient<T: Scalar> {
    settings: IterativeSettings<T>,
    workspace: CgWorkspace<T>,
}

impl<T: RealField + Copy> ConjugateGradient<T> {
    pub fn new(settings: IterativeSettings<T>) -> Self {
        Self {
            settings,
            workspace: CgWorkspace::new(),
        }
    }

    pub fn settings(&self) -> &IterativeSettings<T> {
        &self.settings
    }

    /// Solves `A x = b` starting from the current contents of `x`.
    ///
    /// `preconditioner` applies an approximation of `A^{-1}`.
    #[allow(non_snake_case)]
    pub fn solve_with_guess<'b>(
        &mut self,
        operator: &dyn LinearOperator<T>,
        preconditioner: &dyn LinearOperator<T>,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<IterativeOutput<T>, SolverError> {
        let b = b.into();
        let mut x = x.into();
        if b.len() != x.len() {
            return Err(SolverError::DimensionMismatch {
                nrows: x.len(),
                ncols: x.len(),
                rhs_len: b.len(),
            });
        }

        let IterativeSettings {
            relative_tolerance,
            max_iter,
        } = self.settings;
        self.workspace.resize(x.len());
        let CgWorkspace { r, z, p, Ap } = &mut self.workspace;

        let b_norm = check_finite(b.norm())?;
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(IterativeOutput {
                num_iterations: 0,
                residual_norm: T::zero(),
            });
        }

        // r = b - Ax
        apply_operator(operator, r, (&x).into())?;
        r.neg_mut();
        r.axpy(T::one(), &b, T::one());

        // z = Pr, p = z
        apply_operator(preconditioner, z, (&*r).into())?;
        p.copy_from(&*z);
        let mut zTr = z.dot(&*r);

        let mut num_iterations = 0;
        loop {
            let r_norm = check_finite(r.norm())?;
            if r_norm <= relative_tolerance * b_norm {
                return Ok(IterativeOutput {
                    num_iterations,
                    residual_norm: r_norm,
                });
            }
            if num_iterations >= max_iter {
                return Err(SolverError::MaxIterationsReached { max_iter });
            }

            apply_operator(operator, Ap, (&*p).into())?;
            let pAp = p.dot(&*Ap);
            if pAp <= T::zero() {
                return Err(SolverError::IndefiniteOperator);
            }
            if zTr <= T::zero() {
                return Err(SolverError::IndefinitePreconditioner);
            }

            let alpha = zTr / pAp;
            x.axpy(alpha, &*p, T::one());
            r.axpy(-alpha, &*Ap, T::one());
            num_iterations += 1;

            apply_operator(preconditioner, z, (&*r).into())?;
            let zTr_next = z.dot(&*r);
            let beta = zTr_next / zTr;
            // p <- z + beta p
            p.axpy(T::one(), &*z, beta);
            zTr = zTr_next;
        }
    }
}
