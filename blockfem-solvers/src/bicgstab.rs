//! Right-preconditioned BiCGStab for general (nonsymmetric) operators.
use crate::iterative::{apply_operator, check_finite, IterativeOutput, IterativeSettings};
use crate::operator::LinearOperator;
use crate::SolverError;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};

#[derive(Debug, Clone)]
struct BiCgStabWorkspace<T: Scalar> {
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    v: DVector<T>,
    s: DVector<T>,
    t: DVector<T>,
    y: DVector<T>,
    z: DVector<T>,
}

impl<T: RealField + Copy> BiCgStabWorkspace<T> {
    fn with_dim(dim: usize) -> Self {
        Self {
            r: DVector::zeros(dim),
            r_hat: DVector::zeros(dim),
            p: DVector::zeros(dim),
            v: DVector::zeros(dim),
            s: DVector::zeros(dim),
            t: DVector::zeros(dim),
            y: DVector::zeros(dim),
            z: DVector::zeros(dim),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BiCgStab<T: Scalar> {
    settings: IterativeSettings<T>,
}

impl<T: RealField + Copy> BiCgStab<T> {
    pub fn new(settings: IterativeSettings<T>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IterativeSettings<T> {
        &self.settings
    }

    /// Solves `A x = b` starting from the current contents of `x`.
    pub fn solve_with_guess<'b>(
        &self,
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

        let b_norm = check_finite(b.norm())?;
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(IterativeOutput {
                num_iterations: 0,
                residual_norm: T::zero(),
            });
        }
        let tolerance = relative_tolerance * b_norm;

        let BiCgStabWorkspace {
            mut r,
            mut r_hat,
            mut p,
            mut v,
            mut s,
            mut t,
            mut y,
            mut z,
        } = BiCgStabWorkspace::with_dim(x.len());

        // r = b - Ax
        apply_operator(operator, &mut r, (&x).into())?;
        r.neg_mut();
        r.axpy(T::one(), &b, T::one());
        r_hat.copy_from(&r);

        let (mut rho_prev, mut alpha, mut omega) = (T::one(), T::one(), T::one());
        let mut num_iterations = 0;
        loop {
            let r_norm = check_finite(r.norm())?;
            if r_norm <= tolerance {
                return Ok(IterativeOutput {
                    num_iterations,
                    residual_norm: r_norm,
                });
            }
            if num_iterations >= max_iter {
                return Err(SolverError::MaxIterationsReached { max_iter });
            }

            let rho = r_hat.dot(&r);
            if rho == T::zero() || omega == T::zero() {
                return Err(SolverError::Breakdown);
            }
            let beta = (rho / rho_prev) * (alpha / omega);
            // p <- r + beta (p - omega v)
            p.axpy(-omega, &v, T::one());
            p.axpy(T::one(), &r, beta);

            apply_operator(preconditioner, &mut y, (&p).into())?;
            apply_operator(operator, &mut v, (&y).into())?;
            let r_hat_v = r_hat.dot(&v);
            if r_hat_v == T::zero() {
                return Err(SolverError::Breakdown);
            }
            alpha = rho / r_hat_v;

            // s <- r - alpha v
            s.copy_from(&r);
            s.axpy(-alpha, &v, T::one());
            let s_norm = check_finite(s.norm())?;
            if s_norm <= tolerance {
                x.axpy(alpha, &y, T::one());
                return Ok(IterativeOutput {
                    num_iterations: num_iterations + 1,
                    residual_norm: s_norm,
                });
            }

            apply_operator(preconditioner, &mut z, (&s).into())?;
            apply_operator(operator, &mut t, (&z).into())?;
            let t_t = t.dot(&t);
            if t_t == T::zero() {
                return Err(SolverError::Breakdown);
            }
            omega = t.dot(&s) / t_t;

            x.axpy(alpha, &y, T::one());
            x.axpy(omega, &z, T::one());
            // r <- s - omega t
            r.copy_from(&s);
            r.axpy(-omega, &t, T::one());

            rho_prev = rho;
            num_iterations += 1;
        }
    }
}
