//! Right-preconditioned BiCGStab for general non-symmetric systems.
use crate::operator::{apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput};
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField};

const METHOD: &str = "BiCGStab";

#[derive(Debug)]
pub struct BiCgStab<A, P, T> {
    operator: A,
    preconditioner: P,
    tolerance: T,
    max_iter: Option<usize>,
}

impl BiCgStab<(), IdentityOperator, f64> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            tolerance: 1e-8,
            max_iter: None,
        }
    }
}

impl Default for BiCgStab<(), IdentityOperator, f64> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T> BiCgStab<(), P, T> {
    pub fn with_operator<A>(self, operator: A) -> BiCgStab<A, P, T> {
        BiCgStab {
            operator,
            preconditioner: self.preconditioner,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }
}

impl<A, P, T> BiCgStab<A, P, T> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiCgStab<A, P2, T> {
        BiCgStab {
            operator: self.operator,
            preconditioner,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }

    /// Sets the relative residual tolerance `||b - Ax|| <= tol * ||b||`.
    pub fn with_tolerance<T2>(self, tolerance: T2) -> BiCgStab<A, P, T2> {
        BiCgStab {
            operator: self.operator,
            preconditioner: self.preconditioner,
            tolerance,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<A, P, T> BiCgStab<A, P, T>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    pub fn solve_with_guess<'b>(
        &self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<SolveOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<SolveOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());
        let n = b.len();

        let b_norm = b.norm();
        let mut output = SolveOutput::new(b_norm);
        if b_norm == T::zero() {
            x.fill(T::zero());
            output.residual_norm = T::zero();
            return Ok(output);
        }
        let target = self.tolerance * b_norm;

        // r = b - Ax
        let mut r = DVector::zeros(n);
        if let Err(err) = apply_operator(&mut r, &self.operator, &x) {
            return Err(SolveError::new(METHOD, output, OperatorError(err)));
        }
        r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);
        output.residual_norm = r.norm();

        let r_hat = r.clone();
        let mut p = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        let mut s = DVector::zeros(n);
        let mut t = DVector::zeros(n);
        let mut p_hat = DVector::zeros(n);
        let mut s_hat = DVector::zeros(n);

        let mut rho = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();

        loop {
            if output.residual_norm <= target {
                break;
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(METHOD, output, MaxIterationsReached { max_iter }));
                }
            }

            let rho_prev = rho;
            rho = r_hat.dot(&r);
            if rho == T::zero() {
                return Err(SolveError::new(METHOD, output, Breakdown));
            }

            if output.num_iterations == 0 {
                p.copy_from(&r);
            } else {
                let beta = (rho / rho_prev) * (alpha / omega);
                // p <- r + beta (p - omega v)
                p.axpy(-omega, &v, T::one());
                p.axpy(T::one(), &r, beta);
            }

            if let Err(err) = apply_operator(&mut p_hat, &self.preconditioner, &p) {
                return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut v, &self.operator, &p_hat) {
                return Err(SolveError::new(METHOD, output, OperatorError(err)));
            }

            let rhat_v = r_hat.dot(&v);
            if rhat_v == T::zero() {
                return Err(SolveError::new(METHOD, output, Breakdown));
            }
            alpha = rho / rhat_v;

            // s = r - alpha v
            s.copy_from(&r);
            s.axpy(-alpha, &v, T::one());

            let s_norm = s.norm();
            if s_norm <= target {
                x.axpy(alpha, &p_hat, T::one());
                output.num_iterations += 1;
                output.residual_norm = s_norm;
                break;
            }

            if let Err(err) = apply_operator(&mut s_hat, &self.preconditioner, &s) {
                return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut t, &self.operator, &s_hat) {
                return Err(SolveError::new(METHOD, output, OperatorError(err)));
            }

            let t_t = t.dot(&t);
            if t_t == T::zero() {
                return Err(SolveError::new(METHOD, output, Breakdown));
            }
            omega = t.dot(&s) / t_t;

            x.axpy(alpha, &p_hat, T::one());
            x.axpy(omega, &s_hat, T::one());
            r.copy_from(&s);
            r.axpy(-omega, &t, T::one());

            output.num_iterations += 1;
            output.residual_norm = r.norm();

            if omega == T::zero() && output.residual_norm > target {
                return Err(SolveError::new(METHOD, output, Breakdown));
            }
        }

        Ok(output)
    }
}
