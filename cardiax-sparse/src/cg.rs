//! Preconditioned Conjugate Gradient for symmetric positive definite systems.
use crate::operator::{apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput};
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use num::Zero;
use std::ops::{Deref, DerefMut};

pub trait CgStoppingCriterion<T: Scalar> {
    /// Called by CG at the start of a new solve.
    fn reset(&self, _a: &dyn LinearOperator<T>, _x: DVectorView<T>, _b: DVectorView<T>) {}

    fn has_converged(
        &self,
        a: &dyn LinearOperator<T>,
        x: DVectorView<T>,
        b: DVectorView<T>,
        b_norm: T,
        iteration: usize,
        approx_residual: DVectorView<T>,
    ) -> Result<bool, SolveErrorKind>;
}

/// Relative residual tolerance ||r|| <= tol * ||b||.
///
/// Note that we use the *approximate* residual given by Conjugate-Gradient. For ill-conditioned
/// problems, it is possible that CG's residual converges, but the real residual does not.
#[derive(Debug, Clone, Copy)]
pub struct RelativeResidualCriterion<T: Scalar> {
    tol: T,
}

impl<T: Scalar> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<T> CgStoppingCriterion<T> for RelativeResidualCriterion<T>
where
    T: RealField,
{
    fn has_converged(
        &self,
        _a: &dyn LinearOperator<T>,
        _x: DVectorView<T>,
        _b: DVectorView<T>,
        b_norm: T,
        _iteration: usize,
        approx_residual: DVectorView<T>,
    ) -> Result<bool, SolveErrorKind> {
        let r_approx_norm = approx_residual.norm();
        let converged = r_approx_norm <= self.tol.clone() * b_norm;
        Ok(converged)
    }
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

#[allow(non_snake_case)]
struct Buffers<'a, T: Scalar> {
    r: &'a mut DVector<T>,
    z: &'a mut DVector<T>,
    p: &'a mut DVector<T>,
    Ap: &'a mut DVector<T>,
}

impl<T: Scalar + Zero> Default for CgWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> CgWorkspace<T> {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers<'_, T> {
        self.r.resize_vertically_mut(dim, T::zero());
        self.z.resize_vertically_mut(dim, T::zero());
        self.p.resize_vertically_mut(dim, T::zero());
        self.Ap.resize_vertically_mut(dim, T::zero());
        Buffers {
            r: &mut self.r,
            z: &mut self.z,
            p: &mut self.p,
            Ap: &mut self.Ap,
        }
    }
}

#[derive(Debug)]
enum OwnedOrMutRef<'a, T> {
    Owned(T),
    MutRef(&'a mut T),
}

impl<'a, T> Deref for OwnedOrMutRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

impl<'a, T> DerefMut for OwnedOrMutRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

#[derive(Debug)]
pub struct ConjugateGradient<'a, T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: OwnedOrMutRef<'a, CgWorkspace<T>>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl<'a, T: Scalar + Zero> ConjugateGradient<'a, T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: OwnedOrMutRef::Owned(CgWorkspace::default()),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar> ConjugateGradient<'a, T, (), IdentityOperator, ()> {
    pub fn with_workspace(workspace: &'a mut CgWorkspace<T>) -> Self {
        Self {
            workspace: OwnedOrMutRef::MutRef(workspace),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar, P, Criterion> ConjugateGradient<'a, T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T: Scalar, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<'a, T, A, P2, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
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

impl<'a, T: Scalar, A, P> ConjugateGradient<'a, T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(
        self,
        stopping_criterion: Criterion,
    ) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

const METHOD: &str = "CG";

impl<'a, T, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: CgStoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<SolveOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    #[allow(non_snake_case)]
    fn solve_with_guess_(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<SolveOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let b_norm = b.norm();
        let mut output = SolveOutput::new(b_norm);

        if b_norm == T::zero() {
            x.fill(T::zero());
            output.residual_norm = T::zero();
            return Ok(output);
        }

        let Buffers { r, z, p, Ap } = self.workspace.prepare_buffers(x.len());

        // r = b - Ax
        if let Err(err) = apply_operator(&mut *r, &self.operator, &x) {
            return Err(SolveError::new(METHOD, output, OperatorError(err)));
        }
        r.zip_apply(&b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);

        // z = Pr
        if let Err(err) = apply_operator(&mut *z, &self.preconditioner, &*r) {
            return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
        }

        // p = z
        p.copy_from(z);

        let mut zTr = z.dot(r);
        let mut pAp;

        self.stopping_criterion
            .reset(&self.operator, DVectorView::from(&x), DVectorView::from(&b));

        loop {
            output.residual_norm = r.norm();
            let convergence = self.stopping_criterion.has_converged(
                &self.operator,
                DVectorView::from(&x),
                DVectorView::from(&b),
                b_norm,
                output.num_iterations,
                DVectorView::from(&*r),
            );

            let has_converged = match convergence {
                Ok(converged) => converged,
                Err(error_kind) => return Err(SolveError::new(METHOD, output, error_kind)),
            };

            if has_converged {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(METHOD, output, MaxIterationsReached { max_iter }));
                }
            }

            // Ap = A * p
            if let Err(err) = apply_operator(&mut *Ap, &self.operator, &*p) {
                return Err(SolveError::new(METHOD, output, OperatorError(err)));
            }
            pAp = p.dot(Ap);

            if pAp <= T::zero() {
                return Err(SolveError::new(METHOD, output, IndefiniteOperator));
            }
            if zTr <= T::zero() {
                return Err(SolveError::new(METHOD, output, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            // x <- x + alpha * p
            x.zip_apply(&*p, |x_i, p_i| *x_i += alpha * p_i);
            // r <- r - alpha * Ap
            r.zip_apply(&*Ap, |r_i, Ap_i| *r_i -= alpha * Ap_i);

            // Number of iterations corresponds to number of updates to the x vector
            output.num_iterations += 1;

            // z <- P r
            if let Err(err) = apply_operator(&mut *z, &self.preconditioner, &*r) {
                return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
            }
            let zTr_next = z.dot(r);
            let beta = zTr_next / zTr;

            // p <- z + beta * p
            p.zip_apply(&*z, |p_i, z_i| *p_i = z_i + beta * *p_i);

            zTr = zTr_next;
        }

        Ok(output)
    }
}
