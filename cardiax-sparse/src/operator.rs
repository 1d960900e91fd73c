use nalgebra::{ClosedAdd, ClosedMul, DMatrix, DVectorView, DVectorViewMut, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;
use std::fmt;

pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T> LinearOperator<T> for DMatrix<T>
where
    T: Scalar + One + Zero + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// y = Ax
pub(crate) fn apply_operator<'a, T, A>(
    y: impl Into<DVectorViewMut<'a, T>>,
    a: &'a A,
    x: impl Into<DVectorView<'a, T>>,
) -> Result<(), Box<dyn Error>>
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    a.apply(y.into(), x.into())
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutput<T> {
    /// Number of iterations of the solver.
    ///
    /// Corresponds to the number of updates made to the (initial) solution vector,
    /// or for GMRES, the number of Krylov basis vectors generated across all restarts.
    pub num_iterations: usize,
    /// The (possibly approximate) norm of the residual `b - Ax` at termination.
    pub residual_norm: T,
}

impl<T> SolveOutput<T> {
    pub(crate) fn new(residual_norm: T) -> Self {
        Self {
            num_iterations: 0,
            residual_norm,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    StoppingCriterionError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    /// A scalar the method divides by vanished, so no further progress is possible.
    Breakdown,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::StoppingCriterionError(err) => {
                write!(f, "Error evaluating stopping criterion: ")?;
                err.fmt(f)
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite."),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner."),
            Self::Breakdown => write!(f, "Method broke down."),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError<T> {
    pub method: &'static str,
    pub output: SolveOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> SolveError<T> {
    pub(crate) fn new(method: &'static str, output: SolveOutput<T>, kind: SolveErrorKind) -> Self {
        Self { method, output, kind }
    }
}

impl<T> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} solve failed after {} iterations. Error: {}",
            self.method, self.output.num_iterations, self.kind
        )
    }
}

impl<T: fmt::Debug> Error for SolveError<T> {}
