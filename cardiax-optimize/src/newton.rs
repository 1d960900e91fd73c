use crate::calculus::DifferentiableVectorFunction;
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    /// Absolute tolerance on the residual, `|F(u)|_2 <= tolerance`.
    pub tolerance: T,
    /// Tolerance on the residual relative to the residual of the initial guess.
    pub relative_tolerance: Option<T>,
    /// Tolerance on the norm of the most recent increment.
    pub increment_tolerance: Option<T>,
}

impl<T> NewtonSettings<T> {
    pub fn new(tolerance: T) -> Self {
        Self {
            max_iterations: None,
            tolerance,
            relative_tolerance: None,
            increment_tolerance: None,
        }
    }

    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
            ..self
        }
    }

    pub fn with_relative_tolerance(self, relative_tolerance: T) -> Self {
        Self {
            relative_tolerance: Some(relative_tolerance),
            ..self
        }
    }

    pub fn with_increment_tolerance(self, increment_tolerance: T) -> Self {
        Self {
            increment_tolerance: Some(increment_tolerance),
            ..self
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NewtonState {
    Assembling,
    LinearSolve,
    Updating,
    Converged,
    Diverged,
}

impl NewtonState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NewtonState::Converged | NewtonState::Diverged)
    }
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(Box<dyn Error>),
    /// The residual contained NaN or infinite entries.
    NonFiniteResidual { iteration: usize },
    /// The linear solve produced an increment with NaN or infinite entries.
    NonFiniteIncrement { iteration: usize },
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            &NewtonError::JacobianError(ref err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            &NewtonError::NonFiniteResidual { iteration } => {
                write!(f, "Residual is not finite at iteration {}.", iteration)
            }
            &NewtonError::NonFiniteIncrement { iteration } => {
                write!(f, "Increment is not finite at iteration {}.", iteration)
            }
        }
    }
}

impl Error for NewtonError {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonOutput<T> {
    /// Number of updates made to the solution vector.
    pub iterations: usize,
    pub residual_norm: T,
    pub initial_residual_norm: T,
}

/// Newton-Raphson iteration for the non-linear equation `F(u) = 0`.
///
/// The iteration is driven one state transition at a time by [`NewtonSolver::advance`]:
///
/// ```text
/// Assembling -> LinearSolve -> Updating -> Assembling -> ... -> Converged
///                                                            \-> Diverged
/// ```
///
/// The solver owns its residual and increment buffers, so repeated solves with the same
/// solver do not allocate.
#[derive(Debug)]
pub struct NewtonSolver<T: Scalar, F> {
    function: F,
    settings: NewtonSettings<T>,
    state: NewtonState,
    iteration: usize,
    residual: DVector<T>,
    minus_dx: DVector<T>,
    residual_norm: T,
    initial_residual_norm: T,
    increment_norm: Option<T>,
}

impl<T, F> NewtonSolver<T, F>
where
    T: RealField + Copy,
    F: DifferentiableVectorFunction<T>,
{
    pub fn new(function: F, settings: NewtonSettings<T>) -> Self {
        let n = function.dimension();
        Self {
            function,
            settings,
            state: NewtonState::Assembling,
            iteration: 0,
            residual: DVector::zeros(n),
            minus_dx: DVector::zeros(n),
            residual_norm: T::zero(),
            initial_residual_norm: T::zero(),
            increment_norm: None,
        }
    }

    pub fn state(&self) -> NewtonState {
        self.state
    }

    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn function_mut(&mut self) -> &mut F {
        &mut self.function
    }

    pub fn into_function(self) -> F {
        self.function
    }

    pub fn settings(&self) -> &NewtonSettings<T> {
        &self.settings
    }

    /// Prepares the solver for a new solve starting at `x`.
    pub fn reset(&mut self, x: &DVectorView<T>) {
        let n = self.function.dimension();
        assert_eq!(x.len(), n, "Initial guess must have the dimension of the function");
        self.residual.resize_vertically_mut(n, T::zero());
        self.minus_dx.resize_vertically_mut(n, T::zero());
        self.state = NewtonState::Assembling;
        self.iteration = 0;
        self.residual_norm = T::zero();
        self.initial_residual_norm = T::zero();
        self.increment_norm = None;
        self.function.synchronize(x);
    }

    fn has_converged(&self) -> bool {
        if self.residual_norm <= self.settings.tolerance {
            return true;
        }
        if self.iteration > 0 {
            if let Some(rtol) = self.settings.relative_tolerance {
                if self.residual_norm <= rtol * self.initial_residual_norm {
                    return true;
                }
            }
            if let (Some(inc_tol), Some(inc_norm)) = (self.settings.increment_tolerance, self.increment_norm) {
                if inc_norm <= inc_tol {
                    return true;
                }
            }
        }
        false
    }

    fn diverge(&mut self, error: NewtonError) -> Result<NewtonState, NewtonError> {
        self.state = NewtonState::Diverged;
        Err(error)
    }

    /// Performs a single state transition and returns the new state.
    ///
    /// Entering `Diverged` is reported as an error. Terminal states are left unchanged.
    pub fn advance<'a>(&mut self, x: impl Into<DVectorViewMut<'a, T>>) -> Result<NewtonState, NewtonError> {
        let mut x = x.into();
        match self.state {
            NewtonState::Assembling => {
                self.function
                    .eval_into(&mut DVectorViewMut::from(&mut self.residual), &DVectorView::from(&x));
                if self.residual.iter().any(|r_i| !r_i.is_finite()) {
                    return self.diverge(NewtonError::NonFiniteResidual {
                        iteration: self.iteration,
                    });
                }
                self.residual_norm = self.residual.norm();
                if self.iteration == 0 {
                    self.initial_residual_norm = self.residual_norm;
                }
                debug!("Newton iteration {}: residual norm {}", self.iteration, self.residual_norm);

                if self.has_converged() {
                    self.state = NewtonState::Converged;
                } else if self
                    .settings
                    .max_iterations
                    .map(|max_iter| self.iteration >= max_iter)
                    .unwrap_or(false)
                {
                    return self.diverge(NewtonError::MaximumIterationsReached(self.iteration));
                } else {
                    self.state = NewtonState::LinearSolve;
                }
            }
            NewtonState::LinearSolve => {
                // Solve the system J dx = -f   <=>   J (-dx) = f
                self.minus_dx.fill(T::zero());
                let j_result = self.function.solve_jacobian_system(
                    &mut DVectorViewMut::from(&mut self.minus_dx),
                    &DVectorView::from(&x),
                    &DVectorView::from(&self.residual),
                    self.iteration,
                );
                if let Err(err) = j_result {
                    return self.diverge(NewtonError::JacobianError(err));
                }
                if self.minus_dx.iter().any(|dx_i| !dx_i.is_finite()) {
                    return self.diverge(NewtonError::NonFiniteIncrement {
                        iteration: self.iteration,
                    });
                }
                self.state = NewtonState::Updating;
            }
            NewtonState::Updating => {
                x.axpy(-T::one(), &self.minus_dx, T::one());
                let increment_norm = self.minus_dx.norm();
                debug!("Newton iteration {}: increment norm {}", self.iteration, increment_norm);
                self.increment_norm = Some(increment_norm);
                self.iteration += 1;
                self.function.synchronize(&DVectorView::from(&x));
                self.state = NewtonState::Assembling;
            }
            NewtonState::Converged | NewtonState::Diverged => {}
        }
        Ok(self.state)
    }

    /// Runs the iteration from the initial guess `x` until it converges or diverges.
    pub fn solve<'a>(&mut self, x: impl Into<DVectorViewMut<'a, T>>) -> Result<NewtonOutput<T>, NewtonError> {
        let mut x = x.into();
        self.reset(&DVectorView::from(&x));
        while !self.advance(DVectorViewMut::from(&mut x))?.is_terminal() {}
        Ok(NewtonOutput {
            iterations: self.iteration,
            residual_norm: self.residual_norm,
            initial_residual_norm: self.initial_residual_norm,
        })
    }
}

/// Attempts to solve the non-linear equation F(u) = 0, starting from the initial guess stored in `x`.
///
/// On success, `x` holds the solution.
pub fn newton<'a, T, F>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<NewtonOutput<T>, NewtonError>
where
    T: RealField + Copy,
    F: DifferentiableVectorFunction<T>,
{
    NewtonSolver::new(function, settings).solve(x)
}
