//! Preconditioned Krylov solution of the assembled linear systems.
use cardiax_sparse::bicgstab::BiCgStab;
use cardiax_sparse::cg::{ConjugateGradient, RelativeResidualCriterion};
use cardiax_sparse::gmres::Gmres;
use cardiax_sparse::precondition::{Ilu0, Jacobi, PreconditionerError, Ssor};
use cardiax_sparse::{CsrMatrix, IdentityOperator, LinearOperator, SolveError, SolveOutput};
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KrylovMethod {
    /// Restarted GMRES, suitable for non-symmetric systems.
    Gmres,
    /// Conjugate gradient, only for symmetric positive definite systems.
    Cg,
    BiCgStab,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreconditionerKind {
    Identity,
    Jacobi,
    /// Symmetric successive over-relaxation with relaxation parameter `omega` in `(0, 2)`.
    Ssor { omega: f64 },
    Ilu0,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverSettings {
    pub method: KrylovMethod,
    pub preconditioner: PreconditionerKind,
    /// Tolerance on the residual norm relative to the norm of the right-hand side.
    pub relative_tolerance: f64,
    pub max_iterations: usize,
    /// Restart length of GMRES. Ignored by the other methods.
    pub restart: usize,
}

impl Default for LinearSolverSettings {
    fn default() -> Self {
        Self {
            method: KrylovMethod::Gmres,
            preconditioner: PreconditionerKind::Ilu0,
            relative_tolerance: 1e-10,
            max_iterations: 1000,
            restart: 50,
        }
    }
}

impl LinearSolverSettings {
    /// CG with a Jacobi preconditioner, for symmetric positive definite systems.
    pub fn symmetric_positive_definite() -> Self {
        Self {
            method: KrylovMethod::Cg,
            preconditioner: PreconditionerKind::Jacobi,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub enum LinearSolverError {
    Preconditioner(PreconditionerError),
    Solve(SolveError<f64>),
}

impl fmt::Display for LinearSolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preconditioner(err) => write!(f, "failed to construct preconditioner: {}", err),
            Self::Solve(err) => write!(f, "{}", err),
        }
    }
}

impl Error for LinearSolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Preconditioner(err) => Some(err),
            Self::Solve(err) => Some(err),
        }
    }
}

impl From<PreconditionerError> for LinearSolverError {
    fn from(err: PreconditionerError) -> Self {
        Self::Preconditioner(err)
    }
}

impl From<SolveError<f64>> for LinearSolverError {
    fn from(err: SolveError<f64>) -> Self {
        Self::Solve(err)
    }
}

/// Solves `matrix * solution = rhs`, using the current contents of `solution` as initial guess.
pub fn solve_linear_system<'a>(
    settings: &LinearSolverSettings,
    matrix: &CsrMatrix<f64>,
    rhs: impl Into<DVectorView<'a, f64>>,
    solution: impl Into<DVectorViewMut<'a, f64>>,
) -> Result<SolveOutput<f64>, LinearSolverError> {
    let rhs = rhs.into();
    let solution = solution.into();
    let output = match settings.preconditioner {
        PreconditionerKind::Identity => solve_preconditioned(settings, matrix, IdentityOperator, rhs, solution),
        PreconditionerKind::Jacobi => {
            let p = Jacobi::from_csr(matrix)?;
            solve_preconditioned(settings, matrix, p, rhs, solution)
        }
        PreconditionerKind::Ssor { omega } => {
            let p = Ssor::from_csr(matrix, omega)?;
            solve_preconditioned(settings, matrix, p, rhs, solution)
        }
        PreconditionerKind::Ilu0 => {
            let p = Ilu0::from_csr(matrix)?;
            solve_preconditioned(settings, matrix, p, rhs, solution)
        }
    }?;
    debug!(
        "{:?} converged in {} iterations, residual norm {:.3e}",
        settings.method, output.num_iterations, output.residual_norm
    );
    Ok(output)
}

fn solve_preconditioned<P: LinearOperator<f64>>(
    settings: &LinearSolverSettings,
    matrix: &CsrMatrix<f64>,
    preconditioner: P,
    rhs: DVectorView<f64>,
    solution: DVectorViewMut<f64>,
) -> Result<SolveOutput<f64>, SolveError<f64>> {
    match settings.method {
        KrylovMethod::Gmres => Gmres::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_restart(settings.restart)
            .with_tolerance(settings.relative_tolerance)
            .with_max_iter(settings.max_iterations)
            .solve_with_guess(rhs, solution),
        KrylovMethod::BiCgStab => BiCgStab::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_tolerance(settings.relative_tolerance)
            .with_max_iter(settings.max_iterations)
            .solve_with_guess(rhs, solution),
        KrylovMethod::Cg => ConjugateGradient::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_stopping_criterion(RelativeResidualCriterion::new(settings.relative_tolerance))
            .with_max_iter(settings.max_iterations)
            .solve_with_guess(rhs, solution),
    }
}
