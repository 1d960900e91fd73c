//! Error types reported by configuration, assembly and the solvers.
use crate::linear_solver::LinearSolverError;
use crate::mesh::BoundaryId;
use cardiax_optimize::newton::NewtonError;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
    /// A boundary id is classified as both Neumann and Dirichlet.
    OverlappingBoundary { boundary_id: BoundaryId },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read configuration: {}", err),
            Self::Parse(err) => write!(f, "failed to parse configuration: {}", err),
            Self::Invalid { field, reason } => write!(f, "invalid configuration value for `{}`: {}", field, reason),
            Self::OverlappingBoundary { boundary_id } => write!(
                f,
                "boundary id {} is classified as both Neumann and Dirichlet",
                boundary_id
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

#[derive(Debug)]
pub enum AssemblyError {
    /// The local contribution of a cell could not be computed, or was not finite.
    Cell { cell: usize, report: eyre::Report },
    /// The ghosted vector read by the assembler does not reflect the current solution.
    StaleGhostValues,
    /// The compressed matrix could not be constructed from the accumulated entries.
    Compress(String),
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell { cell, report } => write!(f, "assembly failed in cell {}: {}", cell, report),
            Self::StaleGhostValues => write!(f, "ghost values are out of date, update them before assembly"),
            Self::Compress(msg) => write!(f, "failed to compress assembled matrix: {}", msg),
        }
    }
}

impl Error for AssemblyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    /// The boundary id was already classified with the other kind of condition.
    Conflict { boundary_id: BoundaryId },
    /// A constrained row of the Jacobian has no stored diagonal entry.
    MissingDiagonal { dof: usize },
}

impl Display for BoundaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { boundary_id } => write!(
                f,
                "boundary id {} cannot be both a Neumann and a Dirichlet boundary",
                boundary_id
            ),
            Self::MissingDiagonal { dof } => write!(f, "no diagonal entry stored for constrained dof {}", dof),
        }
    }
}

impl Error for BoundaryError {}

#[derive(Debug)]
pub enum SolverError {
    Config(ConfigError),
    Boundary(BoundaryError),
    /// The mesh is unsuitable, for example because of an inverted cell.
    Mesh(String),
    Assembly(AssemblyError),
    /// The auxiliary transmural field could not be computed.
    AuxiliaryField(LinearSolverError),
    /// Newton iteration did not converge.
    Diverged(NewtonError),
}

impl Display for SolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{}", err),
            Self::Boundary(err) => write!(f, "{}", err),
            Self::Mesh(msg) => write!(f, "invalid mesh: {}", msg),
            Self::Assembly(err) => write!(f, "{}", err),
            Self::AuxiliaryField(err) => write!(f, "auxiliary field solve failed: {}", err),
            Self::Diverged(err) => write!(f, "Newton iteration diverged: {}", err),
        }
    }
}

impl Error for SolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Boundary(err) => Some(err),
            Self::Mesh(_) => None,
            Self::Assembly(err) => Some(err),
            Self::AuxiliaryField(err) => Some(err),
            Self::Diverged(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SolverError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<BoundaryError> for SolverError {
    fn from(err: BoundaryError) -> Self {
        Self::Boundary(err)
    }
}

impl From<AssemblyError> for SolverError {
    fn from(err: AssemblyError) -> Self {
        Self::Assembly(err)
    }
}

impl From<NewtonError> for SolverError {
    fn from(err: NewtonError) -> Self {
        Self::Diverged(err)
    }
}
