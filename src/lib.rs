//! Static equilibrium of cardiac tissue with a Guccione-type hyperelastic law.
//!
//! The residual of every cell is linearized by forward-mode automatic differentiation, assembled
//! over an in-process partition of the mesh and driven to zero by Newton-Raphson iteration with
//! a preconditioned Krylov solver for the linear systems.
pub mod assembly;
pub mod boundary;
pub mod config;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod linear_solver;
pub mod mesh;
pub mod partition;
pub mod poisson;
pub mod problem;
pub mod quadrature;
pub mod solver;
pub mod vector;

pub mod optimize {
    pub use cardiax_optimize::*;
}

pub mod solid {
    pub use cardiax_solid::*;
}

pub mod sparse {
    pub use cardiax_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use config::Config;
pub use error::SolverError;
pub use problem::{BoxProblem, CardiacProblem, IdealizedLvFiber};
pub use solver::{HyperelasticSolver, NewtonReport};
