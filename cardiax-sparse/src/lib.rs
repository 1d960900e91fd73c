//! Preconditioned Krylov solvers for the sparse systems assembled by `cardiax`.
//!
//! All solvers operate on anything implementing [`LinearOperator`], which includes
//! [`CsrMatrix`] from `nalgebra-sparse`. Preconditioners are themselves linear operators
//! approximating the inverse of the system matrix.

pub use nalgebra_sparse::{CooMatrix, CsrMatrix};

pub mod bicgstab;
pub mod cg;
pub mod gmres;
pub mod precondition;

mod operator;

pub use operator::*;
