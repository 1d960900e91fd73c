//! Assembly of residuals and Jacobians.
//!
//! [`local`] computes the contribution of a single cell and [`global`] accumulates cell
//! contributions of all ranks into the distributed system.
pub mod global;
pub mod local;
