//! Constitutive laws for cardiac tissue.
//!
//! Every stress law is written once, generically over an [`AdReal`] scalar, so that the same
//! expression can be evaluated with plain `f64` or with dual numbers for forward-mode
//! automatic differentiation.
use nalgebra::{Matrix3, Scalar, Vector3};
use num_dual::DualNum;

pub mod active;
pub mod fiber;
pub mod guccione;
pub mod kinematics;

pub use num_dual;

/// Scalar types a stress law can be evaluated with.
///
/// Implemented by `f64` itself and by the dual numbers of `num-dual` over `f64`.
pub trait AdReal: DualNum<f64> + Scalar + Copy {}

impl<T> AdReal for T where T: DualNum<f64> + Scalar + Copy {}

/// A hyperelastic material described by its second Piola-Kirchhoff stress as a function of the
/// Green-Lagrange strain.
pub trait StressLaw {
    /// Compute the strain energy density $\psi = \psi(\vec E)$.
    fn energy_density<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> T;

    /// Compute the second Piola-Kirchhoff stress $\vec S = \pd{\psi}{\vec E}$.
    ///
    /// `fiber` is the local fiber direction. A zero vector means that no fiber direction is
    /// available at the point.
    fn second_piola_kirchhoff<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> Matrix3<T>;
}

impl<M: StressLaw> StressLaw for &M {
    fn energy_density<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> T {
        M::energy_density(self, green_lagrange_strain, fiber)
    }

    fn second_piola_kirchhoff<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> Matrix3<T> {
        M::second_piola_kirchhoff(self, green_lagrange_strain, fiber)
    }
}
