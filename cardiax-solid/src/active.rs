//! Active contraction along the fiber direction.
use crate::{AdReal, StressLaw};
use nalgebra::{Matrix3, Vector3};

/// Adds an active stress $T_a \\, \vec f \otimes \vec f$ to a passive material.
///
/// The active part derives from $\psi_a = T_a \\, \vec f \cdot \vec E \vec f$. For a zero fiber
/// direction, or zero tension, the stress is exactly that of the passive material.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ActiveFiberStress<M> {
    pub passive: M,
    pub tension: f64,
}

impl<M> ActiveFiberStress<M> {
    pub fn new(passive: M, tension: f64) -> Self {
        Self { passive, tension }
    }

    pub fn with_tension(self, tension: f64) -> Self {
        Self { tension, ..self }
    }
}

impl<M: StressLaw> StressLaw for ActiveFiberStress<M> {
    fn energy_density<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> T {
        let e = green_lagrange_strain;
        let mut fef = T::zero();
        for i in 0..3 {
            for j in 0..3 {
                fef += e[(i, j)] * (fiber[i] * fiber[j]);
            }
        }
        self.passive.energy_density(e, fiber) + fef * self.tension
    }

    fn second_piola_kirchhoff<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, fiber: &Vector3<f64>) -> Matrix3<T> {
        let mut s = self.passive.second_piola_kirchhoff(green_lagrange_strain, fiber);
        if self.tension != 0.0 {
            for i in 0..3 {
                for j in 0..3 {
                    s[(i, j)] += T::from(self.tension * fiber[i] * fiber[j]);
                }
            }
        }
        s
    }
}
