//! The transversely isotropic Guccione law for passive myocardium.
//!
//! $$ \psi = \frac{C}{2} (e^Q - 1), \qquad Q = \sum_{ij} w_{ij} E_{ij}^2, $$
//!
//! where index 0 is the fiber direction and indices 1 and 2 span the cross-fiber plane.
use crate::{AdReal, StressLaw};
use nalgebra::{Matrix3, Vector3};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Weights $w_{ij}$ of the squared strain components in the exponent $Q$.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialWeights {
    weights: Matrix3<f64>,
}

impl MaterialWeights {
    /// Weights from the fiber, transverse and fiber-sheet stiffnesses:
    ///
    /// - $w_{00} = b_f$,
    /// - $w_{11} = w_{22} = w_{12} = w_{21} = b_t$,
    /// - $w_{01} = w_{10} = w_{02} = w_{20} = b_{fs}$.
    #[rustfmt::skip]
    pub fn from_guccione(b_f: f64, b_t: f64, b_fs: f64) -> Self {
        Self {
            weights: Matrix3::new(b_f,  b_fs, b_fs,
                                  b_fs, b_t,  b_t,
                                  b_fs, b_t,  b_t),
        }
    }

    /// Isotropic weights, $w_{ij} = b$ for all $i, j$.
    pub fn uniform(b: f64) -> Self {
        Self {
            weights: Matrix3::repeat(b),
        }
    }

    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[(i, j)]
    }

    pub fn as_matrix(&self) -> &Matrix3<f64> {
        &self.weights
    }

    /// $Q = \sum_{ij} w_{ij} E_{ij}^2$.
    pub fn exponent<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>) -> T {
        let e = green_lagrange_strain;
        let mut q = T::zero();
        for i in 0..3 {
            for j in 0..3 {
                q += e[(i, j)] * e[(i, j)] * self.weights[(i, j)];
            }
        }
        q
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuccioneParameters {
    pub b_f: f64,
    pub b_t: f64,
    pub b_fs: f64,
    /// Overall stiffness scale $C$.
    pub c: f64,
}

impl Default for GuccioneParameters {
    fn default() -> Self {
        Self {
            b_f: 8.0,
            b_t: 2.0,
            b_fs: 4.0,
            c: 2000.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GuccioneMaterial {
    pub c: f64,
    pub weights: MaterialWeights,
}

impl GuccioneMaterial {
    pub fn new(c: f64, weights: MaterialWeights) -> Self {
        Self { c, weights }
    }
}

impl From<GuccioneParameters> for GuccioneMaterial {
    fn from(params: GuccioneParameters) -> Self {
        Self::new(params.c, MaterialWeights::from_guccione(params.b_f, params.b_t, params.b_fs))
    }
}

impl Default for GuccioneMaterial {
    fn default() -> Self {
        GuccioneParameters::default().into()
    }
}

impl StressLaw for GuccioneMaterial {
    #[replace_float_literals(T::from(literal))]
    fn energy_density<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, _fiber: &Vector3<f64>) -> T {
        let q = self.weights.exponent(green_lagrange_strain);
        (q.exp() - 1.0) * (0.5 * self.c)
    }

    fn second_piola_kirchhoff<T: AdReal>(&self, green_lagrange_strain: &Matrix3<T>, _fiber: &Vector3<f64>) -> Matrix3<T> {
        let e = green_lagrange_strain;
        let q = self.weights.exponent(e);
        let scale = q.exp() * self.c;
        Matrix3::from_fn(|i, j| scale * e[(i, j)] * self.weights.weight(i, j))
    }
}
