//! Finite strain kinematics.
use crate::AdReal;
use nalgebra::Matrix3;
use numeric_literals::replace_float_literals;

/// Deformation gradient $\vec F = \vec I + \nabla_{\vec X} \vec u$ from the displacement gradient.
pub fn deformation_gradient<T: AdReal>(displacement_gradient: &Matrix3<T>) -> Matrix3<T> {
    Matrix3::from_fn(|i, j| {
        if i == j {
            displacement_gradient[(i, j)] + T::one()
        } else {
            displacement_gradient[(i, j)]
        }
    })
}

/// Green-Lagrange strain $\vec E = \frac{1}{2} (\vec F^T \vec F - \vec I)$.
#[replace_float_literals(T::from(literal))]
pub fn green_lagrange_strain<T: AdReal>(deformation_gradient: &Matrix3<T>) -> Matrix3<T> {
    let f = deformation_gradient;
    Matrix3::from_fn(|i, j| {
        let mut c_ij = T::zero();
        for k in 0..3 {
            c_ij += f[(k, i)] * f[(k, j)];
        }
        if i == j {
            c_ij -= 1.0;
        }
        0.5 * c_ij
    })
}

/// First Piola-Kirchhoff stress $\vec P = \vec F \vec S$.
pub fn first_piola_kirchhoff<T: AdReal>(deformation_gradient: &Matrix3<T>, second_piola_kirchhoff: &Matrix3<T>) -> Matrix3<T> {
    let f = deformation_gradient;
    let s = second_piola_kirchhoff;
    Matrix3::from_fn(|i, j| {
        let mut p_ij = T::zero();
        for k in 0..3 {
            p_ij += f[(i, k)] * s[(k, j)];
        }
        p_ij
    })
}
