use super::displacement_gradient;
use cardiax_solid::kinematics::{deformation_gradient, first_piola_kirchhoff, green_lagrange_strain};
use matrixcompare::assert_matrix_eq;
use nalgebra::{Matrix3, Rotation3, Vector3};
use proptest::prelude::*;

#[test]
fn green_lagrange_strain_matches_definition() {
    let h = displacement_gradient();
    let f = deformation_gradient(&h);
    assert_matrix_eq!(f, Matrix3::identity() + h, comp = float);

    let e = green_lagrange_strain(&f);
    let expected = 0.5 * (f.transpose() * f - Matrix3::identity());
    assert_matrix_eq!(e, expected, comp = abs, tol = 1e-14);
    assert_matrix_eq!(e, e.transpose(), comp = float);
}

#[test]
fn zero_displacement_gradient_gives_zero_strain() {
    let f = deformation_gradient(&Matrix3::<f64>::zeros());
    assert_eq!(green_lagrange_strain(&f), Matrix3::zeros());
}

#[test]
fn first_piola_kirchhoff_is_f_times_s() {
    let f = deformation_gradient(&displacement_gradient());
    let s = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 5.0, 3.0, 5.0, 6.0);
    assert_matrix_eq!(first_piola_kirchhoff(&f, &s), f * s, comp = abs, tol = 1e-14);
}

proptest! {
    #[test]
    fn rigid_rotation_gives_zero_strain(
        axis in prop::array::uniform3(-1.0..1.0f64),
        angle in -3.0..3.0f64,
    ) {
        let axis = Vector3::from(axis);
        prop_assume!(axis.norm() > 1e-3);
        let r = Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle);
        // F = R, so H = R - I
        let h = r.matrix() - Matrix3::identity();
        let e = green_lagrange_strain(&deformation_gradient(&h));
        prop_assert!(e.norm() <= 1e-14);
    }
}
