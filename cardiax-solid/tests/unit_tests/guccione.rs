use super::displacement_gradient;
use cardiax_solid::guccione::{GuccioneMaterial, GuccioneParameters, MaterialWeights};
use cardiax_solid::kinematics::{deformation_gradient, green_lagrange_strain};
use cardiax_solid::num_dual::{Dual64, DualNum};
use cardiax_solid::StressLaw;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{matrix, Matrix3, Vector3};

fn strain() -> Matrix3<f64> {
    green_lagrange_strain(&deformation_gradient(&displacement_gradient()))
}

#[test]
fn default_parameters() {
    let params = GuccioneParameters::default();
    assert_eq!(params.b_f, 8.0);
    assert_eq!(params.b_t, 2.0);
    assert_eq!(params.b_fs, 4.0);
    assert_eq!(params.c, 2000.0);
}

#[test]
fn guccione_weight_table() {
    let w = MaterialWeights::from_guccione(8.0, 2.0, 4.0);
    assert_eq!(w.weight(0, 0), 8.0);
    for (i, j) in [(1, 1), (2, 2), (1, 2), (2, 1)] {
        assert_eq!(w.weight(i, j), 2.0);
    }
    for (i, j) in [(0, 1), (1, 0), (0, 2), (2, 0)] {
        assert_eq!(w.weight(i, j), 4.0);
    }
}

#[test]
fn exponent_for_diagonal_strain() {
    let w = MaterialWeights::from_guccione(8.0, 2.0, 4.0);
    let e = Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.3));
    assert_scalar_eq!(w.exponent(&e), 8.0 * 0.01 + 2.0 * 0.04 + 2.0 * 0.09, comp = float);
}

#[test]
fn stress_for_known_strain() {
    let material = GuccioneMaterial::default();
    let e = matrix![0.1, 0.0, 0.0;
                    0.0, 0.0, 0.0;
                    0.0, 0.0, 0.0];
    let s = material.second_piola_kirchhoff(&e, &Vector3::zeros());

    let expected_s00 = 2000.0 * (8.0 * 0.01f64).exp() * 8.0 * 0.1;
    let mut expected = Matrix3::zeros();
    expected[(0, 0)] = expected_s00;
    assert_matrix_eq!(s, expected, comp = float);
}

#[test]
fn stress_is_derivative_of_energy() {
    let material = GuccioneMaterial::default();
    let e = strain();
    let s = material.second_piola_kirchhoff(&e, &Vector3::zeros());

    for i in 0..3 {
        for j in 0..3 {
            let e_dual = Matrix3::from_fn(|k, l| {
                let seed = if (k, l) == (i, j) { 1.0 } else { 0.0 };
                Dual64::new(e[(k, l)], seed)
            });
            let psi = material.energy_density(&e_dual, &Vector3::zeros());
            assert_scalar_eq!(psi.eps, s[(i, j)], comp = abs, tol = 1e-9 * s.norm());
            assert_scalar_eq!(psi.re(), material.energy_density(&e, &Vector3::zeros()), comp = float);
        }
    }
}

#[test]
fn dual_evaluation_agrees_with_real_evaluation() {
    let material = GuccioneMaterial::default();
    let e = strain();
    let e_dual = e.map(Dual64::from);
    let s_dual = material.second_piola_kirchhoff(&e_dual, &Vector3::zeros());
    let s = material.second_piola_kirchhoff(&e, &Vector3::zeros());
    assert_matrix_eq!(s_dual.map(|s_ij| s_ij.re), s, comp = float);
    assert_matrix_eq!(s_dual.map(|s_ij| s_ij.eps), Matrix3::zeros(), comp = float);
}

#[test]
fn zero_weights_give_zero_stress() {
    let material = GuccioneMaterial::new(2000.0, MaterialWeights::uniform(0.0));
    let s = material.second_piola_kirchhoff(&strain(), &Vector3::zeros());
    assert_eq!(s, Matrix3::zeros());
}

#[test]
fn uniform_weights_small_strain_limit_is_linear() {
    // For small strain, exp(Q) ~ 1 and S ~ C b E
    let material = GuccioneMaterial::new(100.0, MaterialWeights::uniform(3.0));
    let e = strain() * 1e-5;
    let s = material.second_piola_kirchhoff(&e, &Vector3::zeros());
    assert_matrix_eq!(s, e * 300.0, comp = abs, tol = 1e-10);
}

#[test]
fn anisotropic_stress_weights_each_strain_component() {
    let material = GuccioneMaterial::new(1500.0, MaterialWeights::from_guccione(8.0, 2.0, 4.0));
    let e = strain();
    let s = material.second_piola_kirchhoff(&e, &Vector3::zeros());

    let q = material.weights.exponent(&e);
    let w = material.weights.as_matrix();
    let expected = Matrix3::from_fn(|i, j| 1500.0 * q.exp() * w[(i, j)] * e[(i, j)]);
    assert_matrix_eq!(s, expected, comp = abs, tol = 1e-12 * expected.amax());

    // Fiber, sheet and cross terms are scaled differently
    let stiffness = |i: usize, j: usize| s[(i, j)] / e[(i, j)];
    let tol = 1e-12 * stiffness(0, 0);
    assert_scalar_eq!(stiffness(0, 0), 4.0 * stiffness(1, 1), comp = abs, tol = tol);
    assert_scalar_eq!(stiffness(0, 1), 2.0 * stiffness(1, 2), comp = abs, tol = tol);

    let s_dual = material.second_piola_kirchhoff(&e.map(Dual64::from), &Vector3::zeros());
    assert_matrix_eq!(s_dual.map(|s_ij| s_ij.re), s, comp = float);
}
