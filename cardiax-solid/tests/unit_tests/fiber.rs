use cardiax_solid::fiber::{accumulate_cell_fiber, FiberField, ProlateSpheroid};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::Vector3;
use std::f64::consts::PI;

#[test]
fn radii_interpolate_between_surfaces() {
    let field = ProlateSpheroid::default();
    assert_scalar_eq!(field.short_radius(0.0), 45.0 * 0.6f64.sinh(), comp = float);
    assert_scalar_eq!(field.short_radius(1.0), 45.0 * 0.8f64.sinh(), comp = float);
    assert_scalar_eq!(field.long_radius(0.0), 45.0 * 0.6f64.cosh(), comp = float);
    assert_scalar_eq!(field.long_radius(1.0), 45.0 * 0.8f64.cosh(), comp = float);
}

#[test]
fn fiber_is_unit_and_tangent_to_spheroid() {
    let field = ProlateSpheroid::default();
    for &t in &[0.0, 0.25, 0.5, 1.0] {
        let (u, v) = (0.75 * PI, 0.3);
        let x = field.point(t, u, v);
        let f = field.fiber_direction(&x, t).expect("point on the spheroid must be valid");
        assert_scalar_eq!(f.norm(), 1.0, comp = abs, tol = 1e-12);

        // Outward normal of x^2/r_s^2 + y^2/r_s^2 + z^2/r_e^2 = 1
        let (r_s, r_e) = (field.short_radius(t), field.long_radius(t));
        let normal = Vector3::new(x.x / (r_s * r_s), x.y / (r_s * r_s), x.z / (r_e * r_e));
        assert_scalar_eq!(f.dot(&normal.normalize()), 0.0, comp = abs, tol = 1e-10);
    }
}

#[test]
fn fiber_is_circumferential_at_mid_wall() {
    // alpha = 0 at t = 1/2, so the fiber is the normalized dx/dv
    let field = ProlateSpheroid::default();
    let v = 0.4;
    let x = field.point(0.5, 0.6 * PI, v);
    let f = field.fiber_direction(&x, 0.5).unwrap();
    let circumferential = Vector3::new(-v.sin(), v.cos(), 0.0);
    assert_scalar_eq!(f.dot(&circumferential), 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn fiber_is_longitudinal_at_endocardium() {
    // alpha = 90 degrees at t = 0, so the fiber is the normalized dx/du
    let field = ProlateSpheroid::default();
    let (u, v) = (0.6 * PI, 0.4);
    let x = field.point(0.0, u, v);
    let f = field.fiber_direction(&x, 0.0).unwrap();

    let (r_s, r_e) = (field.short_radius(0.0), field.long_radius(0.0));
    let dx_du = Vector3::new(r_s * u.cos() * v.cos(), r_s * u.cos() * v.sin(), -r_e * u.sin()).normalize();
    assert_matrix_eq!(f, dx_du, comp = abs, tol = 1e-12);
}

#[test]
fn point_outside_spheroid_is_degenerate() {
    let field = ProlateSpheroid::default();
    // |z| > r_e makes u undefined
    let x = Vector3::new(0.0, 0.0, 2.0 * field.long_radius(0.0));
    assert_eq!(field.fiber_direction(&x, 0.0), None);
}

#[test]
fn cell_fiber_skips_degenerate_points() {
    let field = ProlateSpheroid::default();
    let valid = field.point(0.5, 0.6 * PI, 0.4);
    let invalid = Vector3::new(0.0, 0.0, 1e3);

    let cell = accumulate_cell_fiber(&field, vec![(valid, 0.5), (invalid, 0.5), (valid, 0.5)]);
    assert_eq!(cell.valid_points, 2);
    assert_eq!(cell.skipped_points, 1);
    let expected = field.fiber_direction(&valid, 0.5).unwrap();
    assert_matrix_eq!(cell.direction, expected, comp = abs, tol = 1e-14);
}

#[test]
fn cell_fiber_without_valid_points_is_zero() {
    let field = ProlateSpheroid::default();
    let invalid = Vector3::new(0.0, 0.0, 1e3);
    let cell = accumulate_cell_fiber(&field, vec![(invalid, 0.0); 4]);
    assert_eq!(cell.direction, Vector3::zeros());
    assert_eq!(cell.valid_points, 0);
    assert_eq!(cell.skipped_points, 4);
}
