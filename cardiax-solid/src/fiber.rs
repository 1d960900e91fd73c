//! Fiber orientation fields parametrized by a transmural coordinate.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A rule assigning a fiber direction to a point, given its transmural coordinate
/// `t`, where `t = 0` on the endocardium and `t = 1` on the epicardium.
pub trait FiberField {
    /// Returns `None` if the direction cannot be determined at the point.
    fn fiber_direction(&self, point: &Vector3<f64>, transmural: f64) -> Option<Vector3<f64>>;
}

/// Rule-based fiber field for an idealized left ventricle whose endocardial and epicardial
/// surfaces are confocal prolate spheroids.
///
/// The point is located in prolate spheroidal coordinates `(u, v)` on the spheroid interpolated
/// at its transmural coordinate, and the fiber rotates in the tangent plane from `+90°` at the
/// endocardium to `-90°` at the epicardium, measured from the circumferential direction.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProlateSpheroid {
    pub focal_distance: f64,
    pub nu_endo: f64,
    pub nu_epi: f64,
}

impl Default for ProlateSpheroid {
    fn default() -> Self {
        Self {
            focal_distance: 45.0,
            nu_endo: 0.6,
            nu_epi: 0.8,
        }
    }
}

impl ProlateSpheroid {
    /// Short (equatorial) radius of the spheroid at transmural coordinate `t`.
    pub fn short_radius(&self, t: f64) -> f64 {
        let endo = self.focal_distance * self.nu_endo.sinh();
        let epi = self.focal_distance * self.nu_epi.sinh();
        endo + (endo - epi).abs() * t
    }

    /// Long (axial) radius of the spheroid at transmural coordinate `t`.
    pub fn long_radius(&self, t: f64) -> f64 {
        let endo = self.focal_distance * self.nu_endo.cosh();
        let epi = self.focal_distance * self.nu_epi.cosh();
        endo + (endo - epi).abs() * t
    }

    /// Point on the spheroid at transmural coordinate `t` with angles `u` (from the long axis)
    /// and `v` (around it).
    pub fn point(&self, t: f64, u: f64, v: f64) -> Vector3<f64> {
        let r_s = self.short_radius(t);
        let r_e = self.long_radius(t);
        Vector3::new(r_s * u.sin() * v.cos(), r_s * u.sin() * v.sin(), r_e * u.cos())
    }
}

impl FiberField for ProlateSpheroid {
    fn fiber_direction(&self, point: &Vector3<f64>, transmural: f64) -> Option<Vector3<f64>> {
        let t = transmural;
        let r_s = self.short_radius(t);
        let r_e = self.long_radius(t);

        let u = (point.z / r_e).acos();
        let v_from_sin = (point.y / (r_s * u.sin())).asin();
        let v_from_cos = (point.x / (r_s * u.sin())).acos();
        if u.is_nan() || (v_from_sin.is_nan() && v_from_cos.is_nan()) {
            return None;
        }
        let v = if v_from_sin.is_nan() { v_from_cos } else { v_from_sin };

        let alpha = (90.0 - 180.0 * t) * (PI / 180.0);

        let dx_du = Vector3::new(r_s * u.cos() * v.cos(), r_s * u.cos() * v.sin(), -r_e * u.sin());
        let dx_dv = Vector3::new(-r_s * u.sin() * v.sin(), r_s * u.sin() * v.cos(), 0.0);
        let f = dx_du.normalize() * alpha.sin() + dx_dv.normalize() * alpha.cos();

        if f.iter().all(|f_i| f_i.is_finite()) {
            Some(f)
        } else {
            None
        }
    }
}

/// Fiber direction of a cell, accumulated from the directions at its support points.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellFiber {
    /// Unit fiber direction, or zero if no support point had a valid direction.
    pub direction: Vector3<f64>,
    pub valid_points: usize,
    pub skipped_points: usize,
}

/// Sums the fiber directions over the given `(point, transmural)` pairs, skipping points where
/// the field is undefined, and normalizes the sum.
///
/// Skipping degenerate points biases the cell average towards the remaining points. This is
/// a known approximation.
pub fn accumulate_cell_fiber<F>(field: &F, points: impl IntoIterator<Item = (Vector3<f64>, f64)>) -> CellFiber
where
    F: ?Sized + FiberField,
{
    let mut sum = Vector3::zeros();
    let mut valid_points = 0;
    let mut skipped_points = 0;
    for (point, t) in points {
        match field.fiber_direction(&point, t) {
            Some(f) => {
                sum += f;
                valid_points += 1;
            }
            None => skipped_points += 1,
        }
    }

    let norm = sum.norm();
    let direction = if norm > 0.0 { sum / norm } else { Vector3::zeros() };
    CellFiber {
        direction,
        valid_points,
        skipped_points,
    }
}
