//! Quadrature rules on the reference domains used by the elements in [`crate::element`].
//!
//! Every rule is given as a pair of weights and points. Weights sum to the volume (or area) of the
//! reference domain.
use nalgebra::{Point2, Point3, RealField};
use numeric_literals::replace_float_literals;

pub type QuadraturePair<T, P> = (Vec<T>, Vec<P>);
pub type QuadraturePair2d<T> = QuadraturePair<T, Point2<T>>;
pub type QuadraturePair3d<T> = QuadraturePair<T, Point3<T>>;

/// Four-point rule on the reference tetrahedron, exact for polynomials of total degree 2.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn tet_quadrature_strength_2<T: RealField + Copy>() -> QuadraturePair3d<T> {
    // Barycentric coordinates of the rule on the unit simplex, mapped to [-1, 1]
    let a = 2.0 * 0.5854101966249685 - 1.0;
    let b = 2.0 * 0.1381966011250105 - 1.0;
    let points = vec![
        Point3::new(b, b, b),
        Point3::new(a, b, b),
        Point3::new(b, a, b),
        Point3::new(b, b, a),
    ];
    let weights = vec![1.0 / 3.0; 4];
    (weights, points)
}

/// Two-point Gauss rule on $[-1, 1]$, exact for cubic polynomials.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn gauss_2<T: RealField + Copy>() -> QuadraturePair<T, T> {
    let x = 1.0 / T::sqrt(3.0);
    (vec![1.0, 1.0], vec![-x, x])
}

/// Tensor product Gauss rule with 2 x 2 x 2 points.
pub fn hex_quadrature_strength_3<T: RealField + Copy>() -> QuadraturePair3d<T> {
    let (w1d, x1d) = gauss_2::<T>();
    let mut weights = Vec::with_capacity(8);
    let mut points = Vec::with_capacity(8);
    for k in 0..2 {
        for j in 0..2 {
            for i in 0..2 {
                weights.push(w1d[i] * w1d[j] * w1d[k]);
                points.push(Point3::new(x1d[i], x1d[j], x1d[k]));
            }
        }
    }
    (weights, points)
}

/// Three-point rule on the reference triangle, exact for polynomials of total degree 2.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn tri_quadrature_strength_2<T: RealField + Copy>() -> QuadraturePair2d<T> {
    let a = 2.0 * (1.0 / 6.0) - 1.0;
    let b = 2.0 * (2.0 / 3.0) - 1.0;
    let points = vec![Point2::new(a, a), Point2::new(b, a), Point2::new(a, b)];
    let weights = vec![2.0 / 3.0; 3];
    (weights, points)
}

/// Tensor product Gauss rule with 2 x 2 points.
pub fn quad_quadrature_strength_3<T: RealField + Copy>() -> QuadraturePair2d<T> {
    let (w1d, x1d) = gauss_2::<T>();
    let mut weights = Vec::with_capacity(4);
    let mut points = Vec::with_capacity(4);
    for j in 0..2 {
        for i in 0..2 {
            weights.push(w1d[i] * w1d[j]);
            points.push(Point2::new(x1d[i], x1d[j]));
        }
    }
    (weights, points)
}
