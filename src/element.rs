//! Linear Lagrange elements on the reference domains $[-1, 1]^d$ and the reference simplices.
use nalgebra::{Matrix3, Matrix3x2, Point2, Point3, RealField, Vector2, Vector3};
use numeric_literals::replace_float_literals;

/// A volumetric finite element embedded in 3D.
pub trait VolumeFiniteElement<T: RealField + Copy> {
    fn vertices(&self) -> &[Point3<T>];

    fn num_nodes(&self) -> usize {
        self.vertices().len()
    }

    /// Evaluates each basis function at the given reference coordinates.
    ///
    /// Panics if `basis_values` does not have exactly one entry per node.
    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &Point3<T>);

    /// Evaluates the gradient of each basis function with respect to the reference coordinates.
    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector3<T>], reference_coords: &Point3<T>);

    /// The Jacobian of the map from reference to physical coordinates.
    fn reference_jacobian(&self, reference_coords: &Point3<T>) -> Matrix3<T> {
        let mut gradients = vec![Vector3::zeros(); self.num_nodes()];
        self.populate_basis_gradients(&mut gradients, reference_coords);
        let mut jacobian = Matrix3::zeros();
        for (x, g) in self.vertices().iter().zip(&gradients) {
            jacobian += x.coords * g.transpose();
        }
        jacobian
    }

    fn map_reference_coords(&self, reference_coords: &Point3<T>) -> Point3<T> {
        let mut basis = vec![T::zero(); self.num_nodes()];
        self.populate_basis(&mut basis, reference_coords);
        let mut x = Vector3::zeros();
        for (v, n) in self.vertices().iter().zip(&basis) {
            x += v.coords * *n;
        }
        Point3::from(x)
    }
}

/// A two-dimensional finite element embedded in 3D, used for boundary faces.
pub trait SurfaceFiniteElement<T: RealField + Copy> {
    fn vertices(&self) -> &[Point3<T>];

    fn num_nodes(&self) -> usize {
        self.vertices().len()
    }

    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &Point2<T>);

    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector2<T>], reference_coords: &Point2<T>);

    /// The tangent vectors $\partial \vec x / \partial \xi_i$ stored as columns.
    fn reference_jacobian(&self, reference_coords: &Point2<T>) -> Matrix3x2<T> {
        let mut gradients = vec![Vector2::zeros(); self.num_nodes()];
        self.populate_basis_gradients(&mut gradients, reference_coords);
        let mut jacobian = Matrix3x2::zeros();
        for (x, g) in self.vertices().iter().zip(&gradients) {
            jacobian += x.coords * g.transpose();
        }
        jacobian
    }

    /// The non-normalized normal $\partial_\xi \vec x \times \partial_\eta \vec x$.
    ///
    /// Its length is the ratio between physical and reference area.
    fn scaled_normal(&self, reference_coords: &Point2<T>) -> Vector3<T> {
        let j = self.reference_jacobian(reference_coords);
        j.column(0).cross(&j.column(1))
    }

    fn map_reference_coords(&self, reference_coords: &Point2<T>) -> Point3<T> {
        let mut basis = vec![T::zero(); self.num_nodes()];
        self.populate_basis(&mut basis, reference_coords);
        let mut x = Vector3::zeros();
        for (v, n) in self.vertices().iter().zip(&basis) {
            x += v.coords * *n;
        }
        Point3::from(x)
    }
}

/// Linear tetrahedron on the reference simplex with vertices
/// $(-1, -1, -1)$, $(1, -1, -1)$, $(-1, 1, -1)$ and $(-1, -1, 1)$.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tet4Element<T: RealField + Copy> {
    vertices: [Point3<T>; 4],
}

impl<T: RealField + Copy> Tet4Element<T> {
    pub fn from_vertices(vertices: [Point3<T>; 4]) -> Self {
        Self { vertices }
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference() -> Self {
        Self::from_vertices([
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(-1.0, -1.0, 1.0),
        ])
    }
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
impl<T: RealField + Copy> VolumeFiniteElement<T> for Tet4Element<T> {
    fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &Point3<T>) {
        assert_eq!(basis_values.len(), 4);
        basis_values[0] = -0.5 * (xi.x + xi.y + xi.z + 1.0);
        basis_values[1] = 0.5 * (xi.x + 1.0);
        basis_values[2] = 0.5 * (xi.y + 1.0);
        basis_values[3] = 0.5 * (xi.z + 1.0);
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector3<T>], _xi: &Point3<T>) {
        assert_eq!(basis_gradients.len(), 4);
        basis_gradients[0] = Vector3::new(-0.5, -0.5, -0.5);
        basis_gradients[1] = Vector3::new(0.5, 0.0, 0.0);
        basis_gradients[2] = Vector3::new(0.0, 0.5, 0.0);
        basis_gradients[3] = Vector3::new(0.0, 0.0, 0.5);
    }
}

/// Trilinear hexahedron on $[-1, 1]^3$.
///
/// Vertices 0 to 3 run counter-clockwise around the face $\zeta = -1$ starting at
/// $(-1, -1, -1)$, and vertices 4 to 7 are the same on the face $\zeta = 1$.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hex8Element<T: RealField + Copy> {
    vertices: [Point3<T>; 8],
}

impl<T: RealField + Copy> Hex8Element<T> {
    pub fn from_vertices(vertices: [Point3<T>; 8]) -> Self {
        Self { vertices }
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference() -> Self {
        Self::from_vertices([
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(1.0, 1.0, -1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(-1.0, -1.0, 1.0),
            Point3::new(1.0, -1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(-1.0, 1.0, 1.0),
        ])
    }
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn hex_reference_vertex<T: RealField + Copy>(index: usize) -> Vector3<T> {
    let x = if matches!(index % 4, 1 | 2) { 1.0 } else { -1.0 };
    let y = if matches!(index % 4, 2 | 3) { 1.0 } else { -1.0 };
    let z = if index >= 4 { 1.0 } else { -1.0 };
    Vector3::new(x, y, z)
}

/// Linear basis function on $[-1, 1]$ associated with the endpoint `alpha` $\in \{-1, 1\}$.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn phi_linear_1d<T: RealField + Copy>(alpha: T, xi: T) -> T {
    0.5 * (1.0 + alpha * xi)
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn phi_linear_1d_grad<T: RealField + Copy>(alpha: T, _xi: T) -> T {
    0.5 * alpha
}

impl<T: RealField + Copy> VolumeFiniteElement<T> for Hex8Element<T> {
    fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &Point3<T>) {
        assert_eq!(basis_values.len(), 8);
        for (a, n) in basis_values.iter_mut().enumerate() {
            let alpha = hex_reference_vertex::<T>(a);
            *n = phi_linear_1d(alpha.x, xi.x) * phi_linear_1d(alpha.y, xi.y) * phi_linear_1d(alpha.z, xi.z);
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector3<T>], xi: &Point3<T>) {
        assert_eq!(basis_gradients.len(), 8);
        for (a, g) in basis_gradients.iter_mut().enumerate() {
            let alpha = hex_reference_vertex::<T>(a);
            let (px, py, pz) = (
                phi_linear_1d(alpha.x, xi.x),
                phi_linear_1d(alpha.y, xi.y),
                phi_linear_1d(alpha.z, xi.z),
            );
            *g = Vector3::new(
                phi_linear_1d_grad(alpha.x, xi.x) * py * pz,
                px * phi_linear_1d_grad(alpha.y, xi.y) * pz,
                px * py * phi_linear_1d_grad(alpha.z, xi.z),
            );
        }
    }
}

/// Linear triangle on the reference simplex with vertices $(-1, -1)$, $(1, -1)$ and $(-1, 1)$.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tri3Element<T: RealField + Copy> {
    vertices: [Point3<T>; 3],
}

impl<T: RealField + Copy> Tri3Element<T> {
    pub fn from_vertices(vertices: [Point3<T>; 3]) -> Self {
        Self { vertices }
    }
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
impl<T: RealField + Copy> SurfaceFiniteElement<T> for Tri3Element<T> {
    fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &Point2<T>) {
        assert_eq!(basis_values.len(), 3);
        basis_values[0] = -0.5 * (xi.x + xi.y);
        basis_values[1] = 0.5 * (xi.x + 1.0);
        basis_values[2] = 0.5 * (xi.y + 1.0);
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector2<T>], _xi: &Point2<T>) {
        assert_eq!(basis_gradients.len(), 3);
        basis_gradients[0] = Vector2::new(-0.5, -0.5);
        basis_gradients[1] = Vector2::new(0.5, 0.0);
        basis_gradients[2] = Vector2::new(0.0, 0.5);
    }
}

/// Bilinear quadrilateral on $[-1, 1]^2$, vertices counter-clockwise from $(-1, -1)$.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad4Element<T: RealField + Copy> {
    vertices: [Point3<T>; 4],
}

impl<T: RealField + Copy> Quad4Element<T> {
    pub fn from_vertices(vertices: [Point3<T>; 4]) -> Self {
        Self { vertices }
    }
}

impl<T: RealField + Copy> SurfaceFiniteElement<T> for Quad4Element<T> {
    fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &Point2<T>) {
        assert_eq!(basis_values.len(), 4);
        for (a, n) in basis_values.iter_mut().enumerate() {
            let alpha = hex_reference_vertex::<T>(a);
            *n = phi_linear_1d(alpha.x, xi.x) * phi_linear_1d(alpha.y, xi.y);
        }
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [Vector2<T>], xi: &Point2<T>) {
        assert_eq!(basis_gradients.len(), 4);
        for (a, g) in basis_gradients.iter_mut().enumerate() {
            let alpha = hex_reference_vertex::<T>(a);
            *g = Vector2::new(
                phi_linear_1d_grad(alpha.x, xi.x) * phi_linear_1d(alpha.y, xi.y),
                phi_linear_1d(alpha.x, xi.x) * phi_linear_1d_grad(alpha.y, xi.y),
            );
        }
    }
}
