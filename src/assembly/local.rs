use crate::element::{SurfaceFiniteElement, VolumeFiniteElement};
use crate::quadrature::{QuadraturePair2d, QuadraturePair3d};
use cardiax_solid::kinematics::{deformation_gradient, first_piola_kirchhoff, green_lagrange_strain};
use cardiax_solid::{AdReal, StressLaw};
use eyre::{bail, eyre};
use nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut, Matrix3, Point3, Vector3};
use num_dual::Dual64;

pub trait ElementConnectivityAssembler {
    fn solution_dim(&self) -> usize;

    fn num_elements(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    /// Mesh vertex indices of the element nodes.
    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize);
}

/// Computes the residual and its Jacobian for a single element, given the element's nodal
/// solution values ordered by node and then by component.
pub trait ElementSystemAssembler: ElementConnectivityAssembler {
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        solution: DVectorView<f64>,
        residual: DVectorViewMut<f64>,
        jacobian: DMatrixViewMut<f64>,
    ) -> eyre::Result<()>;
}

/// Quadrature data of a cell in its reference configuration.
///
/// Stores the physical gradients of the basis functions and the product of quadrature weight and
/// Jacobian determinant at every quadrature point. The mesh does not move in the reference
/// configuration, so this is computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGeometry {
    num_nodes: usize,
    points: Vec<Point3<f64>>,
    jxw: Vec<f64>,
    basis: Vec<f64>,
    gradients: Vec<Vector3<f64>>,
}

impl CellGeometry {
    /// Returns an error if the element is degenerate or inverted at a quadrature point.
    pub fn from_element<E>(element: &E, quadrature: &QuadraturePair3d<f64>) -> eyre::Result<Self>
    where
        E: VolumeFiniteElement<f64>,
    {
        let (weights, points) = quadrature;
        let n = element.num_nodes();
        let mut geometry = Self {
            num_nodes: n,
            points: Vec::with_capacity(points.len()),
            jxw: Vec::with_capacity(points.len()),
            basis: vec![0.0; n * points.len()],
            gradients: vec![Vector3::zeros(); n * points.len()],
        };

        for (q, (w, xi)) in weights.iter().zip(points).enumerate() {
            let j = element.reference_jacobian(xi);
            let det = j.determinant();
            if !(det > 0.0) {
                bail!("non-positive Jacobian determinant {:e} at quadrature point {}", det, q);
            }
            let j_inv_t = j
                .try_inverse()
                .ok_or_else(|| eyre!("singular Jacobian at quadrature point {}", q))?
                .transpose();

            let gradients = &mut geometry.gradients[n * q..n * (q + 1)];
            element.populate_basis_gradients(gradients, xi);
            for g in gradients.iter_mut() {
                *g = j_inv_t * *g;
            }
            element.populate_basis(&mut geometry.basis[n * q..n * (q + 1)], xi);
            geometry.points.push(element.map_reference_coords(xi));
            geometry.jxw.push(w * det);
        }
        Ok(geometry)
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.jxw.len()
    }

    /// Quadrature weight times Jacobian determinant.
    pub fn jxw(&self, q: usize) -> f64 {
        self.jxw[q]
    }

    pub fn point(&self, q: usize) -> &Point3<f64> {
        &self.points[q]
    }

    pub fn basis(&self, q: usize) -> &[f64] {
        &self.basis[self.num_nodes * q..self.num_nodes * (q + 1)]
    }

    /// Gradients of the basis functions with respect to the reference configuration.
    pub fn gradients(&self, q: usize) -> &[Vector3<f64>] {
        &self.gradients[self.num_nodes * q..self.num_nodes * (q + 1)]
    }

    pub fn volume(&self) -> f64 {
        self.jxw.iter().sum()
    }
}

/// Quadrature data of a boundary face of a cell, for integrating surface loads.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceGeometry {
    /// Position of every face node among the nodes of the cell.
    local_nodes: Vec<usize>,
    points: Vec<Point3<f64>>,
    basis: Vec<f64>,
    /// Outward unit normal scaled by quadrature weight and area ratio.
    weighted_normals: Vec<Vector3<f64>>,
}

impl FaceGeometry {
    /// Normals are oriented away from `cell_centroid`.
    pub fn from_element<E>(
        element: &E,
        local_nodes: Vec<usize>,
        quadrature: &QuadraturePair2d<f64>,
        cell_centroid: &Point3<f64>,
    ) -> Self
    where
        E: SurfaceFiniteElement<f64>,
    {
        let (weights, points) = quadrature;
        let n = element.num_nodes();
        assert_eq!(local_nodes.len(), n);
        let mut basis = vec![0.0; n * points.len()];
        let mut face_points = Vec::with_capacity(points.len());
        let mut weighted_normals = Vec::with_capacity(points.len());
        for (q, (w, xi)) in weights.iter().zip(points).enumerate() {
            element.populate_basis(&mut basis[n * q..n * (q + 1)], xi);
            face_points.push(element.map_reference_coords(xi));
            weighted_normals.push(element.scaled_normal(xi) * *w);
        }

        let outwardness: f64 = face_points
            .iter()
            .zip(&weighted_normals)
            .map(|(x, n)| n.dot(&(x - cell_centroid)))
            .sum();
        if outwardness < 0.0 {
            for n in &mut weighted_normals {
                *n = -*n;
            }
        }

        Self {
            local_nodes,
            points: face_points,
            basis,
            weighted_normals,
        }
    }

    pub fn local_nodes(&self) -> &[usize] {
        &self.local_nodes
    }

    pub fn area(&self) -> f64 {
        self.weighted_normals.iter().map(|n| n.norm()).sum()
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.points.len()
    }
}

/// Adds $\int_\Gamma p \\, N_a \vec n \\, dA$ for every face node `a` to the residual of the cell.
///
/// The load acts on the reference configuration and does not depend on the displacement.
pub fn add_pressure_load<P>(face: &FaceGeometry, pressure: P, mut residual: DVectorViewMut<f64>)
where
    P: Fn(&Point3<f64>) -> f64,
{
    let n = face.local_nodes.len();
    for q in 0..face.num_quadrature_points() {
        let p = pressure(&face.points[q]);
        let basis = &face.basis[n * q..n * (q + 1)];
        for (&local_node, &phi) in face.local_nodes.iter().zip(basis) {
            for k in 0..3 {
                residual[3 * local_node + k] += p * phi * face.weighted_normals[q][k];
            }
        }
    }
}

/// Residual $\int_\Omega \vec P : \nabla \delta \vec u \\, dV$ of a cell for the nodal
/// displacements `u`, ordered by node and then by component.
///
/// Generic over the scalar so that it can be evaluated with dual numbers.
pub fn elastic_cell_residual<T, M>(
    material: &M,
    geometry: &CellGeometry,
    fiber: &Vector3<f64>,
    u: &[T],
    residual: &mut [T],
) where
    T: AdReal,
    M: StressLaw,
{
    let n = geometry.num_nodes();
    assert_eq!(u.len(), 3 * n);
    assert_eq!(residual.len(), 3 * n);
    residual.fill(T::zero());

    for q in 0..geometry.num_quadrature_points() {
        let gradients = geometry.gradients(q);
        let h = Matrix3::from_fn(|i, j| {
            let mut h_ij = T::zero();
            for (a, g) in gradients.iter().enumerate() {
                h_ij += u[3 * a + i] * g[j];
            }
            h_ij
        });
        let f = deformation_gradient(&h);
        let e = green_lagrange_strain(&f);
        let s = material.second_piola_kirchhoff(&e, fiber);
        let p = first_piola_kirchhoff(&f, &s);

        let jxw = geometry.jxw(q);
        for (a, g) in gradients.iter().enumerate() {
            for k in 0..3 {
                let mut r = T::zero();
                for j in 0..3 {
                    r += p[(k, j)] * g[j];
                }
                residual[3 * a + k] += r * jxw;
            }
        }
    }
}

/// Reusable buffers of dual numbers for [`assemble_elastic_cell`].
#[derive(Debug, Default)]
pub struct DualWorkspace {
    u: Vec<Dual64>,
    residual: Vec<Dual64>,
}

/// Computes the residual of a cell and its exact Jacobian by forward-mode automatic
/// differentiation, seeding one displacement component at a time.
///
/// Returns an error if any entry is not finite.
pub fn assemble_elastic_cell<M: StressLaw>(
    material: &M,
    geometry: &CellGeometry,
    fiber: &Vector3<f64>,
    u: DVectorView<f64>,
    mut residual: DVectorViewMut<f64>,
    mut jacobian: DMatrixViewMut<f64>,
    workspace: &mut DualWorkspace,
) -> eyre::Result<()> {
    let m = u.len();
    assert_eq!(residual.len(), m);
    assert_eq!(jacobian.shape(), (m, m));

    workspace.u.clear();
    workspace
        .u
        .extend(u.iter().map(|&u_i| Dual64::new(u_i, 0.0)));
    workspace.residual.resize(m, Dual64::new(0.0, 0.0));

    for col in 0..m {
        workspace.u[col].eps = 1.0;
        elastic_cell_residual(material, geometry, fiber, &workspace.u, &mut workspace.residual);
        workspace.u[col].eps = 0.0;

        for (row, r) in workspace.residual.iter().enumerate() {
            jacobian[(row, col)] = r.eps;
        }
        if col == 0 {
            for (r_i, r) in residual.iter_mut().zip(&workspace.residual) {
                *r_i = r.re;
            }
        }
    }

    if residual.iter().chain(jacobian.iter()).any(|x| !x.is_finite()) {
        bail!("non-finite residual or Jacobian entry");
    }
    Ok(())
}

/// Residual $K \vec u - \vec f$ and Jacobian $K$ of the scalar diffusion problem
/// $-\nabla \cdot \nabla u = f$ on a cell, with a constant source $f$.
pub fn assemble_diffusion_cell(
    geometry: &CellGeometry,
    source: f64,
    u: DVectorView<f64>,
    mut residual: DVectorViewMut<f64>,
    mut jacobian: DMatrixViewMut<f64>,
) -> eyre::Result<()> {
    let n = geometry.num_nodes();
    assert_eq!(u.len(), n);
    jacobian.fill(0.0);
    residual.fill(0.0);

    for q in 0..geometry.num_quadrature_points() {
        let jxw = geometry.jxw(q);
        let gradients = geometry.gradients(q);
        for (a, (g_a, phi_a)) in gradients.iter().zip(geometry.basis(q)).enumerate() {
            for (b, g_b) in gradients.iter().enumerate() {
                jacobian[(a, b)] += g_a.dot(g_b) * jxw;
            }
            residual[a] -= source * phi_a * jxw;
        }
    }
    residual.gemv(1.0, &jacobian, &u, 1.0);

    if residual.iter().any(|x| !x.is_finite()) {
        bail!("non-finite residual entry");
    }
    Ok(())
}
