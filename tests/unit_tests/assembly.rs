use super::mesh_geometry;
use cardiax::assembly::global::{compress, DistributedAssembler};
use cardiax::assembly::local::{
    add_pressure_load, assemble_diffusion_cell, assemble_elastic_cell, elastic_cell_residual, CellGeometry,
    DualWorkspace, ElementConnectivityAssembler, ElementSystemAssembler, FaceGeometry,
};
use cardiax::connectivity::{Connectivity, ElementConnectivity, Hex8Connectivity, Tet4Connectivity};
use cardiax::element::{Hex8Element, Tet4Element, VolumeFiniteElement};
use cardiax::error::AssemblyError;
use cardiax::mesh::procedural::{create_unit_box_uniform_hex_mesh, create_unit_box_uniform_tet_mesh, BOX_X_MAX};
use cardiax::mesh::Mesh;
use cardiax::partition::{DofMap, MeshPartition};
use cardiax::quadrature::{hex_quadrature_strength_3, tet_quadrature_strength_2};
use cardiax::vector::{DistributedVector, GhostedVector};
use cardiax_optimize::calculus::approximate_jacobian_fd;
use cardiax_solid::active::ActiveFiberStress;
use cardiax_solid::guccione::GuccioneMaterial;
use cardiax_solid::StressLaw;
use eyre::bail;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Point3, Rotation3, Unit, Vector3};
use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;

fn distorted_hex_geometry() -> CellGeometry {
    let reference = Hex8Element::<f64>::reference();
    let mut vertices = [Point3::origin(); 8];
    for (v, x) in vertices.iter_mut().zip(reference.vertices()) {
        *v = Point3::from(0.5 * x.coords + Vector3::new(0.05 * x.y, -0.03 * x.z, 0.02 * x.x * x.y));
    }
    CellGeometry::from_element(&Hex8Element::from_vertices(vertices), &hex_quadrature_strength_3()).unwrap()
}

fn tet_geometry() -> CellGeometry {
    let element = Tet4Element::from_vertices([
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.1, 0.0),
        Point3::new(0.2, 0.9, 0.1),
        Point3::new(0.1, 0.0, 1.2),
    ]);
    CellGeometry::from_element(&element, &tet_quadrature_strength_2()).unwrap()
}

fn cell_residual<M: StressLaw>(material: &M, geometry: &CellGeometry, fiber: &Vector3<f64>, u: &[f64]) -> DVector<f64> {
    let mut residual = vec![0.0; u.len()];
    elastic_cell_residual(material, geometry, fiber, u, &mut residual);
    DVector::from_vec(residual)
}

/// Jacobian of the cell residual by centered finite differences.
fn finite_difference_jacobian<M: StressLaw>(
    material: &M,
    geometry: &CellGeometry,
    fiber: &Vector3<f64>,
    u: &[f64],
    h: f64,
) -> DMatrix<f64> {
    let mut u = DVector::from_column_slice(u);
    approximate_jacobian_fd(
        u.len(),
        |u: DVectorView<f64>, mut residual: DVectorViewMut<f64>| {
            elastic_cell_residual(material, geometry, fiber, u.as_slice(), residual.as_mut_slice())
        },
        &mut u,
        h,
    )
}

fn ad_system<M: StressLaw>(
    material: &M,
    geometry: &CellGeometry,
    fiber: &Vector3<f64>,
    u: &[f64],
) -> (DVector<f64>, DMatrix<f64>) {
    let m = u.len();
    let u = DVector::from_column_slice(u);
    let mut residual = DVector::zeros(m);
    let mut jacobian = DMatrix::zeros(m, m);
    let mut workspace = DualWorkspace::default();
    assemble_elastic_cell(
        material,
        geometry,
        fiber,
        u.as_view(),
        residual.as_view_mut(),
        jacobian.as_view_mut(),
        &mut workspace,
    )
    .unwrap();
    (residual, jacobian)
}

fn check_ad_jacobian_against_finite_differences(geometry: &CellGeometry, u: &[f64]) {
    let material = ActiveFiberStress::new(GuccioneMaterial::default(), 60.0);
    let fiber = Vector3::new(1.0, 1.0, 0.0).normalize();
    let (residual, jacobian) = ad_system(&material, geometry, &fiber, u);
    let fd = finite_difference_jacobian(&material, geometry, &fiber, u, 1e-6);

    assert_matrix_eq!(residual, cell_residual(&material, geometry, &fiber, u), comp = abs, tol = 1e-12);
    let scale = jacobian.amax().max(1.0);
    assert_matrix_eq!(jacobian, fd, comp = abs, tol = 1e-6 * scale);
}

#[test]
fn zero_displacement_gives_zero_residual() {
    let geometry = distorted_hex_geometry();
    let material = GuccioneMaterial::default();
    let (residual, jacobian) = ad_system(&material, &geometry, &Vector3::x(), &[0.0; 24]);
    assert_eq!(residual, DVector::zeros(24));
    // The tangent at the reference configuration is symmetric
    assert_matrix_eq!(jacobian, jacobian.transpose(), comp = abs, tol = 1e-9 * jacobian.amax());
}

#[test]
fn rigid_translation_gives_zero_residual() {
    let geometry = tet_geometry();
    let material = GuccioneMaterial::default();
    let u: Vec<f64> = (0..4).flat_map(|_| [0.3, -0.2, 0.7]).collect();
    let residual = cell_residual(&material, &geometry, &Vector3::x(), &u);
    assert_matrix_eq!(residual, DVector::zeros(12), comp = abs, tol = 1e-12);
}

#[test]
fn active_tension_loads_undeformed_cell() {
    let geometry = tet_geometry();
    let passive = GuccioneMaterial::default();
    let fiber = Vector3::x();
    let zero = [0.0; 12];
    let active = ActiveFiberStress::new(passive, 10.0);
    assert!(cell_residual(&active, &geometry, &fiber, &zero).norm() > 0.0);
    // Without fiber the active term vanishes exactly
    assert_eq!(
        cell_residual(&active, &geometry, &Vector3::zeros(), &zero),
        DVector::zeros(12)
    );
}

#[test]
fn pressure_load_integrates_to_total_force() {
    for cells_per_dim in [1, 2] {
        let mesh = create_unit_box_uniform_hex_mesh(cells_per_dim);
        let mut force = Vector3::zeros();
        for face in mesh.boundary_faces() {
            if face.boundary_id != BOX_X_MAX {
                continue;
            }
            let cell = &mesh.connectivity()[face.cell];
            let local_nodes: Vec<_> = face
                .connectivity
                .vertex_indices()
                .iter()
                .map(|v| cell.vertex_indices().iter().position(|w| w == v).unwrap())
                .collect();
            let element = Hex8Connectivity::face_element(&face.connectivity, mesh.vertices()).unwrap();
            let geometry = FaceGeometry::from_element(
                &element,
                local_nodes,
                &<Hex8Connectivity as ElementConnectivity<f64>>::face_quadrature(),
                &mesh.cell_centroid(face.cell),
            );
            let mut residual = DVector::zeros(24);
            add_pressure_load(&geometry, |_| 2.0, residual.as_view_mut());
            for a in 0..8 {
                force += Vector3::new(residual[3 * a], residual[3 * a + 1], residual[3 * a + 2]);
            }
        }
        // The outward normal of the face x = 1 points along +x
        assert_matrix_eq!(force, Vector3::new(2.0, 0.0, 0.0), comp = abs, tol = 1e-12);
    }
}

#[test]
fn face_normals_point_out_of_tet_mesh() {
    let mesh = create_unit_box_uniform_tet_mesh(2);
    let mut total_area = 0.0;
    let mut net_force = Vector3::zeros();
    for face in mesh.boundary_faces() {
        let cell = &mesh.connectivity()[face.cell];
        let local_nodes: Vec<_> = face
            .connectivity
            .vertex_indices()
            .iter()
            .map(|v| cell.vertex_indices().iter().position(|w| w == v).unwrap())
            .collect();
        let element = Tet4Connectivity::face_element(&face.connectivity, mesh.vertices()).unwrap();
        let geometry = FaceGeometry::from_element(
            &element,
            local_nodes,
            &<Tet4Connectivity as ElementConnectivity<f64>>::face_quadrature(),
            &mesh.cell_centroid(face.cell),
        );
        total_area += geometry.area();

        let mut residual = DVector::zeros(12);
        add_pressure_load(&geometry, |x| x.x, residual.as_view_mut());
        for a in 0..4 {
            net_force += Vector3::new(residual[3 * a], residual[3 * a + 1], residual[3 * a + 2]);
        }
    }
    assert_scalar_eq!(total_area, 6.0, comp = abs, tol = 1e-12);
    // By the divergence theorem, the integral of x n over the surface is the volume times e_x
    assert_matrix_eq!(net_force, Vector3::new(1.0, 0.0, 0.0), comp = abs, tol = 1e-12);
}

#[test]
fn diffusion_cell_matrix_is_symmetric_and_annihilates_constants() {
    let geometry = distorted_hex_geometry();
    let mut residual = DVector::zeros(8);
    let mut jacobian = DMatrix::zeros(8, 8);
    let u = DVector::from_element(8, 3.0);
    assemble_diffusion_cell(&geometry, 0.0, u.as_view(), residual.as_view_mut(), jacobian.as_view_mut()).unwrap();
    assert_matrix_eq!(jacobian, jacobian.transpose(), comp = abs, tol = 1e-14);
    assert_matrix_eq!(residual, DVector::zeros(8), comp = abs, tol = 1e-13);

    // A unit source distributes the cell volume over the nodes
    let zero = DVector::zeros(8);
    assemble_diffusion_cell(&geometry, 1.0, zero.as_view(), residual.as_view_mut(), jacobian.as_view_mut()).unwrap();
    assert_scalar_eq!(-residual.sum(), geometry.volume(), comp = abs, tol = 1e-14);
}

/// Scalar diffusion on a mesh, optionally failing in a single cell.
struct DiffusionTestAssembler<'a, C> {
    connectivity: &'a [C],
    geometry: &'a [CellGeometry],
    failing_cell: Option<usize>,
}

impl<'a, C: Connectivity> ElementConnectivityAssembler for DiffusionTestAssembler<'a, C> {
    fn solution_dim(&self) -> usize {
        1
    }

    fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity[element_index].vertex_indices().len()
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        output.copy_from_slice(self.connectivity[element_index].vertex_indices());
    }
}

impl<'a, C: Connectivity> ElementSystemAssembler for DiffusionTestAssembler<'a, C> {
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        solution: DVectorView<f64>,
        residual: DVectorViewMut<f64>,
        jacobian: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        if self.failing_cell == Some(element_index) {
            bail!("synthetic failure");
        }
        assemble_diffusion_cell(&self.geometry[element_index], 1.0, solution, residual, jacobian)
    }
}

/// Assembles the diffusion system and returns it in the vertex numbering of the mesh.
fn assemble_in_mesh_numbering<C: ElementConnectivity<f64>>(
    mesh: &Mesh<C>,
    num_ranks: usize,
    vertex_values: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let geometry = mesh_geometry(mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), num_ranks);
    let dof_map = Arc::new(DofMap::new(&partition, 1));
    let n = dof_map.num_dofs();

    let mut solution = DistributedVector::zeros(Arc::clone(&dof_map));
    for v in 0..n {
        solution.values_mut()[dof_map.dof(v, 0)] = vertex_values[v];
    }
    let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
    ghosted.update_ghost_values(&solution);

    let assembler = DiffusionTestAssembler {
        connectivity: mesh.connectivity(),
        geometry: &geometry,
        failing_cell: None,
    };
    let system = DistributedAssembler::new()
        .assemble_system(&partition, &dof_map, &assembler, &solution, &ghosted)
        .unwrap();

    let jacobian = DMatrix::from(&system.jacobian);
    let residual = system.residual.as_vector();
    let matrix = DMatrix::from_fn(n, n, |i, j| jacobian[(dof_map.dof(i, 0), dof_map.dof(j, 0))]);
    let rhs = DVector::from_fn(n, |i, _| residual[dof_map.dof(i, 0)]);
    (matrix, rhs)
}

#[test]
fn multi_rank_assembly_matches_single_rank() {
    let hex = create_unit_box_uniform_hex_mesh(3);
    let values = DVector::from_fn(hex.vertices().len(), |i, _| (i as f64).sqrt());
    let (reference_matrix, reference_residual) = assemble_in_mesh_numbering(&hex, 1, &values);
    for num_ranks in [2, 3, 5] {
        let (matrix, residual) = assemble_in_mesh_numbering(&hex, num_ranks, &values);
        assert_matrix_eq!(matrix, reference_matrix, comp = abs, tol = 1e-13);
        assert_matrix_eq!(residual, reference_residual, comp = abs, tol = 1e-13);
    }

    let tet = create_unit_box_uniform_tet_mesh(2);
    let values = DVector::from_fn(tet.vertices().len(), |i, _| (i as f64 * 0.1).cos());
    let (reference_matrix, reference_residual) = assemble_in_mesh_numbering(&tet, 1, &values);
    let (matrix, residual) = assemble_in_mesh_numbering(&tet, 4, &values);
    assert_matrix_eq!(matrix, reference_matrix, comp = abs, tol = 1e-13);
    assert_matrix_eq!(residual, reference_residual, comp = abs, tol = 1e-13);
}

#[test]
fn off_process_contributions_are_exchanged() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 2);
    let dof_map = Arc::new(DofMap::new(&partition, 1));
    let solution = DistributedVector::zeros(Arc::clone(&dof_map));
    let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
    ghosted.update_ghost_values(&solution);
    let assembler = DiffusionTestAssembler {
        connectivity: mesh.connectivity(),
        geometry: &geometry,
        failing_cell: None,
    };

    let contributions = DistributedAssembler::new()
        .accumulate(&partition, &dof_map, &assembler, &solution, &ghosted)
        .unwrap();
    // Rank 1 touches vertices on the interface that are owned by rank 0
    assert_eq!(contributions[0].num_off_process_entries(), 0);
    assert!(contributions[1].num_off_process_entries() > 0);

    let system = compress(&dof_map, contributions).unwrap();
    // The source integrates to the volume of the box
    assert_scalar_eq!(-system.residual.as_vector().sum(), 1.0, comp = abs, tol = 1e-13);
}

#[test]
fn stale_ghost_values_are_rejected() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 2);
    let dof_map = Arc::new(DofMap::new(&partition, 1));
    let mut solution = DistributedVector::zeros(Arc::clone(&dof_map));
    let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
    ghosted.update_ghost_values(&solution);
    solution.values_mut()[0] = 1.0;

    let assembler = DiffusionTestAssembler {
        connectivity: mesh.connectivity(),
        geometry: &geometry,
        failing_cell: None,
    };
    let result = DistributedAssembler::new().assemble_system(&partition, &dof_map, &assembler, &solution, &ghosted);
    assert!(matches!(result, Err(AssemblyError::StaleGhostValues)));
}

#[test]
fn failing_cell_is_named_in_error() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 3);
    let dof_map = Arc::new(DofMap::new(&partition, 1));
    let solution = DistributedVector::zeros(Arc::clone(&dof_map));
    let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
    ghosted.update_ghost_values(&solution);

    let assembler = DiffusionTestAssembler {
        connectivity: mesh.connectivity(),
        geometry: &geometry,
        failing_cell: Some(5),
    };
    let result = DistributedAssembler::new().assemble_system(&partition, &dof_map, &assembler, &solution, &ghosted);
    match result {
        Err(AssemblyError::Cell { cell, .. }) => assert_eq!(cell, 5),
        other => panic!("expected cell error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn inverted_cell_is_rejected() {
    let reference = Tet4Element::<f64>::reference();
    let mut vertices = [Point3::origin(); 4];
    vertices.copy_from_slice(reference.vertices());
    vertices.swap(1, 2);
    let result = CellGeometry::from_element(&Tet4Element::from_vertices(vertices), &tet_quadrature_strength_2());
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn hex_ad_jacobian_matches_finite_differences(u in vec(-0.1..0.1f64, 24)) {
        check_ad_jacobian_against_finite_differences(&distorted_hex_geometry(), &u);
    }

    #[test]
    fn tet_ad_jacobian_matches_finite_differences(u in vec(-0.1..0.1f64, 12)) {
        check_ad_jacobian_against_finite_differences(&tet_geometry(), &u);
    }

    #[test]
    fn rigid_rotation_gives_zero_residual(
        axis in prop::array::uniform3(-1.0..1.0f64),
        angle in -3.0..3.0f64,
    ) {
        let axis = Vector3::from(axis);
        prop_assume!(axis.norm() > 1e-3);
        let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
        let reference = Hex8Element::<f64>::reference();
        let geometry = distorted_hex_geometry();
        // Displacements (R - I) X at the nodes of the distorted element
        let mut u = Vec::with_capacity(24);
        for x in reference.vertices() {
            let x = 0.5 * x.coords + Vector3::new(0.05 * x.y, -0.03 * x.z, 0.02 * x.x * x.y);
            u.extend((rotation * x - x).iter().copied());
        }
        let residual = cell_residual(&GuccioneMaterial::default(), &geometry, &Vector3::x(), &u);
        prop_assert!(residual.norm() <= 1e-9);
    }
}
