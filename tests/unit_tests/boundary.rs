use cardiax::boundary::{dirichlet_scale, homogeneous_dirichlet, BoundaryClassification, BoundaryKind, DirichletConstraints};
use cardiax::error::BoundaryError;
use cardiax::mesh::procedural::{create_unit_box_uniform_hex_mesh, BOX_X_MAX, BOX_X_MIN, BOX_Y_MIN};
use cardiax::partition::{DofMap, MeshPartition};
use matrixcompare::assert_matrix_eq;
use nalgebra::{dvector, DMatrix, DVector, Point3, Vector3};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::sync::Arc;

fn csr_from_dense(dense: &DMatrix<f64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(dense.nrows(), dense.ncols());
    for i in 0..dense.nrows() {
        for j in 0..dense.ncols() {
            if dense[(i, j)] != 0.0 {
                coo.push(i, j, dense[(i, j)]);
            }
        }
    }
    CsrMatrix::from(&coo)
}

#[test]
fn boundary_ids_are_classified_once() {
    let mut classification = BoundaryClassification::new();
    classification.add_neumann(1).unwrap();
    classification
        .add_dirichlet(2, homogeneous_dirichlet())
        .unwrap();

    assert_eq!(classification.kind(1), BoundaryKind::Neumann);
    assert_eq!(classification.kind(2), BoundaryKind::Dirichlet);
    assert_eq!(classification.kind(3), BoundaryKind::TractionFree);

    assert_eq!(
        classification.add_dirichlet(1, homogeneous_dirichlet()),
        Err(BoundaryError::Conflict { boundary_id: 1 })
    );
    assert_eq!(classification.add_neumann(2), Err(BoundaryError::Conflict { boundary_id: 2 }));
}

#[test]
fn constraints_collect_prescribed_values() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let dof_map = DofMap::new(&partition, 3);

    let mut classification = BoundaryClassification::new();
    classification
        .add_dirichlet(BOX_X_MIN, homogeneous_dirichlet())
        .unwrap();
    classification
        .add_dirichlet(BOX_X_MAX, Arc::new(|x: &Point3<f64>| Vector3::new(0.1, 0.0, x.z)))
        .unwrap();
    let constraints = DirichletConstraints::from_classification(&mesh, &dof_map, &classification);

    // All 8 vertices of the single cell lie on one of the two faces
    assert_eq!(constraints.len(), 24);
    for (v, x) in mesh.vertices().iter().enumerate() {
        let dof = dof_map.dof(v, 2);
        assert!(constraints.is_constrained(dof));
        let index = constraints.dofs().binary_search(&dof).unwrap();
        let expected = if x.x == 0.0 { 0.0 } else { x.z };
        assert_eq!(constraints.values()[index], expected);
    }
}

#[test]
fn lowest_boundary_id_wins_at_shared_vertices() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let dof_map = DofMap::new(&partition, 1);
    let constraints = DirichletConstraints::from_boundary_values(&mesh, &dof_map, |id, _, _| match id {
        BOX_X_MIN => Some(1.0),
        BOX_Y_MIN => Some(2.0),
        _ => None,
    });

    // Vertex 0 lies on both faces
    let index = constraints
        .dofs()
        .binary_search(&dof_map.dof(0, 0))
        .unwrap();
    assert_eq!(constraints.values()[index], 1.0);
    assert_eq!(constraints.len(), 6);
}

#[test]
fn elimination_keeps_symmetry_and_prescribes_values() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let dof_map = DofMap::new(&partition, 1);
    // Constrain only the first vertex of the x = 0 face
    let constraints = DirichletConstraints::from_boundary_values(&mesh, &dof_map, |id, x, _| {
        (id == BOX_X_MIN && x.y == 0.0 && x.z == 0.0).then(|| 3.0)
    });
    assert_eq!(constraints.dofs(), &[0]);

    let n = 8;
    let dense = DMatrix::from_fn(n, n, |i, j| if i == j { 4.0 } else if (i + j) % 3 == 0 { -1.0 } else { 0.0 });
    let mut matrix = csr_from_dense(&dense);
    let mut rhs = DVector::from_element(n, 1.0);
    let scale = dirichlet_scale(&matrix);
    assert_eq!(scale, 4.0);
    constraints
        .eliminate(&mut matrix, &mut rhs, constraints.values(), scale)
        .unwrap();

    let eliminated = DMatrix::from(&matrix);
    assert_matrix_eq!(eliminated, eliminated.transpose());
    assert_eq!(eliminated[(0, 0)], 4.0);
    assert_eq!(rhs[0], 12.0);
    for i in 1..n {
        assert_eq!(eliminated[(i, 0)], 0.0);
        assert_eq!(rhs[i], 1.0 - dense[(i, 0)] * 3.0);
    }

    // The solution of the eliminated system has the prescribed value
    let x = eliminated.lu().solve(&rhs).unwrap();
    assert_matrix_eq!(x.rows(0, 1), dvector![3.0], comp = abs, tol = 1e-14);
    let full_residual = &dense * &x - DVector::from_element(n, 1.0);
    assert_matrix_eq!(full_residual.rows(1, n - 1), DVector::<f64>::zeros(n - 1), comp = abs, tol = 1e-13);
}

#[test]
fn constrained_row_without_diagonal_is_an_error() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let dof_map = DofMap::new(&partition, 1);
    let constraints = DirichletConstraints::from_boundary_values(&mesh, &dof_map, |_, _, _| Some(0.0));
    // The first two rows only couple to each other
    let dense = DMatrix::from_fn(8, 8, |i, j| match (i, j) {
        (0, 1) | (1, 0) => 1.0,
        (i, j) if i == j && i >= 2 => 1.0,
        _ => 0.0,
    });
    let mut matrix = csr_from_dense(&dense);
    let mut rhs = DVector::zeros(8);
    let result = constraints.eliminate(&mut matrix, &mut rhs, constraints.values(), 1.0);
    assert_eq!(result, Err(BoundaryError::MissingDiagonal { dof: 0 }));
}
