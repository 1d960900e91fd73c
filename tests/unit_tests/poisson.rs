use super::mesh_geometry;
use cardiax::config::PoissonConfig;
use cardiax::error::SolverError;
use cardiax::mesh::procedural::{
    create_idealized_lv_hex_mesh, create_unit_box_uniform_hex_mesh, create_unit_box_uniform_tet_mesh,
    LvMeshParameters, BOX_X_MAX, BOX_X_MIN, LV_ENDOCARDIUM, LV_EPICARDIUM,
};
use cardiax::partition::{DofMap, MeshPartition};
use cardiax::poisson::solve_transmural_field;
use cardiax_solid::fiber::ProlateSpheroid;
use matrixcompare::assert_scalar_eq;

fn box_config(source: f64) -> PoissonConfig {
    let mut config = PoissonConfig {
        endocardium: vec![BOX_X_MIN],
        epicardium: vec![BOX_X_MAX],
        source,
        ..PoissonConfig::default()
    };
    config.linear_solver.relative_tolerance = 1e-12;
    config
}

#[test]
fn transmural_field_is_linear_without_source() {
    let mesh = create_unit_box_uniform_tet_mesh(3);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 2);
    let field = solve_transmural_field(&mesh, &partition, &geometry, &box_config(0.0)).unwrap();

    assert_eq!(field.num_dofs(), mesh.vertices().len());
    for dof in 0..field.num_dofs() {
        let x = field.support_point(dof);
        assert_scalar_eq!(field.value(dof), x.x, comp = abs, tol = 1e-9);
    }
}

#[test]
fn constant_source_gives_exact_nodal_values() {
    // The solution only varies along x, where linear elements are exact at the nodes
    let source = 2.0;
    let mesh = create_unit_box_uniform_hex_mesh(4);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let field = solve_transmural_field(&mesh, &partition, &geometry, &box_config(source)).unwrap();

    for dof in 0..field.num_dofs() {
        let x = field.support_point(dof).x;
        let expected = x + 0.5 * source * x * (1.0 - x);
        assert_scalar_eq!(field.value(dof), expected, comp = abs, tol = 1e-9);
    }
}

#[test]
fn cell_values_follow_cell_vertices() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 3);
    let field = solve_transmural_field(&mesh, &partition, &geometry, &box_config(0.0)).unwrap();

    let dof_map = DofMap::new(&partition, 1);
    for (cell_index, cell) in mesh.connectivity().iter().enumerate() {
        let values: Vec<_> = field.cell_values(cell_index).collect();
        assert_eq!(values.len(), 8);
        for (&vertex, (x, t)) in cell.0.iter().zip(values) {
            assert_eq!(x, mesh.vertices()[vertex]);
            assert_eq!(t, field.value(dof_map.dof(vertex, 0)));
        }
    }
}

#[test]
fn lv_transmural_field_spans_the_wall() {
    let params = LvMeshParameters {
        circumferential: 8,
        longitudinal: 4,
        transmural: 3,
        ..LvMeshParameters::default()
    };
    let mesh = create_idealized_lv_hex_mesh(&ProlateSpheroid::default(), &params);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 2);
    let mut config = PoissonConfig::default();
    config.linear_solver.relative_tolerance = 1e-12;
    let field = solve_transmural_field(&mesh, &partition, &geometry, &config).unwrap();

    let dof_map = DofMap::new(&partition, 1);
    for v in mesh.vertices_with_boundary_id(LV_ENDOCARDIUM) {
        assert_eq!(field.value(dof_map.dof(v, 0)), 0.0);
    }
    for v in mesh.vertices_with_boundary_id(LV_EPICARDIUM) {
        assert_eq!(field.value(dof_map.dof(v, 0)), 1.0);
    }
    // Discrete maximum principle, up to the solver tolerance
    assert!(field
        .values()
        .iter()
        .all(|&t| (-1e-8..=1.0 + 1e-8).contains(&t)));
    assert!(field.values().iter().any(|&t| t > 0.1 && t < 0.9));
}

#[test]
fn missing_wall_boundaries_are_an_error() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let geometry = mesh_geometry(&mesh);
    let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), 1);
    let config = PoissonConfig {
        endocardium: vec![17],
        epicardium: vec![18],
        ..PoissonConfig::default()
    };
    let result = solve_transmural_field(&mesh, &partition, &geometry, &config);
    assert!(matches!(result, Err(SolverError::Mesh(_))));
}
