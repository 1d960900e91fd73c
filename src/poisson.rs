//! The auxiliary transmural coordinate, obtained from a scalar diffusion problem.
//!
//! Solves $-\Delta t = f$ with $t = 0$ on the endocardium and $t = 1$ on the epicardium. All
//! other boundaries carry homogeneous Neumann conditions.
use crate::assembly::global::DistributedAssembler;
use crate::assembly::local::{assemble_diffusion_cell, CellGeometry, ElementConnectivityAssembler, ElementSystemAssembler};
use crate::boundary::{dirichlet_scale, DirichletConstraints};
use crate::config::PoissonConfig;
use crate::connectivity::Connectivity;
use crate::error::SolverError;
use crate::linear_solver::solve_linear_system;
use crate::mesh::Mesh;
use crate::partition::{DofMap, MeshPartition};
use crate::vector::{DistributedVector, GhostedVector};
use log::info;
use nalgebra::{DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Point3};
use std::sync::Arc;

/// A scalar field with one value per auxiliary degree of freedom.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryField {
    values: DVector<f64>,
    cell_dofs: Vec<Vec<usize>>,
    support_points: Vec<Point3<f64>>,
}

impl AuxiliaryField {
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn num_dofs(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, dof: usize) -> f64 {
        debug_assert!(dof < self.values.len(), "auxiliary dof {} out of range", dof);
        self.values[dof]
    }

    /// Auxiliary degrees of freedom of a cell.
    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        &self.cell_dofs[cell]
    }

    /// Position of the node associated with an auxiliary degree of freedom.
    pub fn support_point(&self, dof: usize) -> &Point3<f64> {
        debug_assert!(dof < self.support_points.len(), "auxiliary dof {} out of range", dof);
        &self.support_points[dof]
    }

    /// Support points and values of the degrees of freedom of a cell.
    pub fn cell_values(&self, cell: usize) -> impl Iterator<Item = (Point3<f64>, f64)> + '_ {
        self.cell_dofs(cell)
            .iter()
            .map(move |&dof| (*self.support_point(dof), self.value(dof)))
    }
}

struct DiffusionAssembler<'a, C> {
    connectivity: &'a [C],
    geometry: &'a [CellGeometry],
    source: f64,
}

impl<'a, C: Connectivity> ElementConnectivityAssembler for DiffusionAssembler<'a, C> {
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

impl<'a, C: Connectivity> ElementSystemAssembler for DiffusionAssembler<'a, C> {
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        solution: DVectorView<f64>,
        residual: DVectorViewMut<f64>,
        jacobian: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        assemble_diffusion_cell(&self.geometry[element_index], self.source, solution, residual, jacobian)
    }
}

/// Assembles and solves the transmural diffusion problem once.
///
/// `geometry` holds the precomputed geometry of every cell of the mesh.
pub fn solve_transmural_field<C>(
    mesh: &Mesh<C>,
    partition: &MeshPartition,
    geometry: &[CellGeometry],
    config: &PoissonConfig,
) -> Result<AuxiliaryField, SolverError>
where
    C: Connectivity + Sync,
{
    let dof_map = Arc::new(DofMap::new(partition, 1));
    let constraints = DirichletConstraints::from_boundary_values(mesh, &dof_map, |boundary_id, _, _| {
        if config.endocardium.contains(&boundary_id) {
            Some(0.0)
        } else if config.epicardium.contains(&boundary_id) {
            Some(1.0)
        } else {
            None
        }
    });
    if constraints.is_empty() {
        return Err(SolverError::Mesh(
            "no endocardial or epicardial boundary found for the transmural field".to_string(),
        ));
    }

    let assembler = DiffusionAssembler {
        connectivity: mesh.connectivity(),
        geometry,
        source: config.source,
    };
    let solution = DistributedVector::zeros(Arc::clone(&dof_map));
    let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
    ghosted.update_ghost_values(&solution);

    // The problem is linear, so a single Newton step from zero solves it exactly
    let system = DistributedAssembler::new().assemble_system(partition, &dof_map, &assembler, &solution, &ghosted)?;
    let mut matrix = system.jacobian;
    let mut rhs = -system.residual.into_vector();
    let scale = dirichlet_scale(&matrix);
    constraints.eliminate(&mut matrix, &mut rhs, constraints.values(), scale)?;

    let mut values = DVector::zeros(dof_map.num_dofs());
    let output = solve_linear_system(&config.linear_solver, &matrix, &rhs, &mut values)
        .map_err(SolverError::AuxiliaryField)?;
    constraints.apply_to_solution(values.as_view_mut());
    info!(
        "Solved transmural field with {} dofs in {} iterations",
        dof_map.num_dofs(),
        output.num_iterations
    );

    let mut cell_dofs = Vec::with_capacity(mesh.num_cells());
    for cell in mesh.connectivity() {
        let mut dofs = Vec::new();
        dof_map.populate_cell_dofs(&mut dofs, cell.vertex_indices());
        cell_dofs.push(dofs);
    }
    let mut support_points = vec![Point3::origin(); dof_map.num_dofs()];
    for (vertex, x) in mesh.vertices().iter().enumerate() {
        support_points[dof_map.dof(vertex, 0)] = *x;
    }

    Ok(AuxiliaryField {
        values,
        cell_dofs,
        support_points,
    })
}
