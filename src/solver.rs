//! Newton-Raphson solver for the static equilibrium of a hyperelastic body.
//!
//! The solver discretizes the displacement with linear Lagrange elements, partitions the mesh
//! among a number of in-process ranks and linearizes the residual of every cell by forward-mode
//! automatic differentiation.
use crate::assembly::global::DistributedAssembler;
use crate::assembly::local::{
    add_pressure_load, assemble_elastic_cell, CellGeometry, DualWorkspace, ElementConnectivityAssembler,
    ElementSystemAssembler, FaceGeometry,
};
use crate::boundary::{dirichlet_scale, BoundaryClassification, DirichletConstraints};
use crate::config::Config;
use crate::connectivity::{Connectivity, ElementConnectivity};
use crate::error::{AssemblyError, SolverError};
use crate::linear_solver::{solve_linear_system, LinearSolverSettings};
use crate::mesh::Mesh;
use crate::partition::{DofMap, MeshPartition};
use crate::poisson::{solve_transmural_field, AuxiliaryField};
use crate::problem::CardiacProblem;
use crate::vector::{DistributedVector, GhostedVector, VectorVersion};
use cardiax_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use cardiax_optimize::newton::NewtonSolver;
use cardiax_solid::fiber::accumulate_cell_fiber;
use log::{debug, info, warn};
use nalgebra::{DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Vector3};
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::error::Error;
use std::sync::Arc;
use thread_local::ThreadLocal;

/// Accumulated Newton statistics of a solver.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct NewtonReport {
    /// Number of completed Newton solves.
    pub load_steps: usize,
    pub total_iterations: usize,
    /// Iterations of the most recent Newton solve.
    pub last_iterations: usize,
    pub residual_norm: f64,
    pub initial_residual_norm: f64,
}

/// Elastic residual and Jacobian of single cells, including the pressure on their Neumann faces.
struct ElasticityAssembler<'a, C, P: CardiacProblem> {
    connectivity: &'a [C],
    geometry: &'a [CellGeometry],
    fibers: &'a [Vector3<f64>],
    neumann_faces: &'a [Vec<FaceGeometry>],
    problem: &'a P,
    material: P::Material,
    load_factor: f64,
    workspace: &'a ThreadLocal<RefCell<DualWorkspace>>,
}

impl<'a, C: Connectivity + Sync, P: CardiacProblem> ElementConnectivityAssembler for ElasticityAssembler<'a, C, P> {
    fn solution_dim(&self) -> usize {
        3
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

impl<'a, C: Connectivity + Sync, P: CardiacProblem> ElementSystemAssembler for ElasticityAssembler<'a, C, P> {
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        solution: DVectorView<f64>,
        mut residual: DVectorViewMut<f64>,
        jacobian: DMatrixViewMut<f64>,
    ) -> eyre::Result<()> {
        let m = residual.len();
        let workspace = &mut *self.workspace.get_or_default().borrow_mut();
        assemble_elastic_cell(
            &self.material,
            &self.geometry[element_index],
            &self.fibers[element_index],
            solution,
            residual.rows_mut(0, m),
            jacobian,
            workspace,
        )?;
        for face in &self.neumann_faces[element_index] {
            add_pressure_load(
                face,
                |x| self.problem.pressure(x, self.load_factor),
                residual.rows_mut(0, m),
            );
        }
        Ok(())
    }
}

struct CachedJacobian {
    version: VectorVersion,
    matrix: CsrMatrix<f64>,
    scale: f64,
}

/// The discrete equilibrium equations as seen by the Newton iteration.
///
/// Keeps the distributed solution and its ghosted copy in sync with the iterate, and caches the
/// Jacobian assembled together with the last residual.
struct EquilibriumSystem<'a, C, P: CardiacProblem> {
    partition: &'a MeshPartition,
    dof_map: &'a Arc<DofMap>,
    assembler: &'a DistributedAssembler,
    elements: ElasticityAssembler<'a, C, P>,
    constraints: &'a DirichletConstraints,
    linear_solver: &'a LinearSolverSettings,
    state: &'a mut DistributedVector,
    ghosted: &'a mut GhostedVector,
    jacobian: Option<CachedJacobian>,
    error: Option<AssemblyError>,
}

impl<'a, C: Connectivity + Sync, P: CardiacProblem> EquilibriumSystem<'a, C, P> {
    fn sync_state(&mut self, x: &DVectorView<f64>) {
        if self.state.as_vector().iter().ne(x.iter()) {
            self.state.copy_from(x);
        }
        if !self.ghosted.is_synchronized_with(self.state) {
            self.ghosted.update_ghost_values(self.state);
        }
    }
}

impl<'a, C: Connectivity + Sync, P: CardiacProblem> VectorFunction<f64> for EquilibriumSystem<'a, C, P> {
    fn dimension(&self) -> usize {
        self.dof_map.num_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        self.sync_state(x);
        self.jacobian = None;
        let system =
            self.assembler
                .assemble_system(self.partition, self.dof_map, &self.elements, self.state, self.ghosted);
        match system {
            Ok(system) => {
                let mut residual = system.residual.into_vector();
                let scale = dirichlet_scale(&system.jacobian);
                self.constraints
                    .apply_to_residual(residual.as_view_mut(), *x, scale);
                f.copy_from(&residual);
                self.jacobian = Some(CachedJacobian {
                    version: self.state.version(),
                    matrix: system.jacobian,
                    scale,
                });
            }
            Err(err) => {
                // A non-finite residual makes the Newton iteration stop, the error itself is
                // reported by the solver
                f.fill(f64::NAN);
                self.error = Some(err);
            }
        }
    }
}

impl<'a, C: Connectivity + Sync, P: CardiacProblem> DifferentiableVectorFunction<f64> for EquilibriumSystem<'a, C, P> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
        iteration: usize,
    ) -> Result<(), Box<dyn Error>> {
        self.sync_state(x);
        let cached = match &self.jacobian {
            Some(cached) if cached.version == self.state.version() => cached,
            _ => return Err("Jacobian has not been assembled at the current iterate".into()),
        };

        // The increment is -sol, so the first iteration moves constrained dofs onto their
        // prescribed values and later iterations keep them there
        let known: Vec<f64> = if iteration == 0 {
            self.constraints
                .dofs()
                .iter()
                .zip(self.constraints.values())
                .map(|(&dof, &g)| x[dof] - g)
                .collect()
        } else {
            vec![0.0; self.constraints.len()]
        };

        let mut matrix = cached.matrix.clone();
        let mut rhs = rhs.clone_owned();
        self.constraints
            .eliminate(&mut matrix, &mut rhs, &known, cached.scale)?;
        let output = solve_linear_system(self.linear_solver, &matrix, &rhs, DVectorViewMut::from(&mut *sol))?;
        debug!(
            "Linear solve converged in {} iterations, residual norm {:e}",
            output.num_iterations, output.residual_norm
        );

        for (&dof, &value) in self.constraints.dofs().iter().zip(&known) {
            sol[dof] = value;
        }
        Ok(())
    }

    fn synchronize(&mut self, x: &DVectorView<f64>) {
        self.sync_state(x);
    }
}

/// Solves the static equilibrium of a [`CardiacProblem`] on a mesh.
pub struct HyperelasticSolver<C: Connectivity, P> {
    config: Config,
    problem: P,
    mesh: Mesh<C>,
    partition: MeshPartition,
    dof_map: Arc<DofMap>,
    classification: BoundaryClassification,
    constraints: DirichletConstraints,
    geometry: Vec<CellGeometry>,
    neumann_faces: Vec<Vec<FaceGeometry>>,
    fibers: Vec<Vector3<f64>>,
    auxiliary: Option<AuxiliaryField>,
    solution: DistributedVector,
    ghosted: GhostedVector,
    assembler: DistributedAssembler,
    dual_workspace: ThreadLocal<RefCell<DualWorkspace>>,
    load_factor: f64,
    report: NewtonReport,
}

impl<C, P> HyperelasticSolver<C, P>
where
    C: ElementConnectivity<f64>,
    P: CardiacProblem,
{
    /// Validates the configuration, classifies the boundaries, partitions the mesh and
    /// precomputes the reference geometry of all cells and loaded faces.
    pub fn setup(config: Config, problem: P, mesh: Mesh<C>) -> Result<Self, SolverError> {
        config.validate()?;
        if mesh.num_cells() == 0 {
            return Err(SolverError::Mesh("mesh has no cells".to_string()));
        }

        let mut classification = BoundaryClassification::new();
        problem.initialise_boundaries_tag(&mut classification)?;
        let mesh_ids = mesh.boundary_ids();
        for id in classification
            .neumann_ids()
            .chain(classification.dirichlet_ids())
        {
            if !mesh_ids.contains(&id) {
                warn!("Boundary id {} is not present on the mesh", id);
            }
        }

        let partition = MeshPartition::new(mesh.vertices().len(), mesh.connectivity(), config.discretization.num_ranks);
        let dof_map = Arc::new(DofMap::new(&partition, 3));

        let quadrature = C::quadrature();
        let geometry = mesh
            .connectivity()
            .iter()
            .enumerate()
            .map(|(cell_index, cell)| {
                let element = cell
                    .element(mesh.vertices())
                    .ok_or_else(|| SolverError::Mesh(format!("cell {} references missing vertices", cell_index)))?;
                CellGeometry::from_element(&element, &quadrature)
                    .map_err(|err| SolverError::Mesh(format!("cell {}: {}", cell_index, err)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let face_quadrature = C::face_quadrature();
        let mut neumann_faces = vec![Vec::new(); mesh.num_cells()];
        for face in mesh.boundary_faces() {
            if !classification.is_neumann(face.boundary_id) {
                continue;
            }
            let element = C::face_element(&face.connectivity, mesh.vertices())
                .ok_or_else(|| SolverError::Mesh(format!("boundary face of cell {} is invalid", face.cell)))?;
            let cell_vertices = mesh.connectivity()[face.cell].vertex_indices();
            let local_nodes = face
                .connectivity
                .vertex_indices()
                .iter()
                .map(|v| {
                    cell_vertices
                        .iter()
                        .position(|w| w == v)
                        .ok_or_else(|| SolverError::Mesh(format!("face vertex {} is not part of cell {}", v, face.cell)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let centroid = mesh.cell_centroid(face.cell);
            neumann_faces[face.cell].push(FaceGeometry::from_element(&element, local_nodes, &face_quadrature, &centroid));
        }

        let constraints = DirichletConstraints::from_classification(&mesh, &dof_map, &classification);
        let mut solution = DistributedVector::zeros(Arc::clone(&dof_map));
        constraints.apply_to_solution(solution.values_mut());
        let mut ghosted = GhostedVector::new(Arc::clone(&dof_map));
        ghosted.update_ghost_values(&solution);

        info!(
            "Set up hyperelastic solver: {} cells, {} dofs, {} constrained dofs, {} loaded faces, {} ranks",
            mesh.num_cells(),
            dof_map.num_dofs(),
            constraints.len(),
            neumann_faces.iter().map(Vec::len).sum::<usize>(),
            partition.num_ranks()
        );

        Ok(Self {
            fibers: vec![Vector3::zeros(); mesh.num_cells()],
            config,
            problem,
            mesh,
            partition,
            dof_map,
            classification,
            constraints,
            geometry,
            neumann_faces,
            auxiliary: None,
            solution,
            ghosted,
            assembler: DistributedAssembler::new(),
            dual_workspace: ThreadLocal::new(),
            load_factor: 1.0,
            report: NewtonReport::default(),
        })
    }

    /// Sets the factor in `[0, 1]` scaling the loads of the problem.
    pub fn set_load_factor(&mut self, load_factor: f64) {
        self.load_factor = load_factor;
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Recomputes the fiber direction of every cell from a fresh transmural field.
    fn update_fibers(&mut self) -> Result<(), SolverError> {
        let field = match self.problem.fiber_field() {
            Some(field) => field,
            None => return Ok(()),
        };
        let auxiliary = solve_transmural_field(&self.mesh, &self.partition, &self.geometry, &self.config.poisson)?;

        let mut skipped = 0;
        let mut empty_cells = 0;
        for (cell, fiber) in self.fibers.iter_mut().enumerate() {
            let points = auxiliary.cell_values(cell).map(|(x, t)| (x.coords, t));
            let cell_fiber = accumulate_cell_fiber(field, points);
            if cell_fiber.skipped_points > 0 {
                debug!(
                    "Skipped {} degenerate fiber points in cell {}",
                    cell_fiber.skipped_points, cell
                );
                skipped += cell_fiber.skipped_points;
            }
            if cell_fiber.valid_points == 0 {
                warn!("Cell {} has no valid fiber point, its active stress vanishes", cell);
                empty_cells += 1;
            }
            *fiber = cell_fiber.direction;
        }
        debug!(
            "Computed cell fibers, {} degenerate points skipped, {} cells without fiber",
            skipped, empty_cells
        );
        self.auxiliary = Some(auxiliary);
        Ok(())
    }

    /// Solves for equilibrium at the current load factor, starting from the current solution.
    pub fn solve_newton(&mut self) -> Result<NewtonReport, SolverError> {
        self.update_fibers()?;

        let elements = ElasticityAssembler {
            connectivity: self.mesh.connectivity(),
            geometry: &self.geometry,
            fibers: &self.fibers,
            neumann_faces: &self.neumann_faces,
            problem: &self.problem,
            material: self.problem.material(self.load_factor),
            load_factor: self.load_factor,
            workspace: &self.dual_workspace,
        };
        let system = EquilibriumSystem {
            partition: &self.partition,
            dof_map: &self.dof_map,
            assembler: &self.assembler,
            elements,
            constraints: &self.constraints,
            linear_solver: &self.config.linear_solver,
            state: &mut self.solution,
            ghosted: &mut self.ghosted,
            jacobian: None,
            error: None,
        };

        let mut x = system.state.as_vector().clone();
        let (result, assembly_error) = {
            let mut newton = NewtonSolver::new(system, self.config.newton.settings());
            let result = newton.solve(&mut x);
            (result, newton.into_function().error)
        };
        let output = match (result, assembly_error) {
            (Ok(output), _) => output,
            (Err(_), Some(err)) => return Err(SolverError::Assembly(err)),
            (Err(err), None) => return Err(SolverError::Diverged(err)),
        };

        self.solution.copy_from(&x.as_view());
        self.ghosted.update_ghost_values(&self.solution);

        self.report.load_steps += 1;
        self.report.total_iterations += output.iterations;
        self.report.last_iterations = output.iterations;
        self.report.residual_norm = output.residual_norm;
        self.report.initial_residual_norm = output.initial_residual_norm;
        info!(
            "Newton converged in {} iterations at load factor {}, residual norm {:e}",
            output.iterations, self.load_factor, output.residual_norm
        );
        Ok(self.report)
    }

    /// Ramps the loads linearly from `1 / num_steps` to one, solving for equilibrium at every
    /// step starting from the previous solution.
    pub fn solve_load_steps(&mut self, num_steps: usize) -> Result<NewtonReport, SolverError> {
        let num_steps = num_steps.max(1);
        for step in 1..=num_steps {
            self.load_factor = step as f64 / num_steps as f64;
            info!("Load step {}/{} (load factor {})", step, num_steps, self.load_factor);
            self.solve_newton()?;
        }
        Ok(self.report)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn mesh(&self) -> &Mesh<C> {
        &self.mesh
    }

    pub fn partition(&self) -> &MeshPartition {
        &self.partition
    }

    pub fn dof_map(&self) -> &Arc<DofMap> {
        &self.dof_map
    }

    pub fn classification(&self) -> &BoundaryClassification {
        &self.classification
    }

    pub fn constraints(&self) -> &DirichletConstraints {
        &self.constraints
    }

    pub fn solution(&self) -> &DistributedVector {
        &self.solution
    }

    /// Replaces the current solution, for example to restart from a known state.
    pub fn set_solution(&mut self, values: &DVector<f64>) {
        self.solution.copy_from(&values.as_view());
        self.ghosted.update_ghost_values(&self.solution);
    }

    /// Displacement of every mesh vertex.
    pub fn vertex_displacements(&self) -> Vec<Vector3<f64>> {
        let u = self.solution.as_vector();
        (0..self.mesh.vertices().len())
            .map(|v| Vector3::from_fn(|k, _| u[self.dof_map.dof(v, k)]))
            .collect()
    }

    /// Cell fiber directions used by the most recent solve.
    pub fn cell_fibers(&self) -> &[Vector3<f64>] {
        &self.fibers
    }

    pub fn auxiliary_field(&self) -> Option<&AuxiliaryField> {
        self.auxiliary.as_ref()
    }

    /// Transmural coordinate at every mesh vertex, if it has been computed.
    pub fn auxiliary_vertex_values(&self) -> Option<Vec<f64>> {
        let auxiliary = self.auxiliary.as_ref()?;
        let dof_map = DofMap::new(&self.partition, 1);
        Some(
            (0..self.mesh.vertices().len())
                .map(|v| auxiliary.value(dof_map.dof(v, 0)))
                .collect(),
        )
    }

    pub fn report(&self) -> &NewtonReport {
        &self.report
    }

    /// Material of the problem at the current load factor.
    pub fn material(&self) -> P::Material {
        self.problem.material(self.load_factor)
    }
}

impl<C: Connectivity, P> std::fmt::Debug for HyperelasticSolver<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperelasticSolver")
            .field("num_cells", &self.mesh.num_cells())
            .field("num_dofs", &self.dof_map.num_dofs())
            .field("load_factor", &self.load_factor)
            .field("report", &self.report)
            .finish()
    }
}

