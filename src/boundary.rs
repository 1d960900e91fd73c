//! Classification of boundary ids and enforcement of Dirichlet conditions.
//!
//! Every boundary id is either a Neumann boundary, where the problem's pressure acts, or a
//! Dirichlet boundary with a prescribed displacement. Boundary ids that are not classified are
//! traction-free.
//!
//! Dirichlet conditions are enforced by row and column elimination of the Newton system, so the
//! eliminated system stays symmetric whenever the Jacobian is.
use crate::connectivity::Connectivity;
use crate::error::BoundaryError;
use crate::mesh::{BoundaryId, Mesh};
use crate::partition::DofMap;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Point3, Vector3};
use nalgebra_sparse::CsrMatrix;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Prescribed displacement as a function of the reference position.
pub type DirichletFunction = Arc<dyn Fn(&Point3<f64>) -> Vector3<f64> + Send + Sync>;

pub fn homogeneous_dirichlet() -> DirichletFunction {
    Arc::new(|_| Vector3::zeros())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BoundaryKind {
    Neumann,
    Dirichlet,
    TractionFree,
}

/// Disjoint sets of Neumann and Dirichlet boundary ids.
#[derive(Clone, Default)]
pub struct BoundaryClassification {
    neumann: BTreeSet<BoundaryId>,
    dirichlet: BTreeMap<BoundaryId, DirichletFunction>,
}

impl fmt::Debug for BoundaryClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryClassification")
            .field("neumann", &self.neumann)
            .field("dirichlet", &self.dirichlet.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BoundaryClassification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_neumann(&mut self, boundary_id: BoundaryId) -> Result<(), BoundaryError> {
        if self.dirichlet.contains_key(&boundary_id) {
            return Err(BoundaryError::Conflict { boundary_id });
        }
        self.neumann.insert(boundary_id);
        Ok(())
    }

    /// Replaces the prescribed function if the id is already a Dirichlet boundary.
    pub fn add_dirichlet(&mut self, boundary_id: BoundaryId, function: DirichletFunction) -> Result<(), BoundaryError> {
        if self.neumann.contains(&boundary_id) {
            return Err(BoundaryError::Conflict { boundary_id });
        }
        self.dirichlet.insert(boundary_id, function);
        Ok(())
    }

    pub fn kind(&self, boundary_id: BoundaryId) -> BoundaryKind {
        if self.neumann.contains(&boundary_id) {
            BoundaryKind::Neumann
        } else if self.dirichlet.contains_key(&boundary_id) {
            BoundaryKind::Dirichlet
        } else {
            BoundaryKind::TractionFree
        }
    }

    pub fn is_neumann(&self, boundary_id: BoundaryId) -> bool {
        self.neumann.contains(&boundary_id)
    }

    pub fn neumann_ids(&self) -> impl Iterator<Item = BoundaryId> + '_ {
        self.neumann.iter().copied()
    }

    pub fn dirichlet_ids(&self) -> impl Iterator<Item = BoundaryId> + '_ {
        self.dirichlet.keys().copied()
    }

    pub fn dirichlet_function(&self, boundary_id: BoundaryId) -> Option<&DirichletFunction> {
        self.dirichlet.get(&boundary_id)
    }
}

/// Constrained degrees of freedom and their prescribed values.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletConstraints {
    dofs: Vec<usize>,
    values: Vec<f64>,
    is_constrained: Vec<bool>,
}

impl DirichletConstraints {
    /// Collects the values prescribed by `value(boundary_id, x, component)` at the vertices of
    /// every boundary face.
    ///
    /// A vertex shared by several boundaries takes its value from the lowest boundary id for
    /// which `value` returns a value.
    pub fn from_boundary_values<C, F>(mesh: &Mesh<C>, dof_map: &DofMap, mut value: F) -> Self
    where
        C: Connectivity,
        F: FnMut(BoundaryId, &Point3<f64>, usize) -> Option<f64>,
    {
        let mut prescribed = BTreeMap::new();
        for boundary_id in mesh.boundary_ids() {
            for vertex in mesh.vertices_with_boundary_id(boundary_id) {
                let x = &mesh.vertices()[vertex];
                for component in 0..dof_map.components() {
                    let dof = dof_map.dof(vertex, component);
                    if prescribed.contains_key(&dof) {
                        continue;
                    }
                    if let Some(g) = value(boundary_id, x, component) {
                        prescribed.insert(dof, g);
                    }
                }
            }
        }

        let mut is_constrained = vec![false; dof_map.num_dofs()];
        for &dof in prescribed.keys() {
            is_constrained[dof] = true;
        }
        Self {
            dofs: prescribed.keys().copied().collect(),
            values: prescribed.values().copied().collect(),
            is_constrained,
        }
    }

    /// Constraints for a vector field with the Dirichlet boundaries of the classification.
    pub fn from_classification<C: Connectivity>(
        mesh: &Mesh<C>,
        dof_map: &DofMap,
        classification: &BoundaryClassification,
    ) -> Self {
        assert_eq!(dof_map.components(), 3);
        Self::from_boundary_values(mesh, dof_map, |boundary_id, x, component| {
            classification
                .dirichlet_function(boundary_id)
                .map(|g| g(x)[component])
        })
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// Sorted constrained degrees of freedom.
    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    /// Prescribed values, in the order of [`DirichletConstraints::dofs`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.is_constrained.get(dof).copied().unwrap_or(false)
    }

    /// Writes the prescribed values into `u`.
    pub fn apply_to_solution(&self, mut u: DVectorViewMut<f64>) {
        for (&dof, &g) in self.dofs.iter().zip(&self.values) {
            u[dof] = g;
        }
    }

    /// Replaces the residual of every constrained row by `scale * (u - g)`.
    pub fn apply_to_residual(&self, mut residual: DVectorViewMut<f64>, u: DVectorView<f64>, scale: f64) {
        for (&dof, &g) in self.dofs.iter().zip(&self.values) {
            residual[dof] = scale * (u[dof] - g);
        }
    }

    /// Eliminates the constrained rows and columns of `matrix * x = rhs`, where the constrained
    /// entries of the solution `x` are given by `known`, in the order of
    /// [`DirichletConstraints::dofs`].
    ///
    /// Constrained rows become `scale` on the diagonal, with right-hand side `scale * known`, and
    /// the constrained columns are moved to the right-hand side of the remaining rows.
    pub fn eliminate(
        &self,
        matrix: &mut CsrMatrix<f64>,
        rhs: &mut DVector<f64>,
        known: &[f64],
        scale: f64,
    ) -> Result<(), BoundaryError> {
        assert_eq!(known.len(), self.dofs.len());
        assert_eq!(matrix.nrows(), self.is_constrained.len());
        let mut known_values = vec![0.0; matrix.ncols()];
        for (&dof, &value) in self.dofs.iter().zip(known) {
            known_values[dof] = value;
        }

        for (i, mut row) in matrix.row_iter_mut().enumerate() {
            let (cols, values) = row.cols_and_values_mut();
            if self.is_constrained[i] {
                let mut has_diagonal = false;
                for (&j, value) in cols.iter().zip(values) {
                    if j == i {
                        *value = scale;
                        has_diagonal = true;
                    } else {
                        *value = 0.0;
                    }
                }
                if !has_diagonal {
                    return Err(BoundaryError::MissingDiagonal { dof: i });
                }
                rhs[i] = scale * known_values[i];
            } else {
                for (&j, value) in cols.iter().zip(values) {
                    if self.is_constrained[j] {
                        rhs[i] -= *value * known_values[j];
                        *value = 0.0;
                    }
                }
            }
        }
        Ok(())
    }
}

/// A representative magnitude for the diagonal of constrained rows: the first non-zero diagonal
/// entry of the matrix, or one if there is none.
pub fn dirichlet_scale(matrix: &CsrMatrix<f64>) -> f64 {
    matrix
        .diagonal_as_csr()
        .values()
        .iter()
        .copied()
        .find(|&x| x != 0.0)
        .map(f64::abs)
        .unwrap_or(1.0)
}
