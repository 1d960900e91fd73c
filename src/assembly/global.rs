use crate::assembly::local::ElementSystemAssembler;
use crate::error::AssemblyError;
use crate::partition::{DofMap, MeshPartition};
use crate::vector::{DistributedVector, GhostedVector};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use std::cell::RefCell;
use std::sync::Arc;
use thread_local::ThreadLocal;

/// Jacobian and residual assembled over all ranks.
///
/// The rows of both are distributed: every rank owns the contiguous block of rows given by
/// [`DofMap::owned_dofs`].
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub jacobian: CsrMatrix<f64>,
    pub residual: DistributedVector,
}

#[derive(Debug)]
struct AssemblerWorkspace {
    element_nodes: Vec<usize>,
    element_dofs: Vec<usize>,
    element_solution: DVector<f64>,
    element_residual: DVector<f64>,
    element_jacobian: DMatrix<f64>,
}

impl Default for AssemblerWorkspace {
    fn default() -> Self {
        Self {
            element_nodes: Vec::new(),
            element_dofs: Vec::new(),
            element_solution: DVector::zeros(0),
            element_residual: DVector::zeros(0),
            element_jacobian: DMatrix::zeros(0, 0),
        }
    }
}

/// Contributions accumulated by a single rank before [`compress`].
///
/// Entries in rows owned by the rank are kept locally, and entries in rows owned by other
/// ranks are buffered per destination rank.
#[derive(Debug)]
pub struct RankContributions {
    rank: usize,
    owned_triplets: Vec<(usize, usize, f64)>,
    owned_residual: Vec<(usize, f64)>,
    off_process_triplets: Vec<Vec<(usize, usize, f64)>>,
    off_process_residual: Vec<Vec<(usize, f64)>>,
}

impl RankContributions {
    fn new(rank: usize, num_ranks: usize) -> Self {
        Self {
            rank,
            owned_triplets: Vec::new(),
            owned_residual: Vec::new(),
            off_process_triplets: vec![Vec::new(); num_ranks],
            off_process_residual: vec![Vec::new(); num_ranks],
        }
    }

    fn add_element(&mut self, dof_map: &DofMap, dofs: &[usize], residual: &DVector<f64>, jacobian: &DMatrix<f64>) {
        for (i, &row) in dofs.iter().enumerate() {
            let owner = dof_map.owner(row);
            let (triplets, rhs) = if owner == self.rank {
                (&mut self.owned_triplets, &mut self.owned_residual)
            } else {
                (
                    &mut self.off_process_triplets[owner],
                    &mut self.off_process_residual[owner],
                )
            };
            rhs.push((row, residual[i]));
            for (j, &col) in dofs.iter().enumerate() {
                triplets.push((row, col, jacobian[(i, j)]));
            }
        }
    }

    /// Number of buffered entries destined for other ranks.
    pub fn num_off_process_entries(&self) -> usize {
        self.off_process_triplets.iter().map(Vec::len).sum()
    }
}

/// Assembles residual and Jacobian of a nonlinear system over a partitioned mesh.
///
/// Each rank assembles the cells of its partition in parallel with the other ranks, reading
/// solution values only from its own part of the ghosted vector.
#[derive(Debug, Default)]
pub struct DistributedAssembler {
    workspace: ThreadLocal<RefCell<AssemblerWorkspace>>,
}

impl DistributedAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates the contributions of every rank without combining them.
    ///
    /// Fails if `ghosted` is not synchronized with `solution`, or if a cell produces a
    /// non-finite contribution. In the latter case nothing is accumulated at all.
    pub fn accumulate(
        &self,
        partition: &MeshPartition,
        dof_map: &DofMap,
        element_assembler: &(dyn Sync + ElementSystemAssembler),
        solution: &DistributedVector,
        ghosted: &GhostedVector,
    ) -> Result<Vec<RankContributions>, AssemblyError> {
        if !ghosted.is_synchronized_with(solution) {
            return Err(AssemblyError::StaleGhostValues);
        }
        let sdim = element_assembler.solution_dim();
        assert_eq!(sdim, dof_map.components());

        (0..partition.num_ranks())
            .into_par_iter()
            .map(|rank| {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                let values = ghosted.rank_view(rank);
                let mut contributions = RankContributions::new(rank, partition.num_ranks());

                for cell in partition.cells(rank) {
                    let node_count = element_assembler.element_node_count(cell);
                    let m = sdim * node_count;
                    ws.element_nodes.resize(node_count, 0);
                    element_assembler.populate_element_nodes(&mut ws.element_nodes, cell);
                    dof_map.populate_cell_dofs(&mut ws.element_dofs, &ws.element_nodes);

                    ws.element_solution.resize_vertically_mut(m, 0.0);
                    values.gather(ws.element_solution.as_mut_slice(), &ws.element_dofs);
                    ws.element_residual.resize_vertically_mut(m, 0.0);
                    ws.element_residual.fill(0.0);
                    ws.element_jacobian.resize_mut(m, m, 0.0);
                    ws.element_jacobian.fill(0.0);

                    element_assembler
                        .assemble_element_system_into(
                            cell,
                            ws.element_solution.as_view(),
                            ws.element_residual.as_view_mut(),
                            ws.element_jacobian.as_view_mut(),
                        )
                        .map_err(|report| AssemblyError::Cell { cell, report })?;

                    contributions.add_element(dof_map, &ws.element_dofs, &ws.element_residual, &ws.element_jacobian);
                }
                Ok(contributions)
            })
            .collect()
    }

    /// Assembles and compresses the global system.
    pub fn assemble_system(
        &self,
        partition: &MeshPartition,
        dof_map: &Arc<DofMap>,
        element_assembler: &(dyn Sync + ElementSystemAssembler),
        solution: &DistributedVector,
        ghosted: &GhostedVector,
    ) -> Result<AssembledSystem, AssemblyError> {
        let contributions = self.accumulate(partition, dof_map, element_assembler, solution, ghosted)?;
        compress(dof_map, contributions)
    }
}

/// Exchanges off-process contributions and combines them with the owned contributions of every
/// rank into the final system.
///
/// This is the only way to obtain an [`AssembledSystem`] from accumulated contributions.
pub fn compress(dof_map: &Arc<DofMap>, contributions: Vec<RankContributions>) -> Result<AssembledSystem, AssemblyError> {
    let num_ranks = dof_map.num_ranks();
    let num_dofs = dof_map.num_dofs();
    assert_eq!(contributions.len(), num_ranks);

    let num_exchanged: usize = contributions
        .iter()
        .map(RankContributions::num_off_process_entries)
        .sum();
    debug!("Exchanging {} off-process matrix entries between {} ranks", num_exchanged, num_ranks);

    let blocks: Vec<(CsrMatrix<f64>, DVector<f64>)> = (0..num_ranks)
        .into_par_iter()
        .map(|rank| {
            let owned = dof_map.owned_dofs(rank);
            let mut coo = CooMatrix::new(owned.len(), num_dofs);
            let mut residual = DVector::zeros(owned.len());

            let own = &contributions[rank];
            let received = contributions
                .iter()
                .filter(|c| c.rank != rank)
                .map(|c| (&c.off_process_triplets[rank], &c.off_process_residual[rank]));

            for (triplets, rhs) in std::iter::once((&own.owned_triplets, &own.owned_residual)).chain(received) {
                for &(row, col, value) in triplets {
                    coo.push(row - owned.start, col, value);
                }
                for &(row, value) in rhs {
                    residual[row - owned.start] += value;
                }
            }
            (CsrMatrix::from(&coo), residual)
        })
        .collect();

    let nnz = blocks.iter().map(|(block, _)| block.nnz()).sum();
    let mut row_offsets = Vec::with_capacity(num_dofs + 1);
    let mut col_indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    let mut residual = DVector::zeros(num_dofs);
    row_offsets.push(0);
    for (rank, (block, block_residual)) in blocks.iter().enumerate() {
        let (offsets, indices, block_values) = block.csr_data();
        let base = col_indices.len();
        row_offsets.extend(offsets[1..].iter().map(|offset| base + offset));
        col_indices.extend_from_slice(indices);
        values.extend_from_slice(block_values);

        let owned = dof_map.owned_dofs(rank);
        residual.rows_mut(owned.start, owned.len()).copy_from(block_residual);
    }

    let jacobian = CsrMatrix::try_from_csr_data(num_dofs, num_dofs, row_offsets, col_indices, values)
        .map_err(|err| AssemblyError::Compress(err.to_string()))?;
    Ok(AssembledSystem {
        jacobian,
        residual: DistributedVector::from_values(Arc::clone(dof_map), residual),
    })
}
