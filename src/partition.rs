//! Partitioning of a mesh and its degrees of freedom among in-process ranks.
//!
//! Cells are divided into contiguous blocks, one per rank. A vertex is owned by the lowest rank
//! among the ranks of its adjacent cells. Vertices are renumbered so that the vertices owned by
//! each rank are contiguous, and every degree of freedom inherits the owner of its vertex.
//! A rank additionally reads the *ghost* degrees of freedom: those that belong to one of its
//! cells but are owned by another rank.
use crate::connectivity::Connectivity;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshPartition {
    cell_ranges: Vec<Range<usize>>,
    /// Owner of every mesh vertex.
    vertex_owners: Vec<usize>,
    /// Partition-ordered index of every mesh vertex.
    vertex_indices: Vec<usize>,
    owned_vertices: Vec<Range<usize>>,
    /// Partition-ordered, sorted ghost vertices of every rank.
    ghost_vertices: Vec<Vec<usize>>,
}

impl MeshPartition {
    /// Divides the cells into `num_ranks` contiguous blocks of (almost) equal size.
    ///
    /// Panics if `num_ranks` is zero.
    pub fn new<C: Connectivity>(num_vertices: usize, connectivity: &[C], num_ranks: usize) -> Self {
        assert!(num_ranks > 0, "Need at least one rank");
        let num_cells = connectivity.len();
        let cell_ranges: Vec<_> = (0..num_ranks)
            .map(|rank| (rank * num_cells / num_ranks)..((rank + 1) * num_cells / num_ranks))
            .collect();

        // Vertices not referenced by any cell go to the last rank
        let mut vertex_owners = vec![num_ranks - 1; num_vertices];
        for (rank, cells) in cell_ranges.iter().enumerate().rev() {
            for cell in &connectivity[cells.clone()] {
                for &v in cell.vertex_indices() {
                    vertex_owners[v] = vertex_owners[v].min(rank);
                }
            }
        }

        let mut vertex_indices = vec![0; num_vertices];
        let mut owned_vertices = Vec::with_capacity(num_ranks);
        let mut next_index = 0;
        for rank in 0..num_ranks {
            let begin = next_index;
            for (v, _) in vertex_owners.iter().enumerate().filter(|(_, &owner)| owner == rank) {
                vertex_indices[v] = next_index;
                next_index += 1;
            }
            owned_vertices.push(begin..next_index);
        }

        let ghost_vertices = cell_ranges
            .iter()
            .enumerate()
            .map(|(rank, cells)| {
                let mut ghosts: Vec<_> = connectivity[cells.clone()]
                    .iter()
                    .flat_map(|cell| cell.vertex_indices().iter().copied())
                    .filter(|&v| vertex_owners[v] != rank)
                    .map(|v| vertex_indices[v])
                    .collect();
                ghosts.sort_unstable();
                ghosts.dedup();
                ghosts
            })
            .collect();

        Self {
            cell_ranges,
            vertex_owners,
            vertex_indices,
            owned_vertices,
            ghost_vertices,
        }
    }

    pub fn num_ranks(&self) -> usize {
        self.cell_ranges.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_owners.len()
    }

    /// The cells assembled by the given rank.
    pub fn cells(&self, rank: usize) -> Range<usize> {
        self.cell_ranges[rank].clone()
    }

    pub fn vertex_owner(&self, vertex: usize) -> usize {
        self.vertex_owners[vertex]
    }

    /// Rank that assembles the given cell.
    pub fn cell_owner(&self, cell: usize) -> Option<usize> {
        self.cell_ranges.iter().position(|range| range.contains(&cell))
    }
}

/// Global numbering of the degrees of freedom of a field with a fixed number of components per
/// mesh vertex.
///
/// The degree of freedom of component `c` at partition-ordered vertex `i` is `components * i + c`,
/// so every rank owns a contiguous range of degrees of freedom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    components: usize,
    vertex_indices: Vec<usize>,
    owned: Vec<Range<usize>>,
    ghosts: Vec<Vec<usize>>,
}

impl DofMap {
    pub fn new(partition: &MeshPartition, components: usize) -> Self {
        let owned = partition
            .owned_vertices
            .iter()
            .map(|range| (components * range.start)..(components * range.end))
            .collect();
        let ghosts = partition
            .ghost_vertices
            .iter()
            .map(|vertices| {
                vertices
                    .iter()
                    .flat_map(|&v| (0..components).map(move |c| components * v + c))
                    .collect()
            })
            .collect();
        Self {
            components,
            vertex_indices: partition.vertex_indices.clone(),
            owned,
            ghosts,
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn num_dofs(&self) -> usize {
        self.components * self.vertex_indices.len()
    }

    pub fn num_ranks(&self) -> usize {
        self.owned.len()
    }

    /// Global index of the given component at a mesh vertex.
    pub fn dof(&self, vertex: usize, component: usize) -> usize {
        debug_assert!(component < self.components);
        self.components * self.vertex_indices[vertex] + component
    }

    /// Global indices of all degrees of freedom of the given cell, ordered by local vertex and
    /// then by component.
    pub fn populate_cell_dofs(&self, dofs: &mut Vec<usize>, vertices: &[usize]) {
        dofs.clear();
        for &v in vertices {
            dofs.extend((0..self.components).map(|c| self.dof(v, c)));
        }
    }

    /// The contiguous range of degrees of freedom owned by the rank.
    pub fn owned_dofs(&self, rank: usize) -> Range<usize> {
        self.owned[rank].clone()
    }

    /// Sorted degrees of freedom read, but not owned, by the rank.
    pub fn ghost_dofs(&self, rank: usize) -> &[usize] {
        &self.ghosts[rank]
    }

    /// The rank owning the given degree of freedom.
    pub fn owner(&self, dof: usize) -> usize {
        debug_assert!(dof < self.num_dofs(), "dof {} out of bounds ({} dofs)", dof, self.num_dofs());
        // Ranges are sorted and contiguous, but may be empty
        self.owned.partition_point(|range| range.end <= dof)
    }

    /// Number of degrees of freedom the rank reads, owned plus ghosts.
    pub fn num_relevant_dofs(&self, rank: usize) -> usize {
        self.owned[rank].len() + self.ghosts[rank].len()
    }

    /// Position of a global degree of freedom in the rank's relevant set, where owned entries
    /// come first followed by the ghosts.
    pub fn relevant_index(&self, rank: usize, dof: usize) -> Option<usize> {
        let owned = &self.owned[rank];
        if owned.contains(&dof) {
            Some(dof - owned.start)
        } else {
            self.ghosts[rank]
                .binary_search(&dof)
                .ok()
                .map(|i| owned.len() + i)
        }
    }
}
