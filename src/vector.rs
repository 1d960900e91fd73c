//! Distributed degree-of-freedom vectors.
//!
//! A [`DistributedVector`] holds the authoritative values, each owned by exactly one rank.
//! A [`GhostedVector`] holds, for every rank, a read-only copy of the values the rank needs for
//! assembly: its owned values followed by its ghost values. The ghosted copy is derived data and
//! is only refreshed through [`GhostedVector::update_ghost_values`].
use crate::partition::DofMap;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_VECTOR_ID: AtomicU64 = AtomicU64::new(0);

fn next_vector_id() -> u64 {
    NEXT_VECTOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifies a specific state of a [`DistributedVector`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VectorVersion {
    id: u64,
    generation: u64,
}

#[derive(Debug)]
pub struct DistributedVector {
    dof_map: Arc<DofMap>,
    values: DVector<f64>,
    id: u64,
    generation: u64,
}

impl Clone for DistributedVector {
    fn clone(&self) -> Self {
        Self {
            dof_map: Arc::clone(&self.dof_map),
            values: self.values.clone(),
            id: next_vector_id(),
            generation: 0,
        }
    }
}

impl DistributedVector {
    pub fn zeros(dof_map: Arc<DofMap>) -> Self {
        let values = DVector::zeros(dof_map.num_dofs());
        Self::from_values(dof_map, values)
    }

    /// Panics if the length of `values` does not match the number of degrees of freedom.
    pub fn from_values(dof_map: Arc<DofMap>, values: DVector<f64>) -> Self {
        assert_eq!(values.len(), dof_map.num_dofs());
        Self {
            dof_map,
            values,
            id: next_vector_id(),
            generation: 0,
        }
    }

    pub fn dof_map(&self) -> &Arc<DofMap> {
        &self.dof_map
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn version(&self) -> VectorVersion {
        VectorVersion {
            id: self.id,
            generation: self.generation,
        }
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.values
    }

    /// Mutable access to all values. Invalidates every ghosted copy of the vector.
    pub fn values_mut(&mut self) -> DVectorViewMut<'_, f64> {
        self.generation += 1;
        self.values.as_view_mut()
    }

    pub fn copy_from(&mut self, values: &DVectorView<f64>) {
        self.values_mut().copy_from(values);
    }

    /// The values owned by the given rank.
    pub fn owned_values(&self, rank: usize) -> DVectorView<'_, f64> {
        let range = self.dof_map.owned_dofs(rank);
        self.values.rows(range.start, range.len())
    }

    pub fn into_vector(self) -> DVector<f64> {
        self.values
    }
}

/// Per-rank copies of owned and ghost values of a [`DistributedVector`].
#[derive(Debug, Clone)]
pub struct GhostedVector {
    dof_map: Arc<DofMap>,
    rank_values: Vec<DVector<f64>>,
    source: Option<VectorVersion>,
}

impl GhostedVector {
    pub fn new(dof_map: Arc<DofMap>) -> Self {
        let rank_values = (0..dof_map.num_ranks())
            .map(|rank| DVector::zeros(dof_map.num_relevant_dofs(rank)))
            .collect();
        Self {
            dof_map,
            rank_values,
            source: None,
        }
    }

    /// Copies owned and ghost values of every rank from the distributed vector.
    pub fn update_ghost_values(&mut self, source: &DistributedVector) {
        assert!(
            Arc::ptr_eq(&self.dof_map, &source.dof_map) || *self.dof_map == *source.dof_map,
            "Ghosted vector and source must share the same degree of freedom map"
        );
        let dof_map = &self.dof_map;
        let values = &source.values;
        self.rank_values
            .par_iter_mut()
            .enumerate()
            .for_each(|(rank, local)| {
                let owned = dof_map.owned_dofs(rank);
                local
                    .rows_mut(0, owned.len())
                    .copy_from(&values.rows(owned.start, owned.len()));
                for (i, &dof) in dof_map.ghost_dofs(rank).iter().enumerate() {
                    local[owned.len() + i] = values[dof];
                }
            });
        self.source = Some(source.version());
    }

    /// Whether the ghosted values reflect the current state of the given vector.
    pub fn is_synchronized_with(&self, vector: &DistributedVector) -> bool {
        self.source == Some(vector.version())
    }

    pub fn dof_map(&self) -> &Arc<DofMap> {
        &self.dof_map
    }

    /// Read access to the values relevant to a single rank.
    pub fn rank_view(&self, rank: usize) -> RankValues<'_> {
        RankValues {
            dof_map: &self.dof_map,
            rank,
            values: &self.rank_values[rank],
        }
    }
}

/// Owned and ghost values of a single rank, indexed by global degree of freedom.
#[derive(Debug, Copy, Clone)]
pub struct RankValues<'a> {
    dof_map: &'a DofMap,
    rank: usize,
    values: &'a DVector<f64>,
}

impl<'a> RankValues<'a> {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Value at a global degree of freedom.
    ///
    /// Panics if the degree of freedom is neither owned by nor a ghost of the rank.
    pub fn get(&self, dof: usize) -> f64 {
        let index = self.dof_map.relevant_index(self.rank, dof);
        debug_assert!(index.is_some(), "dof {} is not relevant to rank {}", dof, self.rank);
        match index {
            Some(i) => self.values[i],
            None => panic!("dof {} is not relevant to rank {}", dof, self.rank),
        }
    }

    pub fn gather(&self, values: &mut [f64], dofs: &[usize]) {
        for (value, &dof) in values.iter_mut().zip(dofs) {
            *value = self.get(dof);
        }
    }
}
