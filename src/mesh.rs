use crate::connectivity::{Connectivity, Hex8Connectivity, Tet4Connectivity};
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

pub mod procedural;

/// Identifier attached to every boundary face, used to select boundary conditions.
pub type BoundaryId = u32;

/// A face that belongs to exactly one cell of the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFace<F> {
    pub connectivity: F,
    pub cell: usize,
    /// Index of the face among the faces of its cell.
    pub local_index: usize,
    pub boundary_id: BoundaryId,
}

/// Index-based data structure for conforming 3D meshes, with tagged boundary faces.
#[derive(Debug, Clone)]
pub struct Mesh<C: Connectivity> {
    vertices: Vec<Point3<f64>>,
    connectivity: Vec<C>,
    boundary_faces: Vec<BoundaryFace<C::FaceConnectivity>>,
}

pub type HexMesh = Mesh<Hex8Connectivity>;
pub type Tet4Mesh = Mesh<Tet4Connectivity>;

impl<C: Connectivity> Mesh<C> {
    /// Construct a mesh from vertices and connectivity.
    ///
    /// All boundary faces get the boundary id `0`. Use [`Mesh::assign_boundary_ids`] to tag them.
    ///
    /// Connectivity is expected to reference valid vertex indices only. Users of the mesh are
    /// permitted to panic on out-of-bounds indices.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point3<f64>>, connectivity: Vec<C>) -> Self {
        let boundary_faces = find_boundary_faces(&connectivity)
            .into_iter()
            .map(|(face, cell, local_index)| BoundaryFace {
                connectivity: face,
                cell,
                local_index,
                boundary_id: 0,
            })
            .collect();
        Self {
            vertices,
            connectivity,
            boundary_faces,
        }
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    pub fn boundary_faces(&self) -> &[BoundaryFace<C::FaceConnectivity>] {
        &self.boundary_faces
    }

    /// Tags every boundary face with the id returned by `boundary_id` for the face centroid.
    pub fn assign_boundary_ids<F>(&mut self, mut boundary_id: F)
    where
        F: FnMut(&Point3<f64>) -> BoundaryId,
    {
        self.assign_boundary_ids_by_face(|_, centroid| boundary_id(centroid));
    }

    /// Tags every boundary face with the id returned by `boundary_id` for the face vertex
    /// indices and the face centroid.
    pub fn assign_boundary_ids_by_face<F>(&mut self, mut boundary_id: F)
    where
        F: FnMut(&[usize], &Point3<f64>) -> BoundaryId,
    {
        for face in &mut self.boundary_faces {
            let indices = face.connectivity.vertex_indices();
            let centroid = centroid(&self.vertices, indices);
            face.boundary_id = boundary_id(indices, &centroid);
        }
    }

    pub fn with_boundary_ids<F>(mut self, boundary_id: F) -> Self
    where
        F: FnMut(&Point3<f64>) -> BoundaryId,
    {
        self.assign_boundary_ids(boundary_id);
        self
    }

    /// The distinct boundary ids present on the boundary, in increasing order.
    pub fn boundary_ids(&self) -> BTreeSet<BoundaryId> {
        self.boundary_faces.iter().map(|face| face.boundary_id).collect()
    }

    /// Sorted list of vertices that belong to a boundary face with the given id.
    pub fn vertices_with_boundary_id(&self, id: BoundaryId) -> Vec<usize> {
        let mut indices: Vec<_> = self
            .boundary_faces
            .iter()
            .filter(|face| face.boundary_id == id)
            .flat_map(|face| face.connectivity.vertex_indices().iter().copied())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Centroid of the vertices of the given cell.
    pub fn cell_centroid(&self, cell_index: usize) -> Point3<f64> {
        centroid(&self.vertices, self.connectivity[cell_index].vertex_indices())
    }

    /// Transform all vertices of the mesh by the given transformation function.
    pub fn transform_vertices<F>(&mut self, mut transformation: F)
    where
        F: FnMut(&mut Point3<f64>),
    {
        for p in &mut self.vertices {
            transformation(p);
        }
    }
}

fn centroid(vertices: &[Point3<f64>], indices: &[usize]) -> Point3<f64> {
    let sum = indices
        .iter()
        .fold(Vector3::zeros(), |sum, &i| sum + vertices[i].coords);
    Point3::from(sum / indices.len().max(1) as f64)
}

/// Finds faces which are only connected to exactly one cell, along with the connected cell
/// index and the local index of the face within that cell.
///
/// Faces are returned ordered by cell index and local face index.
pub fn find_boundary_faces<C: Connectivity>(connectivity: &[C]) -> Vec<(C::FaceConnectivity, usize, usize)> {
    let sorted_key = |face: &C::FaceConnectivity| {
        let mut key = face.vertex_indices().to_vec();
        key.sort_unstable();
        key
    };

    let mut face_counts: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
    for cell in connectivity {
        for face in (0..cell.num_faces()).filter_map(|i| cell.get_face_connectivity(i)) {
            *face_counts.entry(sorted_key(&face)).or_insert(0) += 1;
        }
    }

    let mut boundary_faces = Vec::new();
    for (cell_index, cell) in connectivity.iter().enumerate() {
        for local_index in 0..cell.num_faces() {
            if let Some(face) = cell.get_face_connectivity(local_index) {
                if face_counts.get(&sorted_key(&face)) == Some(&1) {
                    boundary_faces.push((face, cell_index, local_index));
                }
            }
        }
    }
    boundary_faces
}
