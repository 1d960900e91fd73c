//! Basic procedural mesh generation routines.
//!
//! Box meshes tag their boundary faces `0` to `5` for the faces at `x = 0`, `x = max`,
//! `y = 0`, `y = max`, `z = 0` and `z = max`, see [`box_boundary_id`].
use crate::connectivity::{Hex8Connectivity, Tet4Connectivity};
use crate::element::{Hex8Element, VolumeFiniteElement};
use crate::mesh::{BoundaryId, HexMesh, Mesh, Tet4Mesh};
use cardiax_solid::fiber::ProlateSpheroid;
use nalgebra::{Matrix3, Point3, Vector3};
use std::f64::consts::{FRAC_PI_2, PI};

pub const BOX_X_MIN: BoundaryId = 0;
pub const BOX_X_MAX: BoundaryId = 1;
pub const BOX_Y_MIN: BoundaryId = 2;
pub const BOX_Y_MAX: BoundaryId = 3;
pub const BOX_Z_MIN: BoundaryId = 4;
pub const BOX_Z_MAX: BoundaryId = 5;

pub const LV_ENDOCARDIUM: BoundaryId = 0;
pub const LV_EPICARDIUM: BoundaryId = 1;
pub const LV_BASE: BoundaryId = 2;
pub const LV_APEX: BoundaryId = 3;

/// Boundary id of a face of the axis-aligned box $[0, L_x] \times [0, L_y] \times [0, L_z]$,
/// given the face centroid.
pub fn box_boundary_id(extents: Vector3<f64>) -> impl Fn(&Point3<f64>) -> BoundaryId {
    move |centroid| {
        let tol = 1e-10 * extents.amax();
        if centroid.x.abs() <= tol {
            BOX_X_MIN
        } else if (centroid.x - extents.x).abs() <= tol {
            BOX_X_MAX
        } else if centroid.y.abs() <= tol {
            BOX_Y_MIN
        } else if (centroid.y - extents.y).abs() <= tol {
            BOX_Y_MAX
        } else if centroid.z.abs() <= tol {
            BOX_Z_MIN
        } else {
            BOX_Z_MAX
        }
    }
}

pub fn create_unit_box_uniform_hex_mesh(cells_per_dim: usize) -> HexMesh {
    create_rectangular_uniform_hex_mesh(1.0, 1, 1, 1, cells_per_dim)
}

pub fn create_unit_box_uniform_tet_mesh(cells_per_dim: usize) -> Tet4Mesh {
    create_rectangular_uniform_tet_mesh(1.0, 1, 1, 1, cells_per_dim)
}

/// Vertices of a uniform grid, together with a map from grid coordinates to vertex index.
struct UniformGrid {
    vertices: Vec<Point3<f64>>,
    num_cells: [usize; 3],
}

impl UniformGrid {
    fn new(unit_length: f64, units: [usize; 3], cells_per_unit: usize) -> Self {
        let cell_size = unit_length / cells_per_unit as f64;
        let num_cells = units.map(|u| u * cells_per_unit);

        let mut vertices = Vec::new();
        for k in 0..=num_cells[2] {
            for j in 0..=num_cells[1] {
                for i in 0..=num_cells[0] {
                    vertices.push(Point3::new(i as f64, j as f64, k as f64) * cell_size);
                }
            }
        }
        Self { vertices, num_cells }
    }

    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let nx = self.num_cells[0] + 1;
        let ny = self.num_cells[1] + 1;
        (nx * ny) * k + nx * j + i
    }

    /// Vertex indices of the hexahedral cell with the given grid coordinates.
    fn hex(&self, i: usize, j: usize, k: usize) -> [usize; 8] {
        [
            self.index(i, j, k),
            self.index(i + 1, j, k),
            self.index(i + 1, j + 1, k),
            self.index(i, j + 1, k),
            self.index(i, j, k + 1),
            self.index(i + 1, j, k + 1),
            self.index(i + 1, j + 1, k + 1),
            self.index(i, j + 1, k + 1),
        ]
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let [nx, ny, nz] = self.num_cells;
        (0..nz).flat_map(move |k| (0..ny).flat_map(move |j| (0..nx).map(move |i| (i, j, k))))
    }

    fn extents(&self) -> Vector3<f64> {
        self.vertices.last().map(|v| v.coords).unwrap_or_else(Vector3::zeros)
    }
}

pub fn create_rectangular_uniform_hex_mesh(
    unit_length: f64,
    units_x: usize,
    units_y: usize,
    units_z: usize,
    cells_per_unit: usize,
) -> HexMesh {
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 || units_z == 0 {
        return Mesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let grid = UniformGrid::new(unit_length, [units_x, units_y, units_z], cells_per_unit);
    let cells = grid
        .cells()
        .map(|(i, j, k)| Hex8Connectivity(grid.hex(i, j, k)))
        .collect();
    let extents = grid.extents();
    Mesh::from_vertices_and_connectivity(grid.vertices, cells).with_boundary_ids(box_boundary_id(extents))
}

/// Tetrahedral box mesh obtained by splitting every cell of the corresponding hex mesh into
/// six tetrahedra sharing the cell diagonal from its first to its seventh vertex.
///
/// All cells use the same split, so the resulting mesh is conforming.
pub fn create_rectangular_uniform_tet_mesh(
    unit_length: f64,
    units_x: usize,
    units_y: usize,
    units_z: usize,
    cells_per_unit: usize,
) -> Tet4Mesh {
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 || units_z == 0 {
        return Mesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    // Monotone paths from local vertex 0 to local vertex 6 through the hex
    const PATHS: [[usize; 4]; 6] = [
        [0, 1, 2, 6],
        [0, 1, 5, 6],
        [0, 3, 2, 6],
        [0, 3, 7, 6],
        [0, 4, 5, 6],
        [0, 4, 7, 6],
    ];

    let grid = UniformGrid::new(unit_length, [units_x, units_y, units_z], cells_per_unit);
    let mut cells = Vec::new();
    for (i, j, k) in grid.cells() {
        let hex = grid.hex(i, j, k);
        for path in PATHS {
            let tet = path.map(|local| hex[local]);
            cells.push(orient_tet_positively(tet, &grid.vertices));
        }
    }
    let extents = grid.extents();
    Mesh::from_vertices_and_connectivity(grid.vertices, cells).with_boundary_ids(box_boundary_id(extents))
}

fn orient_tet_positively(mut tet: [usize; 4], vertices: &[Point3<f64>]) -> Tet4Connectivity {
    let x0 = vertices[tet[0]];
    let edges = Matrix3::from_columns(&[
        vertices[tet[1]] - x0,
        vertices[tet[2]] - x0,
        vertices[tet[3]] - x0,
    ]);
    if edges.determinant() < 0.0 {
        tet.swap(1, 2);
    }
    Tet4Connectivity(tet)
}

fn orient_hex_positively(hex: [usize; 8], vertices: &[Point3<f64>]) -> Hex8Connectivity {
    let element = Hex8Element::from_vertices(hex.map(|v| vertices[v]));
    if element.reference_jacobian(&Point3::origin()).determinant() < 0.0 {
        // Swapping the two layers mirrors the cell in its reference z-direction
        Hex8Connectivity([hex[4], hex[5], hex[6], hex[7], hex[0], hex[1], hex[2], hex[3]])
    } else {
        Hex8Connectivity(hex)
    }
}

/// Resolution of the idealized left ventricle mesh.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LvMeshParameters {
    /// Number of cells around the long axis.
    pub circumferential: usize,
    /// Number of cells from the base towards the apex.
    pub longitudinal: usize,
    /// Number of cells through the wall.
    pub transmural: usize,
    /// Angle (in radians) of the opening left around the apex, measured from the long axis.
    pub apex_opening: f64,
}

impl Default for LvMeshParameters {
    fn default() -> Self {
        Self {
            circumferential: 16,
            longitudinal: 8,
            transmural: 2,
            apex_opening: 0.2,
        }
    }
}

/// Hexahedral mesh of a truncated prolate spheroidal shell.
///
/// The shell spans the spheroids of `spheroid` between the endocardium (`t = 0`) and the
/// epicardium (`t = 1`), from the base at `z = 0` down to a small opening around the apex.
/// Boundary faces are tagged [`LV_ENDOCARDIUM`], [`LV_EPICARDIUM`], [`LV_BASE`] and [`LV_APEX`].
pub fn create_idealized_lv_hex_mesh(spheroid: &ProlateSpheroid, params: &LvMeshParameters) -> HexMesh {
    let LvMeshParameters {
        circumferential: nv,
        longitudinal: nu,
        transmural: nt,
        apex_opening,
    } = *params;
    if nv < 3 || nu == 0 || nt == 0 {
        return Mesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let u_base = FRAC_PI_2;
    let u_apex = PI - apex_opening;
    let index = |i: usize, j: usize, k: usize| ((nu + 1) * k + j) * nv + (i % nv);

    let mut vertices = Vec::with_capacity(nv * (nu + 1) * (nt + 1));
    for k in 0..=nt {
        let t = k as f64 / nt as f64;
        for j in 0..=nu {
            let u = u_base + (u_apex - u_base) * (j as f64 / nu as f64);
            for i in 0..nv {
                let v = 2.0 * PI * (i as f64 / nv as f64);
                vertices.push(Point3::from(spheroid.point(t, u, v)));
            }
        }
    }

    let mut cells = Vec::with_capacity(nv * nu * nt);
    for k in 0..nt {
        for j in 0..nu {
            for i in 0..nv {
                let hex = [
                    index(i, j, k),
                    index(i + 1, j, k),
                    index(i + 1, j + 1, k),
                    index(i, j + 1, k),
                    index(i, j, k + 1),
                    index(i + 1, j, k + 1),
                    index(i + 1, j + 1, k + 1),
                    index(i, j + 1, k + 1),
                ];
                cells.push(orient_hex_positively(hex, &vertices));
            }
        }
    }

    let layer = |vertex: usize| vertex / (nv * (nu + 1));
    let ring = |vertex: usize| (vertex / nv) % (nu + 1);
    let mut mesh = Mesh::from_vertices_and_connectivity(vertices, cells);
    mesh.assign_boundary_ids_by_face(|face_vertices, _| {
        if face_vertices.iter().all(|&v| layer(v) == 0) {
            LV_ENDOCARDIUM
        } else if face_vertices.iter().all(|&v| layer(v) == nt) {
            LV_EPICARDIUM
        } else if face_vertices.iter().all(|&v| ring(v) == 0) {
            LV_BASE
        } else {
            LV_APEX
        }
    });
    mesh
}
