//! Cell and face connectivity for linear tetrahedral and hexahedral meshes.
use crate::element::{Hex8Element, Quad4Element, SurfaceFiniteElement, Tet4Element, Tri3Element, VolumeFiniteElement};
use crate::quadrature::{
    hex_quadrature_strength_3, quad_quadrature_strength_3, tet_quadrature_strength_2, tri_quadrature_strength_2,
    QuadraturePair2d, QuadraturePair3d,
};
use itertools::izip;
use nalgebra::{Point3, RealField};
use serde::{Deserialize, Serialize};

pub trait Connectivity: Clone {
    type FaceConnectivity: Connectivity;

    fn num_faces(&self) -> usize;
    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity>;

    fn vertex_indices(&self) -> &[usize];
}

impl Connectivity for () {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &[]
    }
}

/// Connectivity of a volumetric cell that can be turned into a finite element.
///
/// Each cell type comes with the single quadrature rule used for its volume and for its
/// boundary faces.
pub trait ElementConnectivity<T: RealField + Copy>: Connectivity + Send + Sync {
    type Element: VolumeFiniteElement<T>;
    type FaceElement: SurfaceFiniteElement<T>;

    fn element(&self, vertices: &[Point3<T>]) -> Option<Self::Element>;

    fn face_element(face: &Self::FaceConnectivity, vertices: &[Point3<T>]) -> Option<Self::FaceElement>;

    fn quadrature() -> QuadraturePair3d<T>;

    fn face_quadrature() -> QuadraturePair2d<T>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3d3Connectivity(pub [usize; 3]);

impl Connectivity for Tri3d3Connectivity {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl Tri3d3Connectivity {
    pub fn element<T: RealField + Copy>(&self, vertices: &[Point3<T>]) -> Option<Tri3Element<T>> {
        let mut tri_vertices = [Point3::origin(); 3];
        for (v, idx) in izip!(&mut tri_vertices, &self.0) {
            *v = *vertices.get(*idx)?;
        }
        Some(Tri3Element::from_vertices(tri_vertices))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad4d3Connectivity(pub [usize; 4]);

impl Connectivity for Quad4d3Connectivity {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl Quad4d3Connectivity {
    pub fn element<T: RealField + Copy>(&self, vertices: &[Point3<T>]) -> Option<Quad4Element<T>> {
        let mut quad_vertices = [Point3::origin(); 4];
        for (v, idx) in izip!(&mut quad_vertices, &self.0) {
            *v = *vertices.get(*idx)?;
        }
        Some(Quad4Element::from_vertices(quad_vertices))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl Connectivity for Tet4Connectivity {
    type FaceConnectivity = Tri3d3Connectivity;

    fn num_faces(&self) -> usize {
        4
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let v = &self.0;
        // Faces are ordered so that their normals point out of a positively oriented cell
        match index {
            0 => Some(Tri3d3Connectivity([v[0], v[2], v[1]])),
            1 => Some(Tri3d3Connectivity([v[0], v[1], v[3]])),
            2 => Some(Tri3d3Connectivity([v[1], v[2], v[3]])),
            3 => Some(Tri3d3Connectivity([v[0], v[3], v[2]])),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl<T: RealField + Copy> ElementConnectivity<T> for Tet4Connectivity {
    type Element = Tet4Element<T>;
    type FaceElement = Tri3Element<T>;

    fn element(&self, vertices: &[Point3<T>]) -> Option<Self::Element> {
        let mut tet_vertices = [Point3::origin(); 4];
        for (v, idx) in izip!(&mut tet_vertices, &self.0) {
            *v = *vertices.get(*idx)?;
        }
        Some(Tet4Element::from_vertices(tet_vertices))
    }

    fn face_element(face: &Tri3d3Connectivity, vertices: &[Point3<T>]) -> Option<Self::FaceElement> {
        face.element(vertices)
    }

    fn quadrature() -> QuadraturePair3d<T> {
        tet_quadrature_strength_2()
    }

    fn face_quadrature() -> QuadraturePair2d<T> {
        tri_quadrature_strength_2()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hex8Connectivity(pub [usize; 8]);

impl Connectivity for Hex8Connectivity {
    type FaceConnectivity = Quad4d3Connectivity;

    fn num_faces(&self) -> usize {
        6
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let v = &self.0;

        let quad = |i, j, k, l| Some(Quad4d3Connectivity([v[i], v[j], v[k], v[l]]));

        // Faces point towards the exterior of a positively oriented cell
        match index {
            0 => quad(3, 2, 1, 0),
            1 => quad(0, 1, 5, 4),
            2 => quad(1, 2, 6, 5),
            3 => quad(2, 3, 7, 6),
            4 => quad(4, 7, 3, 0),
            5 => quad(5, 6, 7, 4),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl<T: RealField + Copy> ElementConnectivity<T> for Hex8Connectivity {
    type Element = Hex8Element<T>;
    type FaceElement = Quad4Element<T>;

    fn element(&self, vertices: &[Point3<T>]) -> Option<Self::Element> {
        let mut hex_vertices = [Point3::origin(); 8];
        for (v, idx) in izip!(&mut hex_vertices, &self.0) {
            *v = *vertices.get(*idx)?;
        }
        Some(Hex8Element::from_vertices(hex_vertices))
    }

    fn face_element(face: &Quad4d3Connectivity, vertices: &[Point3<T>]) -> Option<Self::FaceElement> {
        face.element(vertices)
    }

    fn quadrature() -> QuadraturePair3d<T> {
        hex_quadrature_strength_3()
    }

    fn face_quadrature() -> QuadraturePair2d<T> {
        quad_quadrature_strength_3()
    }
}
