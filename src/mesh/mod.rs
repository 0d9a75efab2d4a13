//! Read-only model of the local mesh partition.
//!
//! [`TetMesh`] holds vertex coordinates and element connectivity and exposes
//! per-face outward normals, face points and the plane equations the locator
//! evaluates. Face planes are computed in a canonical vertex order (sorted
//! vertex ids) and then oriented per element by an exact sign flip, so two
//! elements sharing a face see exactly negated plane values at every point.

pub mod layout;

pub use layout::{CellLocation, ClusterLayout, ClusterStructure, Layer};

use crate::debug_invariants::DebugInvariants;
use crate::geometry::tetra::{self, Plane, TET_FACE_OPPOSITE, TET_FACES};
use crate::source_error::SourceError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Background material of a cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub rho: f64,
    pub mu: f64,
    pub lambda: f64,
}

/// Read-only view of everything the source pipeline needs from the mesh.
#[derive(Copy, Clone, Debug)]
pub struct MeshContext<'a> {
    pub mesh: &'a TetMesh,
    pub layout: &'a ClusterLayout,
    /// Background material per copy/interior position.
    pub materials: &'a [Material],
}

impl<'a> MeshContext<'a> {
    pub fn new(mesh: &'a TetMesh, layout: &'a ClusterLayout, materials: &'a [Material]) -> Self {
        Self {
            mesh,
            layout,
            materials,
        }
    }

    /// Background material of `element`.
    pub fn material(&self, element: usize) -> Result<Material, SourceError> {
        self.layout
            .copy_interior_index(element)
            .and_then(|i| self.materials.get(i).copied())
            .ok_or_else(|| {
                SourceError::LayoutShape(format!(
                    "no material for element {element} ({} materials)",
                    self.materials.len()
                ))
            })
    }
}

/// Tetrahedral mesh of one partition.
#[derive(Clone, Debug)]
pub struct TetMesh {
    vertices: Vec<[f64; 3]>,
    elements: Vec<[usize; 4]>,
}

impl TetMesh {
    /// Build a mesh, rejecting out-of-range vertex ids and flat elements.
    pub fn new(vertices: Vec<[f64; 3]>, elements: Vec<[usize; 4]>) -> Result<Self, SourceError> {
        for (elem, conn) in elements.iter().enumerate() {
            if let Some(&bad) = conn.iter().find(|&&v| v >= vertices.len()) {
                return Err(SourceError::InvalidGeometry(format!(
                    "element {elem} references vertex {bad}, mesh has {}",
                    vertices.len()
                )));
            }
            let v = conn.map(|i| vertices[i]);
            let vol6 = tetra::signed_volume6(v[0], v[1], v[2], v[3]);
            if vol6 == 0.0 || !vol6.is_finite() {
                return Err(SourceError::InvalidGeometry(format!(
                    "element {elem} has zero volume"
                )));
            }
        }
        Ok(Self { vertices, elements })
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn elements(&self) -> &[[usize; 4]] {
        &self.elements
    }

    /// Coordinates of the four vertices of `elem`.
    pub fn element_vertices(&self, elem: usize) -> Result<[[f64; 3]; 4], SourceError> {
        let conn = self
            .elements
            .get(elem)
            .ok_or(SourceError::ElementOutOfRange {
                element: elem,
                len: self.elements.len(),
            })?;
        Ok(conn.map(|i| self.vertices[i]))
    }

    /// Centroid of `elem`.
    pub fn centroid(&self, elem: usize) -> Result<[f64; 3], SourceError> {
        Ok(tetra::centroid(&self.element_vertices(elem)?))
    }

    /// Vertex ids of `face` of `elem`, sorted ascending.
    fn canonical_face(&self, elem: usize, face: usize) -> [usize; 3] {
        let conn = &self.elements[elem];
        let mut ids = TET_FACES[face].map(|l| conn[l]);
        ids.sort_unstable();
        ids
    }

    /// Canonical plane of `face` and the sign turning it outward for `elem`.
    fn oriented_face(&self, elem: usize, face: usize) -> Result<(Plane, f64), SourceError> {
        if elem >= self.elements.len() || face >= 4 {
            return Err(SourceError::ElementOutOfRange {
                element: elem,
                len: self.elements.len(),
            });
        }
        let [a, b, c] = self.canonical_face(elem, face).map(|i| self.vertices[i]);
        let plane = tetra::plane_from_normal(tetra::area_normal(a, b, c)?, a);
        let opposite = self.vertices[self.elements[elem][TET_FACE_OPPOSITE[face]]];
        let sign = if tetra::eval_plane(&plane, opposite) > 0.0 {
            -1.0
        } else {
            1.0
        };
        Ok((plane, sign))
    }

    /// Outward plane of `face` of `elem`, normal scaled by twice the face area.
    ///
    /// Both elements sharing a face get exactly negated planes.
    pub fn face_plane(&self, elem: usize, face: usize) -> Result<Plane, SourceError> {
        let (plane, sign) = self.oriented_face(elem, face)?;
        Ok(if sign < 0.0 {
            tetra::flip_plane(plane)
        } else {
            plane
        })
    }

    /// Outward unit normal of `face` of `elem`.
    pub fn face_normal(&self, elem: usize, face: usize) -> Result<[f64; 3], SourceError> {
        let p = self.face_plane(elem, face)?;
        let n = [p[0], p[1], p[2]];
        let len = tetra::norm(n);
        Ok(n.map(|c| c / len))
    }

    /// A point on `face` of `elem`: its vertex with the smallest id.
    pub fn face_point(&self, elem: usize, face: usize) -> Result<[f64; 3], SourceError> {
        if elem >= self.elements.len() || face >= 4 {
            return Err(SourceError::ElementOutOfRange {
                element: elem,
                len: self.elements.len(),
            });
        }
        Ok(self.vertices[self.canonical_face(elem, face)[0]])
    }

    /// Check that no face is shared by more than two elements.
    pub fn validate_conforming(&self) -> Result<(), SourceError> {
        let mut seen: HashMap<[usize; 3], (usize, u8)> = HashMap::with_capacity(2 * self.elements.len());
        for elem in 0..self.elements.len() {
            for face in 0..4 {
                let entry = seen.entry(self.canonical_face(elem, face)).or_insert((elem, 0));
                entry.1 += 1;
                if entry.1 > 2 {
                    return Err(SourceError::InvalidGeometry(format!(
                        "face {:?} is shared by more than two elements (first: {}, again: {elem})",
                        self.canonical_face(elem, face),
                        entry.0
                    )));
                }
            }
        }
        Ok(())
    }

    /// Structured box of `n[0] x n[1] x n[2]` cubes of edge `h`, each split
    /// into six tetrahedra along the main diagonal (Kuhn split), origin at 0.
    ///
    /// Elements are numbered cube by cube (x fastest), six per cube.
    pub fn structured_box(n: [usize; 3], h: f64) -> Result<Self, SourceError> {
        let [nx, ny, nz] = n;
        let vid = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    vertices.push([i as f64 * h, j as f64 * h, k as f64 * h]);
                }
            }
        }
        const PATHS: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let mut elements = Vec::with_capacity(6 * nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    for path in PATHS {
                        let mut c = [i, j, k];
                        let mut tet = [vid(c[0], c[1], c[2]); 4];
                        for (step, axis) in path.into_iter().enumerate() {
                            c[axis] += 1;
                            tet[step + 1] = vid(c[0], c[1], c[2]);
                        }
                        elements.push(tet);
                    }
                }
            }
        }
        Self::new(vertices, elements)
    }
}

impl DebugInvariants for TetMesh {
    /// A face shared by three or more elements means overlapping elements.
    fn validate_invariants(&self) -> Result<(), SourceError> {
        self.validate_conforming()
    }
}
