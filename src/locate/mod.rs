//! Geometric point location: which local element contains each source.
//!
//! Every element gets four plane equations `[nx, ny, nz, d]` with outward
//! normals `n` and `d = -n·p` for a face point `p`. A point `x` lies in the element when
//! `n·x + d < 0` for all four faces. A point exactly on a face (`n·x + d == 0`)
//! is accepted only if that face's outward normal is lexicographically
//! negative. Since two elements sharing a face evaluate exactly negated plane
//! values (see [`TetMesh`]), a point on a shared interior face is claimed by
//! exactly one of them. Where the plane values are exact (lattice-aligned
//! vertices) the rule also gives edges and vertices a single owner: it claims
//! `x` for the element containing `x + (ε, ε², ε³)`. Points on the partition's
//! outer boundary are claimed only through faces whose outward normal is
//! lexicographically negative.
//!
//! The scan runs in parallel over elements. Each source owns an atomic slot;
//! the first element to claim it wins the compare-and-set, any later claim is
//! an overlap of two elements and fails the whole scan.

use crate::geometry::tetra::{self, Plane};
use crate::mesh::TetMesh;
use crate::source_error::SourceError;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

const UNCLAIMED: usize = usize::MAX;

/// Per-element face planes of a partition.
#[derive(Clone, Debug)]
pub struct PlaneEquations {
    planes: Vec<[Plane; 4]>,
    closed: Vec<[bool; 4]>,
}

impl PlaneEquations {
    /// Build the four outward plane equations of every element of `mesh`.
    pub fn from_mesh(mesh: &TetMesh) -> Result<Self, SourceError> {
        let n = mesh.num_elements();
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(n)
            .map_err(|_| SourceError::AllocationFailed {
                what: "plane equations",
                requested: n,
            })?;
        let mut closed = Vec::new();
        closed
            .try_reserve_exact(n)
            .map_err(|_| SourceError::AllocationFailed {
                what: "face closure flags",
                requested: n,
            })?;
        for elem in 0..n {
            let mut elem_planes = [[0.0; 4]; 4];
            let mut elem_closed = [false; 4];
            for face in 0..4 {
                let plane = mesh.face_plane(elem, face)?;
                elem_planes[face] = plane;
                elem_closed[face] = tetra::is_lex_negative([plane[0], plane[1], plane[2]]);
            }
            planes.push(elem_planes);
            closed.push(elem_closed);
        }
        Ok(Self { planes, closed })
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Whether `x` lies in element `elem` under the half-open face rule.
    #[inline]
    pub fn contains(&self, elem: usize, x: [f64; 3]) -> bool {
        let planes = &self.planes[elem];
        let closed = &self.closed[elem];
        (0..4).all(|face| {
            let v = tetra::eval_plane(&planes[face], x);
            v < 0.0 || (v == 0.0 && closed[face])
        })
    }
}

/// Result of the local scan: one flag and (if set) one element per source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Containment {
    pub contained: Vec<bool>,
    /// Owning element; meaningful only where `contained` is set.
    pub mesh_ids: Vec<usize>,
}

impl Containment {
    pub fn len(&self) -> usize {
        self.contained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contained.is_empty()
    }

    pub fn num_contained(&self) -> usize {
        self.contained.iter().filter(|c| **c).count()
    }

    /// `(source, element)` pairs of contained sources, by source index.
    pub fn owned(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.contained
            .iter()
            .zip(&self.mesh_ids)
            .enumerate()
            .filter_map(|(source, (&c, &elem))| c.then_some((source, elem)))
    }

    /// Compact the contained sources, keeping their catalog order.
    pub fn compact(&self) -> OwnedSources {
        let (original_index, mesh_ids) = self.owned().unzip();
        OwnedSources {
            original_index,
            mesh_ids,
        }
    }
}

/// Sources owned by this rank after resolution, numbered `0..len`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnedSources {
    /// Catalog index of each owned source.
    pub original_index: Vec<usize>,
    /// Owning element of each owned source.
    pub mesh_ids: Vec<usize>,
}

impl OwnedSources {
    pub fn len(&self) -> usize {
        self.original_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_index.is_empty()
    }
}

/// Locate every source centre in the local partition.
///
/// Sources outside all local elements are simply not contained. A source
/// contained in two local elements is [`SourceError::OverlappingElements`];
/// if several sources overlap, the lowest source index is reported.
pub fn find_mesh_ids(mesh: &TetMesh, centres: &[[f64; 3]]) -> Result<Containment, SourceError> {
    let equations = PlaneEquations::from_mesh(mesh)?;
    let slots: Vec<AtomicUsize> = (0..centres.len())
        .map(|_| AtomicUsize::new(UNCLAIMED))
        .collect();
    let conflict: Mutex<Option<(usize, usize, usize)>> = Mutex::new(None);

    (0..equations.len()).into_par_iter().for_each(|elem| {
        for (source, &x) in centres.iter().enumerate() {
            if !equations.contains(elem, x) {
                continue;
            }
            if let Err(prev) =
                slots[source].compare_exchange(UNCLAIMED, elem, Ordering::AcqRel, Ordering::Acquire)
            {
                let found = (source, prev.min(elem), prev.max(elem));
                let mut guard = conflict.lock();
                if guard.is_none_or(|current| found < current) {
                    *guard = Some(found);
                }
            }
        }
    });
    drop(equations);

    if let Some((source_index, first, second)) = conflict.into_inner() {
        log::error!("source {source_index} was already found in a different element ({first} and {second})");
        return Err(SourceError::OverlappingElements {
            source_index,
            first,
            second,
        });
    }

    let mut containment = Containment {
        contained: Vec::with_capacity(centres.len()),
        mesh_ids: Vec::with_capacity(centres.len()),
    };
    for slot in slots {
        let elem = slot.into_inner();
        containment.contained.push(elem != UNCLAIMED);
        containment.mesh_ids.push(if elem == UNCLAIMED { 0 } else { elem });
    }
    Ok(containment)
}
