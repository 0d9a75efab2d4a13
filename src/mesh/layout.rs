//! Local-time-stepping cluster layout of the partition.
//!
//! Cells of cluster `c` are enumerated copy layer first: positions
//! `0..num_copy_cells` are copy-layer cells, `num_copy_cells..` interior cells.
//! The flat copy/interior table concatenates all clusters in order. A mesh
//! element may appear several times in the copy layer (once per neighbouring
//! rank it is shared with); its *location* is its first occurrence.

use crate::source_error::SourceError;
use serde::{Deserialize, Serialize};

/// Cell counts of one cluster.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStructure {
    pub num_copy_cells: usize,
    pub num_interior_cells: usize,
}

impl ClusterStructure {
    pub fn num_cells(&self) -> usize {
        self.num_copy_cells + self.num_interior_cells
    }
}

/// Which layer a cell belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Copy,
    Interior,
}

/// Position of an element within the cluster enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellLocation {
    pub cluster: usize,
    /// Cell index within the cluster (copy cells first).
    pub cell: usize,
    pub layer: Layer,
}

/// Mapping between mesh elements and (cluster, cell) positions.
#[derive(Clone, Debug)]
pub struct ClusterLayout {
    structure: Vec<ClusterStructure>,
    cluster_offsets: Vec<usize>,
    copy_interior_to_mesh: Vec<usize>,
    mesh_to_cell: Vec<Option<CellLocation>>,
}

impl ClusterLayout {
    /// Derive the layout from per-cluster counts and the flat copy/interior
    /// enumeration of mesh ids.
    ///
    /// Rejects tables whose length disagrees with the counts, mesh ids outside
    /// `0..num_elements`, elements listed in two clusters, and interior cells
    /// listed more than once.
    pub fn new(
        structure: Vec<ClusterStructure>,
        copy_interior_to_mesh: Vec<usize>,
        num_elements: usize,
    ) -> Result<Self, SourceError> {
        let total: usize = structure.iter().map(ClusterStructure::num_cells).sum();
        if total != copy_interior_to_mesh.len() {
            return Err(SourceError::LayoutShape(format!(
                "cluster counts sum to {total} cells but the copy/interior table has {}",
                copy_interior_to_mesh.len()
            )));
        }

        let mut cluster_offsets = Vec::with_capacity(structure.len() + 1);
        let mut mesh_to_cell: Vec<Option<CellLocation>> = vec![None; num_elements];
        let mut offset = 0;
        for (cluster, st) in structure.iter().enumerate() {
            cluster_offsets.push(offset);
            for cell in 0..st.num_cells() {
                let mesh_id = copy_interior_to_mesh[offset + cell];
                let layer = if cell < st.num_copy_cells {
                    Layer::Copy
                } else {
                    Layer::Interior
                };
                let slot = mesh_to_cell.get_mut(mesh_id).ok_or_else(|| {
                    SourceError::LayoutShape(format!(
                        "cell {cell} of cluster {cluster} names element {mesh_id}, partition has {num_elements}"
                    ))
                })?;
                match *slot {
                    None => {
                        *slot = Some(CellLocation {
                            cluster,
                            cell,
                            layer,
                        })
                    }
                    Some(first) if first.cluster != cluster => {
                        return Err(SourceError::LayoutShape(format!(
                            "element {mesh_id} is listed in clusters {} and {cluster}",
                            first.cluster
                        )));
                    }
                    Some(first) if first.layer == Layer::Interior || layer == Layer::Interior => {
                        return Err(SourceError::LayoutShape(format!(
                            "element {mesh_id} appears more than once in cluster {cluster} outside the copy layer"
                        )));
                    }
                    Some(_) => {} // replicated copy cell
                }
            }
            offset += st.num_cells();
        }
        cluster_offsets.push(offset);

        Ok(Self {
            structure,
            cluster_offsets,
            copy_interior_to_mesh,
            mesh_to_cell,
        })
    }

    /// One cluster whose cells are all interior, in element order.
    pub fn single_cluster(num_elements: usize) -> Self {
        let structure = vec![ClusterStructure {
            num_copy_cells: 0,
            num_interior_cells: num_elements,
        }];
        let mesh_to_cell = (0..num_elements)
            .map(|cell| {
                Some(CellLocation {
                    cluster: 0,
                    cell,
                    layer: Layer::Interior,
                })
            })
            .collect();
        Self {
            structure,
            cluster_offsets: vec![0, num_elements],
            copy_interior_to_mesh: (0..num_elements).collect(),
            mesh_to_cell,
        }
    }

    pub fn num_clusters(&self) -> usize {
        self.structure.len()
    }

    pub fn num_elements(&self) -> usize {
        self.mesh_to_cell.len()
    }

    pub fn structure(&self, cluster: usize) -> ClusterStructure {
        self.structure[cluster]
    }

    /// First occurrence of `element` in the enumeration, if it is part of any cluster.
    pub fn location(&self, element: usize) -> Option<CellLocation> {
        self.mesh_to_cell.get(element).copied().flatten()
    }

    /// Position of `element` in the flat copy/interior table (first occurrence).
    pub fn copy_interior_index(&self, element: usize) -> Option<usize> {
        self.location(element)
            .map(|loc| self.cluster_offsets[loc.cluster] + loc.cell)
    }

    /// Mesh ids of the copy-layer cells of `cluster`, in enumeration order.
    pub fn copy_cells(&self, cluster: usize) -> &[usize] {
        let start = self.cluster_offsets[cluster];
        &self.copy_interior_to_mesh[start..start + self.structure[cluster].num_copy_cells]
    }

    /// Mesh id of cell `cell` of `cluster`.
    pub fn mesh_id(&self, cluster: usize, cell: usize) -> usize {
        self.copy_interior_to_mesh[self.cluster_offsets[cluster] + cell]
    }
}
