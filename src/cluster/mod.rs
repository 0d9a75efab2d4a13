//! Per-cluster index of owned point sources.
//!
//! For every LTS cluster the builder produces the sequence of (compacted)
//! source indices assigned to the cluster and a list of cell entries
//! `(cell, offset, count)`. The compute kernel walks the entries and finds the
//! sources of `cell` at `sources[offset..offset + count]`.
//!
//! Within a cluster, sources are ordered by owning element id, with all
//! interior-layer sources ahead of the copy-layer ones. Interior entries come
//! first (one per element), then copy entries in copy-cell enumeration order.
//! Taken in entry order the ranges tile `0..sources.len()`.

use crate::config::CopyReplicaPolicy;
use crate::debug_invariants::DebugInvariants;
use crate::mesh::{ClusterLayout, Layer};
use crate::source_error::SourceError;
use hashbrown::HashMap;
use itertools::Itertools;
use std::ops::Range;

/// Sources of one cell: `sources[offset..offset + count]` of the owning mapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellToSources {
    /// Cell index within the cluster; copy cells come first.
    pub cell: usize,
    pub offset: usize,
    pub count: usize,
}

impl CellToSources {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.count
    }
}

/// Source index of one LTS cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterMapping {
    /// Compacted source indices in cluster order.
    pub sources: Vec<usize>,
    pub cell_to_sources: Vec<CellToSources>,
    /// Copy-layer size of the cluster; cells below it are copy cells.
    pub num_copy_cells: usize,
}

impl ClusterMapping {
    /// Source indices named by `entry`.
    pub fn sources_for(&self, entry: &CellToSources) -> &[usize] {
        &self.sources[entry.range()]
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl DebugInvariants for ClusterMapping {
    fn validate_invariants(&self) -> Result<(), SourceError> {
        let mut covered = 0;
        let mut seen_copy = false;
        for (i, e) in self.cell_to_sources.iter().enumerate() {
            if e.count == 0 {
                return Err(SourceError::InvariantViolation(format!(
                    "entry {i} (cell {}) is empty",
                    e.cell
                )));
            }
            let is_copy = e.cell < self.num_copy_cells;
            if seen_copy && !is_copy {
                return Err(SourceError::InvariantViolation(format!(
                    "interior entry {i} (cell {}) follows a copy-layer entry",
                    e.cell
                )));
            }
            seen_copy |= is_copy;
            if e.offset == covered {
                covered += e.count;
            } else if !(is_copy && e.offset + e.count <= covered) {
                // Only a copy replica may repeat an earlier range.
                return Err(SourceError::InvariantViolation(format!(
                    "entry {i} covers {:?}, expected it to start at {covered}",
                    e.range()
                )));
            }
        }
        if covered != self.sources.len() {
            return Err(SourceError::InvariantViolation(format!(
                "entries cover {covered} of {} sources",
                self.sources.len()
            )));
        }
        Ok(())
    }
}

/// Build the cluster mappings of the owned sources.
///
/// `mesh_ids[i]` is the element owning compacted source `i`. The result holds
/// one mapping per cluster of `layout`, including empty ones.
pub fn map_sources_to_clusters(
    mesh_ids: &[usize],
    layout: &ClusterLayout,
    policy: CopyReplicaPolicy,
) -> Result<Vec<ClusterMapping>, SourceError> {
    let mut order: Vec<usize> = (0..mesh_ids.len()).collect();
    order.sort_by_key(|&s| mesh_ids[s]);

    let mut interior: Vec<Vec<(usize, usize)>> = vec![Vec::new(); layout.num_clusters()];
    let mut copy: Vec<Vec<(usize, usize)>> = vec![Vec::new(); layout.num_clusters()];
    for s in order {
        let elem = mesh_ids[s];
        let loc = layout.location(elem).ok_or_else(|| {
            SourceError::LayoutShape(format!(
                "element {elem} owns source {s} but belongs to no cluster"
            ))
        })?;
        match loc.layer {
            Layer::Interior => interior[loc.cluster].push((loc.cell, s)),
            Layer::Copy => copy[loc.cluster].push((loc.cell, s)),
        }
    }

    let mut mappings = Vec::with_capacity(layout.num_clusters());
    for (cluster, (interior, mut copy)) in interior.into_iter().zip(copy).enumerate() {
        // Stable: sources of one element keep their increasing order.
        copy.sort_by_key(|&(cell, _)| cell);
        let mapping = build_cluster(cluster, &interior, &copy, layout, policy)?;
        mapping.debug_assert_invariants();
        mappings.push(mapping);
    }
    Ok(mappings)
}

/// `interior` and `copy` hold `(cell, source)` pairs in final order.
fn build_cluster(
    cluster: usize,
    interior: &[(usize, usize)],
    copy: &[(usize, usize)],
    layout: &ClusterLayout,
    policy: CopyReplicaPolicy,
) -> Result<ClusterMapping, SourceError> {
    let n = interior.len() + copy.len();
    let mut cell_to_sources = Vec::new();
    cell_to_sources
        .try_reserve(4 * n + 1)
        .map_err(|_| SourceError::AllocationFailed {
            what: "cell-to-source entries",
            requested: 4 * n + 1,
        })?;

    let mut offset = 0;
    for (cell, run) in &interior.iter().chunk_by(|&&(cell, _)| cell) {
        let count = run.count();
        cell_to_sources.push(CellToSources {
            cell,
            offset,
            count,
        });
        offset += count;
    }

    // element -> (first copy cell, offset, count)
    let mut copy_ranges: HashMap<usize, (usize, usize, usize)> = HashMap::new();
    for (cell, run) in &copy.iter().chunk_by(|&&(cell, _)| cell) {
        let count = run.count();
        copy_ranges.insert(layout.mesh_id(cluster, cell), (cell, offset, count));
        offset += count;
    }
    for (cell, elem) in layout.copy_cells(cluster).iter().enumerate() {
        let Some(&(first_cell, offset, count)) = copy_ranges.get(elem) else {
            continue;
        };
        if policy == CopyReplicaPolicy::FirstReplica && cell != first_cell {
            continue;
        }
        cell_to_sources.push(CellToSources {
            cell,
            offset,
            count,
        });
    }

    let sources = interior
        .iter()
        .chain(copy)
        .map(|&(_, s)| s)
        .collect();
    Ok(ClusterMapping {
        sources,
        cell_to_sources,
        num_copy_cells: layout.structure(cluster).num_copy_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ClusterStructure;

    fn st(copy: usize, interior: usize) -> ClusterStructure {
        ClusterStructure {
            num_copy_cells: copy,
            num_interior_cells: interior,
        }
    }

    fn entry(cell: usize, offset: usize, count: usize) -> CellToSources {
        CellToSources {
            cell,
            offset,
            count,
        }
    }

    #[test]
    fn interior_runs_then_copy_cells() {
        // copy: [3]; interior: [0, 1, 2] at cells 1, 2, 3
        let layout = ClusterLayout::new(vec![st(1, 3)], vec![3, 0, 1, 2], 4).unwrap();
        let mesh_ids = [3, 0, 2, 0];
        let maps = map_sources_to_clusters(&mesh_ids, &layout, CopyReplicaPolicy::FirstReplica)
            .unwrap();
        assert_eq!(maps.len(), 1);
        let m = &maps[0];
        assert_eq!(m.sources, vec![1, 3, 2, 0]);
        assert_eq!(
            m.cell_to_sources,
            vec![entry(1, 0, 2), entry(3, 2, 1), entry(0, 3, 1)]
        );
        assert_eq!(m.sources_for(&m.cell_to_sources[0]), &[1, 3]);
        m.validate_invariants().unwrap();
    }

    #[test]
    fn replicated_copy_cells_follow_policy() {
        // copy: [0, 0] (element 0 shared with two neighbours); interior: [1]
        let layout = ClusterLayout::new(vec![st(2, 1)], vec![0, 0, 1], 2).unwrap();
        let mesh_ids = [0, 1, 0];

        let first = map_sources_to_clusters(&mesh_ids, &layout, CopyReplicaPolicy::FirstReplica)
            .unwrap();
        assert_eq!(first[0].sources, vec![1, 0, 2]);
        assert_eq!(first[0].cell_to_sources, vec![entry(2, 0, 1), entry(0, 1, 2)]);

        let every = map_sources_to_clusters(&mesh_ids, &layout, CopyReplicaPolicy::EveryReplica)
            .unwrap();
        assert_eq!(
            every[0].cell_to_sources,
            vec![entry(2, 0, 1), entry(0, 1, 2), entry(1, 1, 2)]
        );
        every[0].validate_invariants().unwrap();
    }

    #[test]
    fn copy_entries_follow_copy_cell_order() {
        // copy cells list element 4 before element 2
        let layout = ClusterLayout::new(vec![st(2, 0)], vec![4, 2], 5).unwrap();
        let maps =
            map_sources_to_clusters(&[2, 4, 2], &layout, CopyReplicaPolicy::FirstReplica).unwrap();
        assert_eq!(maps[0].sources, vec![1, 0, 2]);
        assert_eq!(maps[0].cell_to_sources, vec![entry(0, 0, 1), entry(1, 1, 2)]);
    }

    #[test]
    fn sources_split_across_clusters() {
        let layout =
            ClusterLayout::new(vec![st(0, 2), st(0, 1), st(0, 1)], vec![0, 1, 2, 3], 4).unwrap();
        let maps = map_sources_to_clusters(&[3, 1, 0, 3], &layout, CopyReplicaPolicy::FirstReplica)
            .unwrap();
        assert_eq!(maps.len(), 3);
        assert_eq!(maps[0].sources, vec![2, 1]);
        assert!(maps[1].is_empty());
        assert!(maps[1].cell_to_sources.is_empty());
        assert_eq!(maps[2].sources, vec![0, 3]);
        assert_eq!(maps[2].cell_to_sources, vec![entry(0, 0, 2)]);
    }

    #[test]
    fn element_outside_layout_is_rejected() {
        let layout = ClusterLayout::new(vec![st(0, 1)], vec![0], 2).unwrap();
        let err = map_sources_to_clusters(&[1], &layout, CopyReplicaPolicy::FirstReplica)
            .unwrap_err();
        assert!(matches!(err, SourceError::LayoutShape(_)));
    }

    #[test]
    fn broken_tiling_is_reported() {
        let m = ClusterMapping {
            sources: vec![0, 1],
            cell_to_sources: vec![entry(0, 1, 1)],
            num_copy_cells: 0,
        };
        assert!(m.validate_invariants().is_err());
        let m = ClusterMapping {
            sources: vec![0, 1],
            cell_to_sources: vec![entry(0, 0, 1), entry(1, 1, 1)],
            num_copy_cells: 1,
        };
        assert!(m.validate_invariants().is_err());
    }
}
