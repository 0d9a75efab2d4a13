//! Point-source setup: locate, resolve ownership, index by cluster, describe.
//!
//! A [`SourceManager`] holds the sources of the current catalog. Each load
//! replaces the previous set wholesale:
//!
//! 1. validate the catalog,
//! 2. find the element containing each source centre ([`find_mesh_ids`]),
//! 3. drop sources a lower rank also owns ([`clean_doubles`], collective),
//! 4. compact the owned sources and map them to LTS clusters,
//! 5. build the per-cluster descriptors in parallel.

use crate::algs::communicator::Communicator;
use crate::cluster::{map_sources_to_clusters, ClusterMapping};
use crate::config::SourceConfig;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::projection::BasisProjector;
use crate::locate::{find_mesh_ids, OwnedSources};
use crate::mesh::MeshContext;
use crate::resolve::clean_doubles;
use crate::source::descriptor::{build_fsrm, build_nrf};
use crate::source::{FsrmCatalog, NrfCatalog, PointSources};
use crate::source_error::SourceError;
use rayon::prelude::*;
use static_assertions::assert_impl_all;

/// Output of one catalog load: mapping and descriptors per cluster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedSources {
    pub mappings: Vec<ClusterMapping>,
    pub sources: Vec<PointSources>,
    /// Catalog index and element of every source kept on this rank; the
    /// mappings index into it.
    pub owned: OwnedSources,
}

assert_impl_all!(LoadedSources: Send, Sync);

impl LoadedSources {
    pub fn num_clusters(&self) -> usize {
        self.mappings.len()
    }

    /// Sources owned by this rank across all clusters.
    pub fn num_sources(&self) -> usize {
        self.owned.len()
    }
}

/// Owner of the point sources of one rank.
pub struct SourceManager<C: Communicator> {
    comm: C,
    config: SourceConfig,
    loaded: Option<LoadedSources>,
}

impl<C: Communicator> SourceManager<C> {
    pub fn new(comm: C, config: SourceConfig) -> Self {
        Self {
            comm,
            config,
            loaded: None,
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Load parametric point sources. Collective over `comm`.
    pub fn load_fsrm<P>(
        &mut self,
        catalog: &FsrmCatalog,
        ctx: &MeshContext<'_>,
        projector: &P,
    ) -> Result<&LoadedSources, SourceError>
    where
        P: BasisProjector + ?Sized,
    {
        self.free_sources();
        if self.comm.rank() == 0 {
            log::info!("<--------------------------------------------------------->");
            log::info!("<--------------- Loading FSRM point sources -------------->");
            log::info!("<--------------------------------------------------------->");
        }
        catalog.validate()?;
        let (owned, mappings) = self.assign(&catalog.centres, ctx)?;

        if self.comm.rank() == 0 {
            log::info!("Building FSRM point source descriptors...");
        }
        let sources = mappings
            .par_iter()
            .map(|mapping| build_fsrm(catalog, mapping, &owned, ctx, projector))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(&*self.loaded.insert(LoadedSources {
            mappings,
            sources,
            owned,
        }))
    }

    /// Load subfault-sampled sources. Collective over `comm`.
    pub fn load_nrf<P>(
        &mut self,
        catalog: &NrfCatalog,
        ctx: &MeshContext<'_>,
        projector: &P,
    ) -> Result<&LoadedSources, SourceError>
    where
        P: BasisProjector + ?Sized,
    {
        self.free_sources();
        if self.comm.rank() == 0 {
            log::info!("<--------------------------------------------------------->");
            log::info!("<--------------- Loading NRF point sources --------------->");
            log::info!("<--------------------------------------------------------->");
        }
        catalog.validate()?;
        let (owned, mappings) = self.assign(&catalog.centres, ctx)?;

        if self.comm.rank() == 0 {
            log::info!("Building NRF point source descriptors...");
        }
        let sources = mappings
            .par_iter()
            .map(|mapping| build_nrf(catalog, mapping, &owned, ctx, projector))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(&*self.loaded.insert(LoadedSources {
            mappings,
            sources,
            owned,
        }))
    }

    /// Drop the current source set.
    pub fn free_sources(&mut self) {
        self.loaded = None;
    }

    pub fn loaded(&self) -> Option<&LoadedSources> {
        self.loaded.as_ref()
    }

    /// Cluster mappings of the current set (empty when nothing is loaded).
    pub fn mappings(&self) -> &[ClusterMapping] {
        self.loaded
            .as_ref()
            .map(|l| l.mappings.as_slice())
            .unwrap_or_default()
    }

    /// Descriptors of the current set (empty when nothing is loaded).
    pub fn point_sources(&self) -> &[PointSources] {
        self.loaded
            .as_ref()
            .map(|l| l.sources.as_slice())
            .unwrap_or_default()
    }

    /// Steps 2 to 4 of a load, shared by both catalog formats.
    fn assign(
        &self,
        centres: &[[f64; 3]],
        ctx: &MeshContext<'_>,
    ) -> Result<(OwnedSources, Vec<ClusterMapping>), SourceError> {
        if ctx.layout.num_elements() != ctx.mesh.num_elements() {
            return Err(SourceError::LayoutShape(format!(
                "layout covers {} elements, mesh has {}",
                ctx.layout.num_elements(),
                ctx.mesh.num_elements()
            )));
        }
        ctx.mesh.debug_assert_invariants();
        let root = self.comm.rank() == 0;

        if root {
            log::info!("Finding mesh ids for {} point sources...", centres.len());
        }
        let mut containment = find_mesh_ids(ctx.mesh, centres)?;

        if root && self.comm.size() > 1 {
            log::info!("Cleaning possible double occurring point sources...");
        }
        clean_doubles(&self.comm, &mut containment.contained, &self.config)?;
        let owned = containment.compact();

        if root {
            log::info!("Mapping point sources to LTS cells...");
        }
        let mappings =
            map_sources_to_clusters(&owned.mesh_ids, ctx.layout, self.config.copy_replicas)?;
        Ok((owned, mappings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::NoComm;
    use crate::geometry::projection::ModalP1Projector;
    use crate::mesh::{ClusterLayout, Material, TetMesh};

    fn catalog(centres: Vec<[f64; 3]>) -> FsrmCatalog {
        let n = centres.len();
        FsrmCatalog {
            moment_tensor: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            centres,
            strikes: vec![0.0; n],
            dips: vec![0.0; n],
            rakes: vec![0.0; n],
            onsets: vec![0.0; n],
            areas: vec![1.0; n],
            timestep: 1.0,
            num_samples: 2,
            time_histories: vec![1.0; 2 * n],
        }
    }

    #[test]
    fn reload_replaces_previous_set() {
        let mesh = TetMesh::structured_box([1, 1, 1], 1.0).unwrap();
        let layout = ClusterLayout::single_cluster(mesh.num_elements());
        let materials = vec![Material::default(); mesh.num_elements()];
        let ctx = MeshContext::new(&mesh, &layout, &materials);
        let mut manager = SourceManager::new(NoComm, SourceConfig::default());
        assert!(manager.loaded().is_none());
        assert!(manager.mappings().is_empty());

        let first = catalog(vec![mesh.centroid(0).unwrap(), mesh.centroid(3).unwrap()]);
        let loaded = manager.load_fsrm(&first, &ctx, &ModalP1Projector).unwrap();
        assert_eq!(loaded.num_sources(), 2);
        assert_eq!(manager.point_sources()[0].len(), 2);

        let second = catalog(vec![[5.0; 3], mesh.centroid(5).unwrap()]);
        manager.load_fsrm(&second, &ctx, &ModalP1Projector).unwrap();
        assert_eq!(manager.mappings()[0].sources, vec![0]);
        assert_eq!(manager.loaded().unwrap().num_sources(), 1);

        manager.free_sources();
        assert!(manager.point_sources().is_empty());
    }

    #[test]
    fn bad_catalog_leaves_nothing_loaded() {
        let mesh = TetMesh::structured_box([1, 1, 1], 1.0).unwrap();
        let layout = ClusterLayout::single_cluster(mesh.num_elements());
        let ctx = MeshContext::new(&mesh, &layout, &[]);
        let mut manager = SourceManager::new(NoComm, SourceConfig::default());
        manager
            .load_fsrm(&catalog(vec![[0.2, 0.5, 0.7]]), &ctx, &ModalP1Projector)
            .unwrap();
        let mut bad = catalog(vec![[0.2, 0.5, 0.7]]);
        bad.areas.clear();
        assert!(manager.load_fsrm(&bad, &ctx, &ModalP1Projector).is_err());
        assert!(manager.loaded().is_none());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "[invariants]")]
    fn non_conforming_mesh_trips_invariants() {
        let mesh = TetMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, -1.0],
                [0.0, 0.0, 2.0],
            ],
            vec![[0, 1, 2, 3], [0, 1, 2, 4], [0, 1, 2, 5]],
        )
        .unwrap();
        let layout = ClusterLayout::single_cluster(mesh.num_elements());
        let ctx = MeshContext::new(&mesh, &layout, &[]);
        let mut manager = SourceManager::new(NoComm, SourceConfig::default());
        let _ = manager.load_fsrm(&catalog(vec![[0.1, 0.1, 0.1]]), &ctx, &ModalP1Projector);
    }

    #[test]
    fn layout_must_match_mesh() {
        let mesh = TetMesh::structured_box([1, 1, 1], 1.0).unwrap();
        let layout = ClusterLayout::single_cluster(2);
        let ctx = MeshContext::new(&mesh, &layout, &[]);
        let mut manager = SourceManager::new(NoComm, SourceConfig::default());
        let err = manager
            .load_fsrm(&catalog(vec![[0.2, 0.5, 0.7]]), &ctx, &ModalP1Projector)
            .unwrap_err();
        assert!(matches!(err, SourceError::LayoutShape(_)));
    }
}
