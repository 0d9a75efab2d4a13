#![cfg_attr(docsrs, feature(doc_cfg))]
//! # source-sieve
//!
//! source-sieve assigns point-like seismic sources to the tetrahedral elements
//! of a distributed mesh partition and builds the per-cluster index structures
//! a local-time-stepping solver needs to apply them.
//!
//! ## Pipeline
//! - [`locate`]: parallel point-in-tetrahedron search over the local elements,
//!   with a half-open face rule so a point on a shared face has one owner.
//! - [`resolve`]: one all-gather of the containment flags; the lowest rank
//!   containing a source keeps it.
//! - [`cluster`]: per-cluster source ordering and `(cell, offset, count)`
//!   entries, interior layer first, copy layer after.
//! - [`source`]: catalog formats and the structure-of-arrays descriptors
//!   (basis projections, moment tensors or fault bases, slip-rate functions).
//! - [`manager`]: [`SourceManager`](manager::SourceManager) runs the whole
//!   pipeline per catalog load.
//!
//! ## Communication
//! Transport goes through the [`Communicator`](algs::Communicator) trait:
//! [`NoComm`](algs::NoComm) for serial runs, [`RayonComm`](algs::RayonComm)
//! for in-process ranks (tests), and `MpiComm` with the `mpi-support` feature.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! source-sieve = "0.3"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod cluster;
pub mod config;
pub mod debug_invariants;
pub mod geometry;
pub mod locate;
pub mod manager;
pub mod mesh;
pub mod resolve;
pub mod source;
pub mod source_error;

pub use debug_invariants::DebugInvariants;
pub use source_error::SourceError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::cluster::{map_sources_to_clusters, CellToSources, ClusterMapping};
    pub use crate::config::{CopyReplicaPolicy, SourceConfig, UnclaimedPolicy};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::projection::{BasisProjector, ModalP1Projector};
    pub use crate::locate::{find_mesh_ids, Containment, OwnedSources};
    pub use crate::manager::{LoadedSources, SourceManager};
    pub use crate::mesh::{ClusterLayout, ClusterStructure, Material, MeshContext, TetMesh};
    pub use crate::resolve::clean_doubles;
    pub use crate::source::{
        FsrmCatalog, NrfCatalog, PiecewiseLinearFunction1D, PointSources, SourceMode, Subfault,
    };
    pub use crate::source_error::SourceError;
}
