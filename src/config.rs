//! Configuration for point-source setup.
//!
//! Unclaimed sources are dropped silently by default and the in-process
//! collective waits without a deadline. Replicated copy-layer cells default to
//! [`CopyReplicaPolicy::FirstReplica`], which departs from the solver's own
//! indexing (an entry per replica, [`CopyReplicaPolicy::EveryReplica`]) so the
//! entries partition each cluster's sources exactly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with sources that no rank contains after ownership resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclaimedPolicy {
    /// Drop them; only a `debug!` record is emitted.
    #[default]
    Ignore,
    /// Drop them and emit a `warn!` with the count.
    Warn,
    /// Fail setup with [`SourceError::UnclaimedSources`](crate::source_error::SourceError::UnclaimedSources).
    Error,
}

/// How copy-layer cells that replicate the same mesh element are indexed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyReplicaPolicy {
    /// Only the first copy-layer cell of an element receives an entry, so the
    /// entries partition the cluster's source sequence exactly.
    #[default]
    FirstReplica,
    /// Every replica receives an entry naming the same source range.
    EveryReplica,
}

/// Settings for [`SourceManager`](crate::manager::SourceManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub unclaimed: UnclaimedPolicy,
    pub copy_replicas: CopyReplicaPolicy,
    /// Upper bound for each receive of the in-process all-gather.
    /// `None` waits forever, like `MPI_Allgather`.
    pub collective_timeout_ms: Option<u64>,
    /// Base tag for the containment exchange.
    pub containment_tag: u16,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            unclaimed: UnclaimedPolicy::Ignore,
            copy_replicas: CopyReplicaPolicy::FirstReplica,
            collective_timeout_ms: None,
            containment_tag: 0x5C00,
        }
    }
}

impl SourceConfig {
    /// Receive deadline for [`RayonComm::with_timeout`](crate::algs::RayonComm::with_timeout).
    pub fn collective_timeout(&self) -> Option<Duration> {
        self.collective_timeout_ms.map(Duration::from_millis)
    }
}
