//! SourceError: unified error type for source-sieve public APIs
//!
//! Every fallible operation in the crate returns this type. Variants marked
//! *fatal* describe conditions under which point-source setup cannot proceed;
//! the simulation driver is expected to abort the run when it sees them.

use thiserror::Error;

/// Unified error type for point-source setup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// A source lies inside two elements of the same rank (fatal).
    ///
    /// Only a non-conforming or self-overlapping mesh produces this.
    #[error("source {source_index} was found in element {first} and again in element {second}")]
    OverlappingElements {
        source_index: usize,
        first: usize,
        second: usize,
    },
    /// Scratch storage could not be reserved (fatal).
    #[error("failed to allocate {what} ({requested} entries)")]
    AllocationFailed { what: &'static str, requested: usize },
    /// Sources that no rank claimed, rejected by [`UnclaimedPolicy::Error`].
    ///
    /// [`UnclaimedPolicy::Error`]: crate::config::UnclaimedPolicy::Error
    #[error("{count} point source(s) lie outside every rank's elements (first: {first})")]
    UnclaimedSources { count: usize, first: usize },
    /// A source catalog has inconsistent array lengths or offsets.
    #[error("malformed source catalog: {0}")]
    CatalogShape(String),
    /// The cluster/cell layout handed over by the mesh collaborator is inconsistent.
    #[error("malformed cluster layout: {0}")]
    LayoutShape(String),
    /// Degenerate or out-of-range element geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Element id outside the local partition.
    #[error("element {element} out of range (partition has {len} elements)")]
    ElementOutOfRange { element: usize, len: usize },
    /// Communication with a peer failed or timed out.
    #[error("communication with rank {neighbor} failed: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommFailure,
    },
    /// A built structure violates one of its invariants.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Transport-level failure detail carried by [`SourceError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(msg: String) -> Self {
        CommFailure(msg)
    }
}

impl From<&str> for CommFailure {
    fn from(msg: &str) -> Self {
        CommFailure(msg.to_owned())
    }
}
