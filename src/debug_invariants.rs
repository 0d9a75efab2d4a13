//! Invariant checking for built index structures.
//!
//! Cluster mappings and per-cluster source descriptors are consumed without
//! bounds re-checks by the compute kernel, so they validate themselves once
//! after construction. Checks run in debug builds and whenever one of the
//! `strict-invariants` / `check-invariants` features is enabled.

use crate::source_error::SourceError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), SourceError>;

    /// Panic on the first violated invariant when invariant checking is enabled.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "debug_assert_invariants");
    }
}

/// Run a fallible check and panic on error when invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
