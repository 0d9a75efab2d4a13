//! Communication plumbing: backends, wire records and the all-gather collective.

pub mod all_gather;
pub mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
