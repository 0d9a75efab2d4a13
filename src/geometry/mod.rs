//! Geometry utilities: tetrahedron metrics and basis projection at source points.

pub mod projection;
pub mod tetra;
