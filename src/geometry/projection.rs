//! Projection of a point source onto an element's modal basis.
//!
//! A point source at `x` in element `e` is the Dirac distribution `δ(· - x)`.
//! Its L2 projection onto an orthogonal modal basis `ψ_i` has coefficients
//! `ψ_i(ξ(x)) / (|J| m_i)` where `m_i` is the reference mass of `ψ_i` and
//! `|J|` the absolute Jacobian determinant of the element map.

use crate::geometry::tetra;
use crate::mesh::TetMesh;
use crate::source_error::SourceError;

/// Basis-function-at-point evaluation for one element.
pub trait BasisProjector: Send + Sync {
    /// Number of coefficients written by [`project`](Self::project).
    fn num_basis_functions(&self) -> usize;

    /// Write the projection coefficients of a point source at `centre` in
    /// `element` into `out` (length [`num_basis_functions`](Self::num_basis_functions)).
    fn project(
        &self,
        mesh: &TetMesh,
        element: usize,
        centre: [f64; 3],
        out: &mut [f64],
    ) -> Result<(), SourceError>;
}

/// Orthogonal degree-1 Dubiner basis on the reference tetrahedron.
#[derive(Copy, Clone, Debug, Default)]
pub struct ModalP1Projector;

impl ModalP1Projector {
    /// `∫ ψ_i²` over the reference tetrahedron.
    pub const REFERENCE_MASS: [f64; 4] = [1.0 / 6.0, 1.0 / 60.0, 1.0 / 20.0, 1.0 / 10.0];

    /// Basis values at reference coordinates.
    pub fn basis(xi: [f64; 3]) -> [f64; 4] {
        let [x, y, z] = xi;
        [
            1.0,
            2.0 * x + y + z - 1.0,
            3.0 * y + z - 1.0,
            4.0 * z - 1.0,
        ]
    }
}

impl BasisProjector for ModalP1Projector {
    fn num_basis_functions(&self) -> usize {
        4
    }

    fn project(
        &self,
        mesh: &TetMesh,
        element: usize,
        centre: [f64; 3],
        out: &mut [f64],
    ) -> Result<(), SourceError> {
        if out.len() != 4 {
            return Err(SourceError::InvariantViolation(format!(
                "projection buffer has {} slots, basis has 4",
                out.len()
            )));
        }
        let v = mesh.element_vertices(element)?;
        let xi = tetra::physical_to_reference(&v, centre)?;
        let det = tetra::determinant_3x3(tetra::jacobian(&v)).abs();
        for ((o, psi), m) in out
            .iter_mut()
            .zip(Self::basis(xi))
            .zip(Self::REFERENCE_MASS)
        {
            *o = psi / (det * m);
        }
        Ok(())
    }
}
