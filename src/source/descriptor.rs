//! Per-cluster point-source descriptors consumed by the compute kernel.
//!
//! Sources are stored structure-of-arrays in the order of the cluster's
//! [`ClusterMapping::sources`], so the kernel reaches a cell's sources through
//! the mapping's `offset`/`count` pairs.

use super::moment::transform_moment_tensor;
use super::pwl::PiecewiseLinearFunction1D;
use super::{FsrmCatalog, NrfCatalog};
use crate::cluster::ClusterMapping;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::projection::BasisProjector;
use crate::locate::OwnedSources;
use crate::mesh::MeshContext;
use crate::source_error::SourceError;

/// Which catalog format the descriptors were built from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceMode {
    /// `tensor` is a global moment tensor scaled by area; one slip-rate component.
    Fsrm,
    /// `tensor` is the fault basis `[tan1, tan2, normal]`; three slip-rate components.
    Nrf,
}

/// Descriptors of all sources of one cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSources {
    pub mode: SourceMode,
    /// Coefficients per source in `projections`.
    pub num_basis: usize,
    /// Basis-at-source coefficients, `num_basis` per source.
    pub projections: Vec<f64>,
    pub tensor: Vec<[f64; 9]>,
    /// `mu * area` per source (NRF only).
    pub mu_a: Vec<f64>,
    /// `lambda * area` per source (NRF only).
    pub lambda_a: Vec<f64>,
    pub slip_rates: Vec<[PiecewiseLinearFunction1D; 3]>,
}

impl PointSources {
    fn with_capacity(mode: SourceMode, num_basis: usize, n: usize) -> Self {
        let nrf = usize::from(mode == SourceMode::Nrf);
        Self {
            mode,
            num_basis,
            projections: Vec::with_capacity(num_basis * n),
            tensor: Vec::with_capacity(n),
            mu_a: Vec::with_capacity(nrf * n),
            lambda_a: Vec::with_capacity(nrf * n),
            slip_rates: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    /// Projection coefficients of cluster source `i`.
    pub fn projection(&self, i: usize) -> &[f64] {
        &self.projections[i * self.num_basis..(i + 1) * self.num_basis]
    }

    fn push_projection<P>(
        &mut self,
        ctx: &MeshContext<'_>,
        projector: &P,
        element: usize,
        centre: [f64; 3],
    ) -> Result<(), SourceError>
    where
        P: BasisProjector + ?Sized,
    {
        let start = self.projections.len();
        self.projections.resize(start + self.num_basis, 0.0);
        projector.project(ctx.mesh, element, centre, &mut self.projections[start..])
    }
}

impl DebugInvariants for PointSources {
    fn validate_invariants(&self) -> Result<(), SourceError> {
        let n = self.len();
        if self.projections.len() != n * self.num_basis {
            return Err(SourceError::InvariantViolation(format!(
                "{} projection coefficients for {n} sources of {} basis functions",
                self.projections.len(),
                self.num_basis
            )));
        }
        if self.slip_rates.len() != n {
            return Err(SourceError::InvariantViolation(format!(
                "{} slip-rate triples for {n} sources",
                self.slip_rates.len()
            )));
        }
        let scaled = match self.mode {
            SourceMode::Fsrm => 0,
            SourceMode::Nrf => n,
        };
        if self.mu_a.len() != scaled || self.lambda_a.len() != scaled {
            return Err(SourceError::InvariantViolation(format!(
                "{:?} sources carry {} mu_a and {} lambda_a values, expected {scaled}",
                self.mode,
                self.mu_a.len(),
                self.lambda_a.len()
            )));
        }
        Ok(())
    }
}

/// Build the FSRM descriptors of one cluster.
pub fn build_fsrm<P>(
    catalog: &FsrmCatalog,
    mapping: &ClusterMapping,
    owned: &OwnedSources,
    ctx: &MeshContext<'_>,
    projector: &P,
) -> Result<PointSources, SourceError>
where
    P: BasisProjector + ?Sized,
{
    let mut out = PointSources::with_capacity(
        SourceMode::Fsrm,
        projector.num_basis_functions(),
        mapping.len(),
    );
    for &s in &mapping.sources {
        let index = owned.original_index[s];
        out.push_projection(ctx, projector, owned.mesh_ids[s], catalog.centres[index])?;

        let mut tensor = transform_moment_tensor(
            &catalog.moment_tensor,
            catalog.strikes[index],
            catalog.dips[index],
            catalog.rakes[index],
        );
        for t in &mut tensor {
            *t *= catalog.areas[index];
        }
        out.tensor.push(tensor);

        out.slip_rates.push([
            PiecewiseLinearFunction1D::from_samples(
                Some(catalog.time_history(index)),
                catalog.onsets[index],
                catalog.timestep,
            ),
            PiecewiseLinearFunction1D::default(),
            PiecewiseLinearFunction1D::default(),
        ]);
    }
    out.debug_assert_invariants();
    Ok(out)
}

/// Build the NRF descriptors of one cluster.
pub fn build_nrf<P>(
    catalog: &NrfCatalog,
    mapping: &ClusterMapping,
    owned: &OwnedSources,
    ctx: &MeshContext<'_>,
    projector: &P,
) -> Result<PointSources, SourceError>
where
    P: BasisProjector + ?Sized,
{
    let mut out = PointSources::with_capacity(
        SourceMode::Nrf,
        projector.num_basis_functions(),
        mapping.len(),
    );
    for &s in &mapping.sources {
        let index = owned.original_index[s];
        let element = owned.mesh_ids[s];
        let subfault = &catalog.subfaults[index];
        out.push_projection(ctx, projector, element, catalog.centres[index])?;

        let [t1, t2, n] = [subfault.tan1, subfault.tan2, subfault.normal];
        out.tensor
            .push([t1[0], t1[1], t1[2], t2[0], t2[1], t2[2], n[0], n[1], n[2]]);

        let material = ctx.material(element)?;
        let mu = if subfault.mu == 0.0 {
            material.mu
        } else {
            subfault.mu
        };
        out.mu_a.push(mu * subfault.area);
        out.lambda_a.push(material.lambda * subfault.area);

        out.slip_rates.push(std::array::from_fn(|component| {
            let samples = catalog.slip_rate_samples(index, component);
            PiecewiseLinearFunction1D::from_samples(
                (!samples.is_empty()).then_some(samples),
                subfault.tinit,
                subfault.timestep,
            )
        }));
    }
    out.debug_assert_invariants();
    Ok(out)
}
