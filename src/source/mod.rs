//! Point-source catalogs and the per-cluster descriptors built from them.
//!
//! Two catalog formats are supported:
//!
//! - [`FsrmCatalog`]: parametric point sources sharing one fault-local moment
//!   tensor, each with its own fault angles, onset, area and time history.
//! - [`NrfCatalog`]: subfault-sampled sources carrying a fault basis and up to
//!   three slip-rate histories stored in shared sample pools.
//!
//! Catalogs are plain data handed over by the file readers. They are checked
//! with `validate` before any source is located.

pub mod descriptor;
pub mod moment;
pub mod pwl;

pub use descriptor::{PointSources, SourceMode};
pub use pwl::PiecewiseLinearFunction1D;

use crate::source_error::SourceError;
use serde::{Deserialize, Serialize};

/// Parametric point sources.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FsrmCatalog {
    /// Fault-local moment tensor, row-major.
    pub moment_tensor: [[f64; 3]; 3],
    pub centres: Vec<[f64; 3]>,
    /// Fault angles in radians.
    pub strikes: Vec<f64>,
    pub dips: Vec<f64>,
    pub rakes: Vec<f64>,
    pub onsets: Vec<f64>,
    pub areas: Vec<f64>,
    pub timestep: f64,
    pub num_samples: usize,
    /// `num_samples` values per source, source-major.
    pub time_histories: Vec<f64>,
}

impl FsrmCatalog {
    pub fn num_sources(&self) -> usize {
        self.centres.len()
    }

    /// Time history samples of source `index`.
    pub fn time_history(&self, index: usize) -> &[f64] {
        let start = index * self.num_samples;
        &self.time_histories[start..start + self.num_samples]
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        let n = self.num_sources();
        for (name, len) in [
            ("strikes", self.strikes.len()),
            ("dips", self.dips.len()),
            ("rakes", self.rakes.len()),
            ("onsets", self.onsets.len()),
            ("areas", self.areas.len()),
        ] {
            if len != n {
                return Err(SourceError::CatalogShape(format!(
                    "{name} has {len} entries for {n} sources"
                )));
            }
        }
        let expected = n.checked_mul(self.num_samples).ok_or_else(|| {
            SourceError::CatalogShape(format!("{n} sources x {} samples overflows", self.num_samples))
        })?;
        if self.time_histories.len() != expected {
            return Err(SourceError::CatalogShape(format!(
                "time histories hold {} samples, expected {n} x {}",
                self.time_histories.len(),
                self.num_samples
            )));
        }
        if self.num_samples > 1 && !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(SourceError::CatalogShape(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        Ok(())
    }
}

/// Fault patch of one NRF source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subfault {
    pub tan1: [f64; 3],
    pub tan2: [f64; 3],
    pub normal: [f64; 3],
    /// Shear modulus override; `0` means use the element's material.
    pub mu: f64,
    pub area: f64,
    pub tinit: f64,
    pub timestep: f64,
}

/// Subfault-sampled sources.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NrfCatalog {
    pub centres: Vec<[f64; 3]>,
    pub subfaults: Vec<Subfault>,
    /// `num_sources + 1` offsets per slip-rate component into `slip_rates`.
    pub slip_rate_offsets: Vec<[usize; 3]>,
    pub slip_rates: [Vec<f64>; 3],
}

impl NrfCatalog {
    pub fn num_sources(&self) -> usize {
        self.centres.len()
    }

    /// Samples of slip-rate component `component` of source `index`.
    pub fn slip_rate_samples(&self, index: usize, component: usize) -> &[f64] {
        let start = self.slip_rate_offsets[index][component];
        let end = self.slip_rate_offsets[index + 1][component];
        &self.slip_rates[component][start..end]
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        let n = self.num_sources();
        if self.subfaults.len() != n {
            return Err(SourceError::CatalogShape(format!(
                "{} subfaults for {n} sources",
                self.subfaults.len()
            )));
        }
        if n == 0 && self.slip_rate_offsets.is_empty() {
            return Ok(());
        }
        if self.slip_rate_offsets.len() != n + 1 {
            return Err(SourceError::CatalogShape(format!(
                "{} slip-rate offsets for {n} sources, expected {}",
                self.slip_rate_offsets.len(),
                n + 1
            )));
        }
        for component in 0..3 {
            let pool = self.slip_rates[component].len();
            for (i, w) in self.slip_rate_offsets.windows(2).enumerate() {
                if w[1][component] < w[0][component] {
                    return Err(SourceError::CatalogShape(format!(
                        "slip-rate offsets of component {component} decrease at source {i}"
                    )));
                }
            }
            let last = self.slip_rate_offsets[n][component];
            if last > pool {
                return Err(SourceError::CatalogShape(format!(
                    "slip-rate component {component} ends at {last}, pool has {pool} samples"
                )));
            }
        }
        for (i, sf) in self.subfaults.iter().enumerate() {
            let has_samples = (0..3).any(|c| {
                self.slip_rate_offsets[i + 1][c] - self.slip_rate_offsets[i][c] > 1
            });
            if has_samples && !(sf.timestep > 0.0 && sf.timestep.is_finite()) {
                return Err(SourceError::CatalogShape(format!(
                    "subfault {i} has timestep {}",
                    sf.timestep
                )));
            }
        }
        Ok(())
    }
}
