//! Piecewise-linear slip-rate functions sampled on a uniform time grid.

use serde::{Deserialize, Serialize};

/// `f(t) = slope[i] * t + intercept[i]` on `[onset + i*dt, onset + (i+1)*dt)`.
///
/// Built from `n` samples it has `n - 1` pieces; zero samples give the empty
/// function, which evaluates and integrates to zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseLinearFunction1D {
    pub slopes: Vec<f64>,
    pub intercepts: Vec<f64>,
    pub onset_time: f64,
    pub sampling_interval: f64,
}

impl PiecewiseLinearFunction1D {
    /// Interpolate `samples` taken every `dt` starting at `onset`.
    ///
    /// `None` or fewer than two samples produce a function without pieces.
    pub fn from_samples(samples: Option<&[f64]>, onset: f64, dt: f64) -> Self {
        let samples = samples.unwrap_or_default();
        let pieces = samples.len().saturating_sub(1);
        let mut slopes = Vec::with_capacity(pieces);
        let mut intercepts = Vec::with_capacity(pieces);
        for (i, w) in samples.windows(2).enumerate() {
            let slope = (w[1] - w[0]) / dt;
            slopes.push(slope);
            intercepts.push(w[0] - slope * (onset + i as f64 * dt));
        }
        Self {
            slopes,
            intercepts,
            onset_time: onset,
            sampling_interval: dt,
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.slopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slopes.is_empty()
    }

    /// Value at `t`; zero outside the sampled interval.
    pub fn evaluate(&self, t: f64) -> f64 {
        let rel = (t - self.onset_time) / self.sampling_interval;
        if self.is_empty() || !(rel >= 0.0) {
            return 0.0;
        }
        let i = rel.floor() as usize;
        if i >= self.num_pieces() {
            return 0.0;
        }
        self.slopes[i] * t + self.intercepts[i]
    }

    /// `∫ f(t) dt` over `[from, to]`, restricted to the sampled interval.
    pub fn time_integral(&self, from: f64, to: f64) -> f64 {
        if self.is_empty() || !(to > from) {
            return 0.0;
        }
        let dt = self.sampling_interval;
        let last = self.num_pieces() as isize - 1;
        let from_index = (((from - self.onset_time) / dt).floor() as isize).max(0);
        let to_index = (((to - self.onset_time) / dt).floor() as isize).min(last);

        let mut integral = 0.0;
        for i in from_index..=to_index {
            let i = i as usize;
            let piece_start = self.onset_time + i as f64 * dt;
            let lower = from.max(piece_start);
            let upper = to.min(piece_start + dt);
            if upper <= lower {
                continue;
            }
            integral += self.slopes[i] * 0.5 * (upper * upper - lower * lower)
                + self.intercepts[i] * (upper - lower);
        }
        integral
    }
}
