//! Bootstrap resampling over trials.
//!
//! Re-runs one member of the estimator family on random trial re-draws
//! (with replacement) and reduces the per-draw estimates to a mean and an
//! unbiased sample variance.

use log::debug;
use ndarray::{Array, Array1, Array2, Dimension};
use rand::Rng;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::spectral::{mtcpca, mtplv, mtspec};
use crate::tensor::SignalTensor;

/// Which spectral estimator the bootstrap driver re-runs on every draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    /// Complex-PCA PLV ([`mtcpca`]).
    Cpca,
    /// Phase-locking value ([`mtplv`] with the PLV formula).
    Plv,
    /// Inter-trial coherence ([`mtplv`] with the ITC formula).
    Itc,
    /// Power spectrum and noise floor ([`mtspec`]).
    Spec,
}

impl Estimator {
    /// Tag string for diagnostics, matching [`Estimator::from_str`].
    pub fn as_str(self) -> &'static str {
        match self {
            Estimator::Cpca => "cpca",
            Estimator::Plv => "plv",
            Estimator::Itc => "itc",
            Estimator::Spec => "spec",
        }
    }
}

impl FromStr for Estimator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpca" => Ok(Estimator::Cpca),
            "plv" => Ok(Estimator::Plv),
            "itc" => Ok(Estimator::Itc),
            "spec" => Ok(Estimator::Spec),
            other => Err(Error::UnknownEstimator(other.to_string())),
        }
    }
}

/// Bootstrap mean and unbiased variance of one estimator family member.
#[derive(Debug, Clone)]
pub enum BootstrapOutput {
    /// PLV or ITC: per-channel, per-frequency mean and variance.
    Phase {
        mean: Array2<f64>,
        var: Array2<f64>,
        freqs: Array1<f64>,
    },
    /// Complex-PCA PLV: per-frequency mean and variance.
    Cpca {
        mean: Array1<f64>,
        var: Array1<f64>,
        freqs: Array1<f64>,
    },
    /// Power spectrum and noise floor, each with mean and variance.
    Spec {
        s_mean: Array2<f64>,
        s_var: Array2<f64>,
        n_mean: Array2<f64>,
        n_var: Array2<f64>,
        freqs: Array1<f64>,
    },
}

impl BootstrapOutput {
    /// Frequency vector shared by all arrays in this output.
    pub fn freqs(&self) -> &Array1<f64> {
        match self {
            BootstrapOutput::Phase { freqs, .. }
            | BootstrapOutput::Cpca { freqs, .. }
            | BootstrapOutput::Spec { freqs, .. } => freqs,
        }
    }
}

/// Running sum and sum-of-squares over draws, reduced with Bessel's
/// correction.
struct RunningMoments<D: Dimension> {
    sum: Array<f64, D>,
    sumsq: Array<f64, D>,
    draws: usize,
}

impl<D: Dimension> RunningMoments<D> {
    fn from_first(estimate: Array<f64, D>) -> Self {
        let sumsq = estimate.mapv(|v| v * v);
        Self {
            sum: estimate,
            sumsq,
            draws: 1,
        }
    }

    fn push(&mut self, estimate: &Array<f64, D>) {
        self.sum += estimate;
        self.sumsq.zip_mut_with(estimate, |a, &b| *a += b * b);
        self.draws += 1;
    }

    fn finish(self) -> (Array<f64, D>, Array<f64, D>) {
        let n = self.draws as f64;
        let mut var = self.sumsq;
        var.zip_mut_with(&self.sum, |q, &s| *q = (*q - s * s / n) / (n - 1.0));
        let mean = self.sum.mapv(|s| s / n);
        (mean, var)
    }
}

/// Bootstrap a spectral estimator over random trial re-draws.
///
/// Each draw selects `n_per_draw` trial indices uniformly at random with
/// replacement, re-runs the chosen estimator on the resampled tensor, and
/// accumulates the estimate. The `Plv` and `Itc` tags force the
/// corresponding formula regardless of `params.itc`.
///
/// # Arguments
/// * `x` - Input data, single- or multi-channel
/// * `n_per_draw` - Trials per draw (must be positive; may exceed the
///   trial count since sampling is with replacement)
/// * `n_draws` - Number of draws (at least 2, for the unbiased variance)
/// * `params` - Analysis parameters
/// * `estimator` - Which estimator to re-run
/// * `rng` - Random source for draws (and, for `Spec`, the noise floor)
///
/// # Returns
/// A [`BootstrapOutput`] variant matching the estimator, holding the mean
/// and unbiased variance over draws plus the frequency vector.
///
/// # Errors
/// Returns [`Error::InvalidParameter`] for `n_draws < 2` or
/// `n_per_draw == 0`, and propagates shape/parameter errors from the
/// chosen estimator.
pub fn bootfunc<R: Rng>(
    x: &SignalTensor,
    n_per_draw: usize,
    n_draws: usize,
    params: &Params,
    estimator: Estimator,
    rng: &mut R,
) -> Result<BootstrapOutput> {
    params.validate()?;
    if n_draws < 2 {
        return Err(Error::InvalidParameter {
            name: "n_draws",
            value: n_draws.to_string(),
            reason: "at least 2 draws are required for an unbiased variance".into(),
        });
    }
    if n_per_draw == 0 {
        return Err(Error::InvalidParameter {
            name: "n_per_draw",
            value: "0".into(),
            reason: "each draw must select at least one trial".into(),
        });
    }

    let ntrials = x.trials();
    let params = match estimator {
        Estimator::Plv => params.clone().with_itc(false),
        Estimator::Itc => params.clone().with_itc(true),
        _ => params.clone(),
    };

    match estimator {
        Estimator::Plv | Estimator::Itc => {
            debug!("draw 1/{} ({})", n_draws, estimator.as_str());
            let first = resample(x, n_per_draw, ntrials, rng)?;
            let (estimate, freqs) = mtplv(&first, &params)?;
            let mut moments = RunningMoments::from_first(estimate);
            for draw in 1..n_draws {
                debug!("draw {}/{} ({})", draw + 1, n_draws, estimator.as_str());
                let xdraw = resample(x, n_per_draw, ntrials, rng)?;
                let (estimate, _) = mtplv(&xdraw, &params)?;
                moments.push(&estimate);
            }
            let (mean, var) = moments.finish();
            Ok(BootstrapOutput::Phase { mean, var, freqs })
        }
        Estimator::Cpca => {
            debug!("draw 1/{} (cpca)", n_draws);
            let first = resample(x, n_per_draw, ntrials, rng)?;
            let (estimate, freqs) = mtcpca(&first, &params)?;
            let mut moments = RunningMoments::from_first(estimate);
            for draw in 1..n_draws {
                debug!("draw {}/{} (cpca)", draw + 1, n_draws);
                let xdraw = resample(x, n_per_draw, ntrials, rng)?;
                let (estimate, _) = mtcpca(&xdraw, &params)?;
                moments.push(&estimate);
            }
            let (mean, var) = moments.finish();
            Ok(BootstrapOutput::Cpca { mean, var, freqs })
        }
        Estimator::Spec => {
            debug!("draw 1/{} (spec)", n_draws);
            let first = resample(x, n_per_draw, ntrials, rng)?;
            let (s, n, freqs) = mtspec(&first, &params, rng)?;
            let mut s_moments = RunningMoments::from_first(s);
            let mut n_moments = RunningMoments::from_first(n);
            for draw in 1..n_draws {
                debug!("draw {}/{} (spec)", draw + 1, n_draws);
                let xdraw = resample(x, n_per_draw, ntrials, rng)?;
                let (s, n, _) = mtspec(&xdraw, &params, rng)?;
                s_moments.push(&s);
                n_moments.push(&n);
            }
            let (s_mean, s_var) = s_moments.finish();
            let (n_mean, n_var) = n_moments.finish();
            Ok(BootstrapOutput::Spec {
                s_mean,
                s_var,
                n_mean,
                n_var,
                freqs,
            })
        }
    }
}

fn resample<R: Rng>(
    x: &SignalTensor,
    n_per_draw: usize,
    ntrials: usize,
    rng: &mut R,
) -> Result<SignalTensor> {
    let indices: Vec<usize> = (0..n_per_draw)
        .map(|_| rng.random_range(0..ntrials))
        .collect();
    x.select_trials(&indices)
}
