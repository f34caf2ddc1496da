//! Multitaper estimator family: phase-locking value, inter-trial
//! coherence, power spectrum with noise floor, and complex-PCA PLV.
//!
//! All estimators share the same pipeline: DPSS tapers for the trial
//! length, a zero-padded FFT of every tapered (channel, trial) row, a
//! per-taper statistic averaged across trials, an unweighted mean over
//! tapers, and a strict restriction to the frequency band of interest.

use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::TAU;

use crate::error::{Error, Result};
use crate::fft::{fft_frequencies, FftPlan};
use crate::params::Params;
use crate::tapers::dpss;
use crate::tensor::SignalTensor;

struct Setup {
    tapers: Array2<f64>,
    nfft: usize,
    plan: FftPlan,
    freqs: Array1<f64>,
}

/// Shared estimator preamble: validate parameters, generate tapers, plan
/// the FFT at the next power of two, and lay out the frequency grid.
fn setup(nsamp: usize, params: &Params) -> Result<Setup> {
    params.validate()?;
    let (tapers, _concentrations) = dpss(nsamp, params.tapers.time_bandwidth, params.tapers.count)?;
    let nfft = nsamp.next_power_of_two();
    let freqs = fft_frequencies(params.fs, nfft);
    Ok(Setup {
        tapers,
        nfft,
        plan: FftPlan::new(nfft),
        freqs,
    })
}

/// Indices of the bins strictly inside the band: `low < f < high`.
fn band_indices(freqs: &Array1<f64>, fpass: (f64, f64)) -> Vec<usize> {
    freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| fpass.0 < f && f < fpass.1)
        .map(|(i, _)| i)
        .collect()
}

/// Tapered, zero-padded spectra of every (channel, trial) row.
fn taper_spectra(
    x: ArrayView3<'_, f64>,
    taper: ArrayView1<'_, f64>,
    nfft: usize,
    plan: &FftPlan,
) -> Array3<Complex64> {
    let (nchans, ntrials, nsamp) = x.dim();
    let mut spectra = Array3::zeros((nchans, ntrials, nfft));
    let mut buffer = vec![Complex64::new(0.0, 0.0); nfft];
    for c in 0..nchans {
        for t in 0..ntrials {
            for v in buffer.iter_mut() {
                *v = Complex64::new(0.0, 0.0);
            }
            for i in 0..nsamp {
                buffer[i] = Complex64::new(x[[c, t, i]] * taper[i], 0.0);
            }
            plan.forward(&mut buffer);
            for (j, &v) in buffer.iter().enumerate() {
                spectra[[c, t, j]] = v;
            }
        }
    }
    spectra
}

/// Multitaper phase-locking value or inter-trial coherence.
///
/// With `params.itc` false (the default), each trial's spectrum is
/// normalized to unit magnitude before trial-averaging, and the squared
/// magnitude of the average is the phase-locking value. With `params.itc`
/// true, the squared magnitude of the raw trial average is divided by the
/// trial-averaged squared magnitude, yielding a coherence measure robust
/// to trial-to-trial amplitude differences.
///
/// # Arguments
/// * `x` - Input data, single- or multi-channel
/// * `params` - Analysis parameters
///
/// # Returns
/// `(estimate, freqs)` where `estimate` has one row per channel and one
/// column per retained frequency bin.
///
/// # Errors
/// Returns [`Error::InvalidParameter`] / [`Error::InvalidFrequencyRange`]
/// for a bad parameter set.
///
/// # Example
/// ```
/// use entrain::params::Params;
/// use entrain::spectral::mtplv;
/// use entrain::tensor::SignalTensor;
/// use ndarray::Array2;
///
/// let fs = 1000.0;
/// let mut trials = Array2::<f64>::zeros((16, 128));
/// for mut trial in trials.outer_iter_mut() {
///     for (i, v) in trial.iter_mut().enumerate() {
///         *v = (2.0 * std::f64::consts::PI * 40.0 * i as f64 / fs).sin();
///     }
/// }
/// let x = SignalTensor::single(trials).unwrap();
/// let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
/// let (plv, freqs) = mtplv(&x, &params).unwrap();
/// assert_eq!(plv.nrows(), 1);
/// assert_eq!(plv.ncols(), freqs.len());
/// ```
pub fn mtplv(x: &SignalTensor, params: &Params) -> Result<(Array2<f64>, Array1<f64>)> {
    let xv = x.as_channels_view();
    let (nchans, ntrials, nsamp) = xv.dim();
    let st = setup(nsamp, params)?;
    let ntaps = params.tapers.count;

    let mut acc = Array2::<f64>::zeros((nchans, st.nfft));
    for (k, taper) in st.tapers.outer_iter().enumerate() {
        debug!("taper {}/{}", k + 1, ntaps);
        let xw = taper_spectra(xv, taper, st.nfft, &st.plan);
        for c in 0..nchans {
            for j in 0..st.nfft {
                let stat = if params.itc {
                    let mut mean = Complex64::new(0.0, 0.0);
                    let mut power = 0.0;
                    for t in 0..ntrials {
                        let v = xw[[c, t, j]];
                        mean += v;
                        power += v.norm_sqr();
                    }
                    (mean / ntrials as f64).norm_sqr() / (power / ntrials as f64)
                } else {
                    let mut mean = Complex64::new(0.0, 0.0);
                    for t in 0..ntrials {
                        let v = xw[[c, t, j]];
                        mean += v / v.norm();
                    }
                    (mean / ntrials as f64).norm_sqr()
                };
                acc[[c, j]] += stat;
            }
        }
    }
    acc.mapv_inplace(|v| v / ntaps as f64);

    let keep = band_indices(&st.freqs, params.fpass);
    Ok((acc.select(Axis(1), &keep), st.freqs.select(Axis(0), &keep)))
}

/// Multitaper power spectrum and phase-randomized noise floor.
///
/// The signal estimate `S` is the magnitude of the trial-averaged spectrum.
/// The noise floor `N` repeats the same average after rotating every
/// (channel, trial, frequency) bin by an independent uniform random phase,
/// destroying any phase-locking across trials; it approximates the
/// spectrum that would remain if there were none.
///
/// # Arguments
/// * `x` - Input data, single- or multi-channel
/// * `params` - Analysis parameters
/// * `rng` - Random source for the phase rotations (seed it for
///   reproducible noise floors)
///
/// # Returns
/// `(s, n, freqs)`; `s` and `n` have one row per channel.
///
/// # Errors
/// Same conditions as [`mtplv`].
pub fn mtspec<R: Rng>(
    x: &SignalTensor,
    params: &Params,
    rng: &mut R,
) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>)> {
    let xv = x.as_channels_view();
    let (nchans, ntrials, nsamp) = xv.dim();
    let st = setup(nsamp, params)?;
    let ntaps = params.tapers.count;

    let mut s_acc = Array2::<f64>::zeros((nchans, st.nfft));
    let mut n_acc = Array2::<f64>::zeros((nchans, st.nfft));
    for (k, taper) in st.tapers.outer_iter().enumerate() {
        debug!("taper {}/{}", k + 1, ntaps);
        let xw = taper_spectra(xv, taper, st.nfft, &st.plan);
        let mut s_sum = Array2::<Complex64>::zeros((nchans, st.nfft));
        let mut n_sum = Array2::<Complex64>::zeros((nchans, st.nfft));
        for c in 0..nchans {
            for t in 0..ntrials {
                for j in 0..st.nfft {
                    let v = xw[[c, t, j]];
                    s_sum[[c, j]] += v;
                    let phase = rng.random::<f64>() * TAU;
                    n_sum[[c, j]] += v * Complex64::from_polar(1.0, phase);
                }
            }
        }
        for c in 0..nchans {
            for j in 0..st.nfft {
                s_acc[[c, j]] += (s_sum[[c, j]] / ntrials as f64).norm();
                n_acc[[c, j]] += (n_sum[[c, j]] / ntrials as f64).norm();
            }
        }
    }
    s_acc.mapv_inplace(|v| v / ntaps as f64);
    n_acc.mapv_inplace(|v| v / ntaps as f64);

    let keep = band_indices(&st.freqs, params.fpass);
    Ok((
        s_acc.select(Axis(1), &keep),
        n_acc.select(Axis(1), &keep),
        st.freqs.select(Axis(0), &keep),
    ))
}

/// Multitaper complex-PCA phase-locking value.
///
/// For every taper the phase-normalized, trial-averaged spectrum
/// `C[channel, f] = mean_trials(xw) / mean_trials(|xw|)` is reduced per
/// frequency bin to the dominant eigenvalue of the Hermitian cross-spectral
/// density matrix `C[:, f] * C[:, f]^H`, divided by the channel count. The
/// result is a single `[0, 1]` phase-locking profile capturing the degree
/// to which all channels share one phase-locked component.
///
/// # Arguments
/// * `x` - Input data; must be multi-channel
/// * `params` - Analysis parameters
///
/// # Returns
/// `(estimate, freqs)`, both one value per retained frequency bin.
///
/// # Errors
/// Returns [`Error::InvalidShape`] for single-channel input, and the same
/// parameter errors as [`mtplv`].
pub fn mtcpca(x: &SignalTensor, params: &Params) -> Result<(Array1<f64>, Array1<f64>)> {
    let x3 = match x {
        SignalTensor::MultiChannel(a) => a,
        SignalTensor::SingleChannel(a) => {
            return Err(Error::InvalidShape {
                expected: "(channels x trials x time)",
                got: format!("({} x {}) single-channel array", a.nrows(), a.ncols()),
            })
        }
    };
    let (nchans, ntrials, nsamp) = x3.dim();
    let st = setup(nsamp, params)?;
    let ntaps = params.tapers.count;
    debug!("{} channels, {} trials", nchans, ntrials);

    let mut acc = Array1::<f64>::zeros(st.nfft);
    for (k, taper) in st.tapers.outer_iter().enumerate() {
        debug!("taper {}/{}", k + 1, ntaps);
        let xw = taper_spectra(x3.view(), taper, st.nfft, &st.plan);

        // Phase-normalized trial average per channel: complex, magnitude <= 1.
        let mut c = Array2::<Complex64>::zeros((nchans, st.nfft));
        for ch in 0..nchans {
            for j in 0..st.nfft {
                let mut num = Complex64::new(0.0, 0.0);
                let mut den = 0.0;
                for t in 0..ntrials {
                    let v = xw[[ch, t, j]];
                    num += v;
                    den += v.norm();
                }
                c[[ch, j]] = num / den;
            }
        }

        let shares: Vec<f64> = {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                (0..st.nfft)
                    .into_par_iter()
                    .map(|j| dominant_share(&c, j))
                    .collect()
            }
            #[cfg(not(feature = "parallel"))]
            {
                (0..st.nfft).map(|j| dominant_share(&c, j)).collect()
            }
        };
        for (j, share) in shares.iter().enumerate() {
            acc[j] += share;
        }
    }
    acc.mapv_inplace(|v| v / ntaps as f64);

    let keep = band_indices(&st.freqs, params.fpass);
    Ok((acc.select(Axis(0), &keep), st.freqs.select(Axis(0), &keep)))
}

/// Largest eigenvalue of the Hermitian cross-spectral density matrix at
/// one frequency bin, as a share of its channel-count upper bound.
fn dominant_share(c: &Array2<Complex64>, j: usize) -> f64 {
    let nchans = c.nrows();
    let csd = DMatrix::from_fn(nchans, nchans, |row, col| c[[row, j]] * c[[col, j]].conj());
    let eigenvalues = csd.symmetric_eigenvalues();
    eigenvalues
        .iter()
        .fold(f64::NEG_INFINITY, |m, &v| m.max(v))
        / nchans as f64
}
