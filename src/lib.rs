//! Multitaper spectral estimation for multi-trial neural recordings.
//!
//! `entrain` measures how consistently a response is locked to a stimulus
//! across repeated trials. It provides the multitaper phase-locking value
//! (PLV) and inter-trial coherence (ITC), a multitaper power spectrum with
//! a phase-randomized noise-floor estimate, a complex-PCA PLV that reduces
//! multi-channel data to the single dominant phase-locked component per
//! frequency, and a bootstrap driver that attaches variance estimates to
//! any of them by resampling trials with replacement.
//!
//! Discrete prolate spheroidal (Slepian) tapers are generated internally,
//! so no external window provider is needed.
//!
//! # Quick Start
//!
//! ```rust
//! use entrain::params::Params;
//! use entrain::spectral::mtplv;
//! use entrain::tensor::SignalTensor;
//! use ndarray::Array2;
//!
//! // 20 phase-locked trials of a 40 Hz tone sampled at 1 kHz
//! let fs = 1000.0;
//! let mut trials = Array2::<f64>::zeros((20, 256));
//! for mut trial in trials.outer_iter_mut() {
//!     for (i, v) in trial.iter_mut().enumerate() {
//!         *v = (2.0 * std::f64::consts::PI * 40.0 * i as f64 / fs).sin();
//!     }
//! }
//!
//! let x = SignalTensor::single(trials).unwrap();
//! let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
//! let (plv, freqs) = mtplv(&x, &params).unwrap();
//! assert_eq!(plv.nrows(), 1);
//! assert_eq!(plv.ncols(), freqs.len());
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tensor`] | Signal layout resolution: (trials x time) or (channels x trials x time) |
//! | [`params`] | Validated analysis parameters (sampling rate, tapers, band of interest) |
//! | [`tapers`] | Discrete prolate spheroidal taper generation |
//! | [`fft`] | FFT plans and frequency grids |
//! | [`spectral`] | The estimator family: PLV/ITC, spectrum + noise floor, complex-PCA PLV |
//! | [`bootstrap`] | Trial-resampling driver producing mean and variance estimates |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. The [`Error`] enum covers invalid
//! shapes, invalid parameters, degenerate frequency bands, and unknown
//! estimator tags. Failures are detected before any computation starts and
//! are never signalled through sentinel return values.
//!
//! # Determinism
//!
//! [`spectral::mtplv`] and [`spectral::mtcpca`] are pure: identical inputs
//! give identical outputs. The noise floor of [`spectral::mtspec`] and
//! everything produced by [`bootstrap::bootfunc`] draw from a
//! caller-supplied [`rand::Rng`], so results are reproducible exactly when
//! the generator is reseeded and statistically otherwise.
//!
//! # Safety
//!
//! This crate uses `#![forbid(unsafe_code)]` — no unsafe Rust anywhere.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` | Parallelize the per-frequency eigen reductions of the complex-PCA estimator with rayon |

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod bootstrap;
pub mod fft;
pub mod params;
pub mod spectral;
pub mod tapers;
pub mod tensor;
