//! Scenario tests for the estimator family against synthetic phase-locked
//! signals.

use approx::assert_abs_diff_eq;
use entrain::params::Params;
use entrain::spectral::{mtcpca, mtplv, mtspec};
use entrain::tensor::SignalTensor;
use ndarray::{Array1, Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::f64::consts::PI;

/// Trials of a phase-locked sinusoid plus independent uniform noise.
fn locked_trials(
    n_trials: usize,
    n_samples: usize,
    fs: f64,
    freq: f64,
    noise: f64,
    seed: u64,
) -> Array2<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut x = Array2::zeros((n_trials, n_samples));
    for mut trial in x.outer_iter_mut() {
        for (i, v) in trial.iter_mut().enumerate() {
            let t = i as f64 / fs;
            *v = (2.0 * PI * freq * t).sin() + noise * (rng.random::<f64>() - 0.5);
        }
    }
    x
}

fn nearest_bin(freqs: &Array1<f64>, target: f64) -> usize {
    freqs
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn plv_peaks_at_locked_frequency() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(50, 1024, fs, 40.0, 1.0, 7)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtplv(&x, &params).unwrap();

    assert_eq!(plv.nrows(), 1);
    assert_eq!(plv.ncols(), freqs.len());

    let peak = nearest_bin(&freqs, 40.0);
    assert!(
        plv[[0, peak]] > 0.5,
        "PLV at 40 Hz is {}, expected > 0.5",
        plv[[0, peak]]
    );

    let mut off_band_max = 0.0f64;
    let mut off_band_sum = 0.0f64;
    let mut off_band_count = 0usize;
    for (j, &f) in freqs.iter().enumerate() {
        if (f - 40.0).abs() > 15.0 {
            off_band_max = off_band_max.max(plv[[0, j]]);
            off_band_sum += plv[[0, j]];
            off_band_count += 1;
        }
    }
    assert!(off_band_max < 0.2, "off-band max {}", off_band_max);
    assert!(off_band_sum / (off_band_count as f64) < 0.05);
}

#[test]
fn itc_peaks_at_locked_frequency() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(50, 1024, fs, 40.0, 1.0, 11)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0))
        .unwrap()
        .with_itc(true);
    let (itc, freqs) = mtplv(&x, &params).unwrap();

    let peak = nearest_bin(&freqs, 40.0);
    assert!(itc[[0, peak]] > 0.5);
}

#[test]
fn plv_of_noiseless_locked_trials_is_one() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(30, 512, fs, 40.0, 0.0, 0)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtplv(&x, &params).unwrap();
    let peak = nearest_bin(&freqs, 40.0);
    assert_abs_diff_eq!(plv[[0, peak]], 1.0, epsilon = 1e-9);
}

#[test]
fn plv_varies_smoothly_with_taper_count() {
    let fs = 1000.0;
    let data = locked_trials(40, 512, fs, 40.0, 1.0, 3);
    let x = SignalTensor::single(data).unwrap();

    let mut peaks = Vec::new();
    for count in 2..=5 {
        let params = Params::new(fs, (3.0, count), (5.0, 100.0)).unwrap();
        let (plv, freqs) = mtplv(&x, &params).unwrap();
        let peak = nearest_bin(&freqs, 40.0);
        peaks.push(plv[[0, peak]]);
    }
    for &p in &peaks {
        assert!(p > 0.5, "peak PLV {} too low", p);
    }
    for pair in peaks.windows(2) {
        assert!(
            (pair[0] - pair[1]).abs() < 0.25,
            "estimate jumped from {} to {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn multichannel_plv_has_one_row_per_channel() {
    let fs = 1000.0;
    let mut x = Array3::zeros((3, 20, 256));
    for ch in 0..3 {
        let trials = locked_trials(20, 256, fs, 40.0, 0.5, 100 + ch as u64);
        x.index_axis_mut(ndarray::Axis(0), ch).assign(&trials);
    }
    let x = SignalTensor::multi(x).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtplv(&x, &params).unwrap();
    assert_eq!(plv.nrows(), 3);
    assert_eq!(plv.ncols(), freqs.len());
}

#[test]
fn estimators_are_deterministic() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(20, 256, fs, 40.0, 1.0, 5)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (a, fa) = mtplv(&x, &params).unwrap();
    let (b, fb) = mtplv(&x, &params).unwrap();
    assert_eq!(a, b);
    assert_eq!(fa, fb);
}

#[test]
fn cpca_of_identical_channels_is_one_at_peak() {
    let fs = 1000.0;
    let trials = locked_trials(20, 512, fs, 40.0, 0.0, 0);
    let mut x = Array3::zeros((3, 20, 512));
    for ch in 0..3 {
        x.index_axis_mut(ndarray::Axis(0), ch).assign(&trials);
    }
    let x = SignalTensor::multi(x).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtcpca(&x, &params).unwrap();

    assert_eq!(plv.len(), freqs.len());
    let peak = nearest_bin(&freqs, 40.0);
    assert_abs_diff_eq!(plv[peak], 1.0, epsilon = 1e-6);
}

#[test]
fn cpca_with_noise_stays_bounded_and_peaks() {
    let fs = 1000.0;
    let mut x = Array3::zeros((3, 30, 512));
    for ch in 0..3 {
        let trials = locked_trials(30, 512, fs, 40.0, 1.0, 40 + ch as u64);
        x.index_axis_mut(ndarray::Axis(0), ch).assign(&trials);
    }
    let x = SignalTensor::multi(x).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtcpca(&x, &params).unwrap();

    for &v in plv.iter() {
        assert!(v.is_finite());
        assert!((0.0..=1.0 + 1e-9).contains(&v));
    }
    let peak = nearest_bin(&freqs, 40.0);
    assert!(plv[peak] > 0.5);
}

#[test]
fn spectrum_sits_well_above_noise_floor_when_locked() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(50, 1024, fs, 40.0, 1.0, 13)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(21);
    let (s, n, freqs) = mtspec(&x, &params, &mut rng).unwrap();

    assert_eq!(s.dim(), n.dim());
    assert_eq!(s.ncols(), freqs.len());

    let peak = nearest_bin(&freqs, 40.0);
    assert!(
        s[[0, peak]] > 3.0 * n[[0, peak]],
        "S = {}, N = {}",
        s[[0, peak]],
        n[[0, peak]]
    );
}

#[test]
fn noise_floor_tracks_spectrum_for_pure_noise() {
    let fs = 1000.0;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(19);
    let mut data = Array2::zeros((50, 1024));
    for v in data.iter_mut() {
        *v = rng.random::<f64>() - 0.5;
    }
    let x = SignalTensor::single(data).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(29);
    let (s, n, _) = mtspec(&x, &params, &mut rng).unwrap();

    // with no phase-locking across trials, the phase-randomized floor is
    // statistically the same size as the spectrum itself
    let mut ratios: Vec<f64> = s
        .iter()
        .zip(n.iter())
        .map(|(&sv, &nv)| sv / nv)
        .collect();
    ratios.sort_by(f64::total_cmp);
    let median = ratios[ratios.len() / 2];
    assert!(
        (0.4..2.5).contains(&median),
        "median S/N ratio {} for unlocked noise",
        median
    );
}

#[test]
fn noise_floor_is_reproducible_under_the_same_seed() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(20, 256, fs, 40.0, 1.0, 17)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();

    let mut rng_a = Xoshiro256PlusPlus::seed_from_u64(99);
    let mut rng_b = Xoshiro256PlusPlus::seed_from_u64(99);
    let (sa, na, _) = mtspec(&x, &params, &mut rng_a).unwrap();
    let (sb, nb, _) = mtspec(&x, &params, &mut rng_b).unwrap();
    assert_eq!(sa, sb);
    assert_eq!(na, nb);

    let mut rng_c = Xoshiro256PlusPlus::seed_from_u64(100);
    let (_, nc, _) = mtspec(&x, &params, &mut rng_c).unwrap();
    assert_ne!(na, nc);
}

#[test]
fn restricted_frequencies_stay_inside_the_band() {
    let fs = 1000.0;
    let x = SignalTensor::single(locked_trials(10, 300, fs, 40.0, 1.0, 23)).unwrap();
    let params = Params::new(fs, (2.0, 3), (5.0, 100.0)).unwrap();
    let (plv, freqs) = mtplv(&x, &params).unwrap();

    assert_eq!(plv.ncols(), freqs.len());
    for &f in freqs.iter() {
        assert!(f > 5.0 && f < 100.0);
    }
    // 300 samples pad up to a 512-point grid
    let expected = (0..512)
        .map(|j| j as f64 * fs / 512.0)
        .filter(|&f| f > 5.0 && f < 100.0)
        .count();
    assert_eq!(freqs.len(), expected);
}
