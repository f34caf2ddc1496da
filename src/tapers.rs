//! Discrete prolate spheroidal (Slepian) tapers.
//!
//! The tapers are the top eigenvectors of the classic symmetric tridiagonal
//! formulation of the spectral concentration problem. Eigenvalues are
//! isolated by bisection on the Sturm sequence count and eigenvectors
//! recovered by inverse iteration, so only the `count` requested tapers are
//! ever computed. Concentration ratios are estimated from the in-band
//! fraction of each taper's spectral energy on a fine FFT grid.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::fft::FftPlan;

const MAX_BISECT: usize = 200;
const MAX_INVERSE_ITERS: usize = 10;

/// Generate discrete prolate spheroidal sequences.
///
/// # Arguments
/// * `len` - Window length in samples
/// * `time_bandwidth` - Time-bandwidth product `NW`
/// * `count` - Number of tapers, ordered by decreasing concentration
///
/// # Returns
/// `(tapers, concentrations)` where `tapers` is a `count x len` array of
/// unit-norm windows and `concentrations` holds the in-band energy ratio
/// of each taper, in `(0, 1]` and decreasing.
///
/// # Errors
/// Returns [`Error::InvalidSize`] for `len < 2` and
/// [`Error::InvalidParameter`] for a non-positive time-bandwidth product,
/// `time_bandwidth >= len / 2`, `count == 0`, or `count > len`.
///
/// # Example
/// ```
/// use entrain::tapers::dpss;
///
/// let (tapers, conc) = dpss(128, 2.0, 3).unwrap();
/// assert_eq!(tapers.dim(), (3, 128));
/// assert!(conc[0] > 0.99);
/// ```
pub fn dpss(len: usize, time_bandwidth: f64, count: usize) -> Result<(Array2<f64>, Vec<f64>)> {
    if len < 2 {
        return Err(Error::InvalidSize {
            name: "len",
            value: len,
            reason: "taper length must be at least 2",
        });
    }
    if !time_bandwidth.is_finite() || time_bandwidth <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "time_bandwidth",
            value: format!("{}", time_bandwidth),
            reason: "must be positive and finite".into(),
        });
    }
    if time_bandwidth >= len as f64 / 2.0 {
        return Err(Error::InvalidParameter {
            name: "time_bandwidth",
            value: format!("{}", time_bandwidth),
            reason: format!("must be below len / 2 = {}", len as f64 / 2.0),
        });
    }
    if count == 0 || count > len {
        return Err(Error::InvalidParameter {
            name: "count",
            value: count.to_string(),
            reason: format!("must be in 1..={}", len),
        });
    }

    let n = len;
    let w = time_bandwidth / n as f64;

    // Tridiagonal operator commuting with the concentration problem:
    // diagonal ((n-1)/2 - i)^2 cos(2 pi W), off-diagonal i (n - i) / 2.
    let cos2w = (2.0 * PI * w).cos();
    let half = (n - 1) as f64 / 2.0;
    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let h = half - i as f64;
            h * h * cos2w
        })
        .collect();
    let off: Vec<f64> = (0..n)
        .map(|i| i as f64 * (n - i) as f64 / 2.0)
        .collect();

    let mut tapers = Array2::<f64>::zeros((count, n));
    let mut prior: Vec<Vec<f64>> = Vec::with_capacity(count);
    for k in 0..count {
        // k-th taper pairs with the (k+1)-th largest eigenvalue
        let lambda = kth_smallest_eigenvalue(&diag, &off, n - k);
        let mut vec = inverse_iteration(&diag, &off, lambda, k, &prior);
        fix_polarity(&mut vec, k);
        tapers.row_mut(k).assign(&Array1::from(vec.clone()));
        prior.push(vec);
    }

    let concentrations = in_band_ratios(&tapers, w);
    Ok((tapers, concentrations))
}

/// Number of eigenvalues of the tridiagonal matrix strictly below `x`,
/// via the Sturm sequence of the shifted LDL^T pivots.
fn count_below(diag: &[f64], off: &[f64], x: f64, pivmin: f64) -> usize {
    let mut count = 0usize;
    let mut t = diag[0] - x;
    if t < 0.0 {
        count += 1;
    }
    for i in 1..diag.len() {
        if t.abs() < pivmin {
            t = -pivmin;
        }
        t = diag[i] - x - off[i] * off[i] / t;
        if t < 0.0 {
            count += 1;
        }
    }
    count
}

/// Bisection for the m-th smallest eigenvalue (1-indexed) within the
/// Gershgorin interval.
fn kth_smallest_eigenvalue(diag: &[f64], off: &[f64], m: usize) -> f64 {
    let n = diag.len();
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for i in 0..n {
        let radius = off[i].abs() + if i + 1 < n { off[i + 1].abs() } else { 0.0 };
        lo = lo.min(diag[i] - radius);
        hi = hi.max(diag[i] + radius);
    }
    let scale = lo.abs().max(hi.abs()).max(1.0);
    let pivmin = f64::EPSILON * scale;
    for _ in 0..MAX_BISECT {
        let mid = 0.5 * (lo + hi);
        if count_below(diag, off, mid, pivmin) >= m {
            hi = mid;
        } else {
            lo = mid;
        }
        if hi - lo <= f64::EPSILON * scale {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Inverse iteration for the eigenvector at `shift`, re-orthogonalized
/// against previously extracted tapers.
fn inverse_iteration(diag: &[f64], off: &[f64], shift: f64, k: usize, prior: &[Vec<f64>]) -> Vec<f64> {
    let n = diag.len();
    // Start with k interior sign changes, matching the nodal structure of
    // the target eigenvector.
    let mut v: Vec<f64> = (0..n)
        .map(|i| ((k + 1) as f64 * PI * (i + 1) as f64 / (n + 1) as f64).sin())
        .collect();
    normalize(&mut v);

    for _ in 0..MAX_INVERSE_ITERS {
        let mut next = solve_shifted(diag, off, shift, &v);
        for p in prior {
            let overlap = dot(&next, p);
            for (a, b) in next.iter_mut().zip(p) {
                *a -= overlap * b;
            }
        }
        if normalize(&mut next) == 0.0 {
            break;
        }
        let overlap = dot(&next, &v).abs();
        v = next;
        if (1.0 - overlap).abs() < 1e-13 {
            break;
        }
    }
    v
}

/// Solve (T - shift I) x = rhs for a symmetric tridiagonal T, with partial
/// pivoting (the factorization fills in a second superdiagonal).
fn solve_shifted(diag: &[f64], off: &[f64], shift: f64, rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let anorm = diag
        .iter()
        .chain(off.iter())
        .fold(0.0f64, |m, &v| m.max(v.abs()))
        .max(1.0);
    let tiny = f64::EPSILON * anorm;

    let mut u = vec![0.0f64; n];
    let mut sup1 = vec![0.0f64; n];
    let mut sup2 = vec![0.0f64; n];
    let mut b = rhs.to_vec();

    // Current row entries at columns (i, i+1, i+2).
    let mut r0 = diag[0] - shift;
    let mut r1 = if n > 1 { off[1] } else { 0.0 };
    let mut r2 = 0.0f64;

    for i in 0..n - 1 {
        let mut s0 = off[i + 1];
        let mut s1 = diag[i + 1] - shift;
        let mut s2 = if i + 2 < n { off[i + 2] } else { 0.0 };
        if s0.abs() > r0.abs() {
            std::mem::swap(&mut r0, &mut s0);
            std::mem::swap(&mut r1, &mut s1);
            std::mem::swap(&mut r2, &mut s2);
            b.swap(i, i + 1);
        }
        let pivot = if r0.abs() < tiny { tiny.copysign(r0) } else { r0 };
        let factor = s0 / pivot;
        u[i] = pivot;
        sup1[i] = r1;
        sup2[i] = r2;
        b[i + 1] -= factor * b[i];
        r0 = s1 - factor * r1;
        r1 = s2 - factor * r2;
        r2 = 0.0;
    }
    u[n - 1] = if r0.abs() < tiny { tiny.copysign(r0) } else { r0 };

    let mut x = vec![0.0f64; n];
    x[n - 1] = b[n - 1] / u[n - 1];
    if n >= 2 {
        x[n - 2] = (b[n - 2] - sup1[n - 2] * x[n - 1]) / u[n - 2];
    }
    for i in (0..n.saturating_sub(2)).rev() {
        x[i] = (b[i] - sup1[i] * x[i + 1] - sup2[i] * x[i + 2]) / u[i];
    }
    x
}

/// Sign conventions: symmetric tapers (even k) have positive mean,
/// antisymmetric tapers (odd k) start with a positive lobe.
fn fix_polarity(v: &mut [f64], k: usize) {
    let flip = if k % 2 == 0 {
        v.iter().sum::<f64>() < 0.0
    } else {
        v.iter().take(v.len() / 2).sum::<f64>() < 0.0
    };
    if flip {
        for a in v.iter_mut() {
            *a = -*a;
        }
    }
}

/// Fraction of each taper's spectral energy inside |f| <= W, on an FFT
/// grid fine enough to resolve the band.
fn in_band_ratios(tapers: &Array2<f64>, w: f64) -> Vec<f64> {
    let n = tapers.ncols();
    let nfft = (8 * n).next_power_of_two();
    let plan = FftPlan::new(nfft);
    let mut buffer = vec![Complex64::new(0.0, 0.0); nfft];
    let mut ratios = Vec::with_capacity(tapers.nrows());
    for taper in tapers.outer_iter() {
        for c in buffer.iter_mut() {
            *c = Complex64::new(0.0, 0.0);
        }
        for (i, &t) in taper.iter().enumerate() {
            buffer[i] = Complex64::new(t, 0.0);
        }
        plan.forward(&mut buffer);
        let mut in_band = 0.0;
        let mut total = 0.0;
        for (j, c) in buffer.iter().enumerate() {
            let power = c.norm_sqr();
            total += power;
            let freq = j.min(nfft - j) as f64 / nfft as f64;
            if freq <= w {
                in_band += power;
            }
        }
        ratios.push(in_band / total);
    }
    ratios
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for a in v.iter_mut() {
            *a /= norm;
        }
    }
    norm
}
