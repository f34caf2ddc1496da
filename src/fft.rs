use ndarray::Array1;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// FFT plan for forward and inverse complex FFT operations.
///
/// This struct caches FFT plans for efficient reuse across the taper loop.
/// The underlying planner uses the Cooley-Tukey algorithm and is optimized
/// via the rustfft library.
///
/// # Example
/// ```
/// use entrain::fft::FftPlan;
/// use num_complex::Complex64;
///
/// let plan = FftPlan::new(512);
/// let mut buffer = vec![Complex64::new(1.0, 0.0); 512];
/// plan.forward(&mut buffer);
/// plan.inverse(&mut buffer);
/// ```
pub struct FftPlan {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    len: usize,
}

impl FftPlan {
    /// Create a new FFT plan for a given size.
    ///
    /// # Arguments
    /// * `len` - Size of the FFT (the engine always uses powers of two)
    ///
    /// # Returns
    /// A new FftPlan instance
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        Self {
            forward,
            inverse,
            len,
        }
    }

    /// Transform size this plan was built for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the plan has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Perform forward FFT in-place.
    ///
    /// # Arguments
    /// * `buffer` - Complex input buffer, will be overwritten with FFT output
    pub fn forward(&self, buffer: &mut [Complex64]) {
        self.forward.process(buffer);
    }

    /// Perform inverse FFT in-place.
    ///
    /// The output is scaled by 1/len to make the transform orthogonal.
    ///
    /// # Arguments
    /// * `buffer` - Complex input buffer, will be overwritten with IFFT output
    pub fn inverse(&self, buffer: &mut [Complex64]) {
        self.inverse.process(buffer);
        let scale = 1.0 / self.len as f64;
        for v in buffer.iter_mut() {
            *v *= scale;
        }
    }
}

#[cfg(feature = "parallel")]
const _: () = {
    fn _assert_send_sync<T: Send + Sync>() {}
    fn _check() {
        _assert_send_sync::<FftPlan>();
    }
};

/// Frequency vector for an `nfft`-point transform at sampling rate `fs`.
///
/// Bins are uniformly spaced at `fs / nfft`, covering the full two-sided
/// transform: `f[j] = j * fs / nfft` for `j` in `0..nfft`.
///
/// # Example
/// ```
/// use entrain::fft::fft_frequencies;
///
/// let f = fft_frequencies(1000.0, 8);
/// assert_eq!(f.len(), 8);
/// assert_eq!(f[0], 0.0);
/// assert_eq!(f[1], 125.0);
/// ```
pub fn fft_frequencies(fs: f64, nfft: usize) -> Array1<f64> {
    (0..nfft)
        .map(|j| j as f64 * fs / nfft as f64)
        .collect::<Array1<f64>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn forward_inverse_roundtrip() {
        let plan = FftPlan::new(64);
        let original: Vec<Complex64> = (0..64)
            .map(|i| Complex64::new((i as f64 * 0.1).sin(), 0.0))
            .collect();
        let mut buffer = original.clone();
        plan.forward(&mut buffer);
        plan.inverse(&mut buffer);
        for (a, b) in buffer.iter().zip(&original) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_tone_lands_in_one_bin() {
        let n = 128;
        let plan = FftPlan::new(n);
        let mut buffer: Vec<Complex64> = (0..n)
            .map(|i| {
                Complex64::new(
                    (2.0 * std::f64::consts::PI * 8.0 * i as f64 / n as f64).cos(),
                    0.0,
                )
            })
            .collect();
        plan.forward(&mut buffer);
        let magnitudes: Vec<f64> = buffer.iter().map(|c| c.norm()).collect();
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak.min(n - peak), 8);
    }

    #[test]
    fn frequency_vector_spacing() {
        let f = fft_frequencies(1000.0, 1024);
        assert_eq!(f.len(), 1024);
        assert_relative_eq!(f[1] - f[0], 1000.0 / 1024.0);
        assert_relative_eq!(f[1023], 1023.0 * 1000.0 / 1024.0);
    }
}
