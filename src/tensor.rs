use ndarray::{Array2, Array3, ArrayD, ArrayView3, Axis, Ix2, Ix3};

use crate::error::{Error, Result};

/// Axis layout of a resolved signal tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorLayout {
    /// Index of the time axis (always the last axis).
    pub time_axis: usize,
    /// Index of the trial axis (immediately before time).
    pub trial_axis: usize,
    /// Number of channels (1 when there is no explicit channel axis).
    pub channels: usize,
}

/// Multi-trial time series, resolved once into one of the two accepted
/// layouts.
///
/// The time axis is always last; the trial axis immediately precedes it.
/// Rank and axis sizes are checked at construction so the estimators never
/// have to re-derive them.
///
/// # Example
/// ```
/// use entrain::tensor::SignalTensor;
/// use ndarray::{Array2, ArrayD, IxDyn};
///
/// let x = SignalTensor::single(Array2::<f64>::zeros((10, 256))).unwrap();
/// assert_eq!(x.channels(), 1);
/// assert_eq!(x.trials(), 10);
/// assert_eq!(x.samples(), 256);
///
/// // rank 4 is rejected
/// let bad = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4, 5]));
/// assert!(SignalTensor::from_dyn(bad).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SignalTensor {
    /// Single-channel data with shape (trials, time).
    SingleChannel(Array2<f64>),
    /// Multi-channel data with shape (channels, trials, time).
    MultiChannel(Array3<f64>),
}

impl SignalTensor {
    /// Wrap single-channel data of shape (trials, time).
    ///
    /// # Errors
    /// Returns [`Error::InvalidSize`] if either axis is empty.
    pub fn single(x: Array2<f64>) -> Result<Self> {
        let (trials, samples) = x.dim();
        check_axis("trials", trials)?;
        check_axis("time", samples)?;
        Ok(SignalTensor::SingleChannel(x))
    }

    /// Wrap multi-channel data of shape (channels, trials, time).
    ///
    /// # Errors
    /// Returns [`Error::InvalidSize`] if any axis is empty.
    pub fn multi(x: Array3<f64>) -> Result<Self> {
        let (channels, trials, samples) = x.dim();
        check_axis("channels", channels)?;
        check_axis("trials", trials)?;
        check_axis("time", samples)?;
        Ok(SignalTensor::MultiChannel(x))
    }

    /// Resolve a dynamic-rank array into one of the accepted layouts.
    ///
    /// Rank 2 is taken as (trials, time), rank 3 as (channels, trials,
    /// time); anything else is rejected before any computation happens.
    ///
    /// # Errors
    /// Returns [`Error::InvalidShape`] for rank other than 2 or 3, and
    /// [`Error::InvalidSize`] for empty axes.
    pub fn from_dyn(x: ArrayD<f64>) -> Result<Self> {
        match x.ndim() {
            2 => {
                let x = x.into_dimensionality::<Ix2>().map_err(|_| Error::InvalidShape {
                    expected: "(trials x time)",
                    got: "non-contiguous rank-2 array".into(),
                })?;
                Self::single(x)
            }
            3 => {
                let x = x.into_dimensionality::<Ix3>().map_err(|_| Error::InvalidShape {
                    expected: "(channels x trials x time)",
                    got: "non-contiguous rank-3 array".into(),
                })?;
                Self::multi(x)
            }
            n => Err(Error::InvalidShape {
                expected: "(trials x time) or (channels x trials x time)",
                got: format!("{} dimensions", n),
            }),
        }
    }

    /// Number of channels (1 for the single-channel layout).
    pub fn channels(&self) -> usize {
        match self {
            SignalTensor::SingleChannel(_) => 1,
            SignalTensor::MultiChannel(x) => x.dim().0,
        }
    }

    /// Number of trials.
    pub fn trials(&self) -> usize {
        match self {
            SignalTensor::SingleChannel(x) => x.dim().0,
            SignalTensor::MultiChannel(x) => x.dim().1,
        }
    }

    /// Number of samples along the time axis.
    pub fn samples(&self) -> usize {
        match self {
            SignalTensor::SingleChannel(x) => x.dim().1,
            SignalTensor::MultiChannel(x) => x.dim().2,
        }
    }

    /// Axis layout descriptor.
    pub fn layout(&self) -> TensorLayout {
        match self {
            SignalTensor::SingleChannel(_) => TensorLayout {
                time_axis: 1,
                trial_axis: 0,
                channels: 1,
            },
            SignalTensor::MultiChannel(x) => TensorLayout {
                time_axis: 2,
                trial_axis: 1,
                channels: x.dim().0,
            },
        }
    }

    /// Unified (channels x trials x time) view; the single-channel layout
    /// gains a length-1 channel axis.
    pub(crate) fn as_channels_view(&self) -> ArrayView3<'_, f64> {
        match self {
            SignalTensor::SingleChannel(x) => x.view().insert_axis(Axis(0)),
            SignalTensor::MultiChannel(x) => x.view(),
        }
    }

    /// Build a new tensor selecting `indices` along the trial axis, in the
    /// given order. Duplicate indices are allowed (bootstrap resampling
    /// draws with replacement).
    ///
    /// # Errors
    /// Returns [`Error::InvalidSize`] for an empty index list and
    /// [`Error::InvalidParameter`] for an out-of-range index.
    pub fn select_trials(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(Error::InvalidSize {
                name: "indices",
                value: 0,
                reason: "at least one trial must be selected",
            });
        }
        let trials = self.trials();
        for &i in indices {
            if i >= trials {
                return Err(Error::InvalidParameter {
                    name: "indices",
                    value: i.to_string(),
                    reason: format!("out of range for {} trials", trials),
                });
            }
        }
        Ok(match self {
            SignalTensor::SingleChannel(x) => {
                SignalTensor::SingleChannel(x.select(Axis(0), indices))
            }
            SignalTensor::MultiChannel(x) => {
                SignalTensor::MultiChannel(x.select(Axis(1), indices))
            }
        })
    }
}

fn check_axis(name: &'static str, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::InvalidSize {
            name,
            value: 0,
            reason: "axis must be non-empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn resolves_rank_2() {
        let x = SignalTensor::from_dyn(ArrayD::zeros(IxDyn(&[8, 64]))).unwrap();
        assert_eq!(x.channels(), 1);
        assert_eq!(x.trials(), 8);
        assert_eq!(x.samples(), 64);
        let layout = x.layout();
        assert_eq!(layout.trial_axis, 0);
        assert_eq!(layout.time_axis, 1);
    }

    #[test]
    fn resolves_rank_3() {
        let x = SignalTensor::from_dyn(ArrayD::zeros(IxDyn(&[4, 8, 64]))).unwrap();
        assert_eq!(x.channels(), 4);
        assert_eq!(x.trials(), 8);
        assert_eq!(x.samples(), 64);
        let layout = x.layout();
        assert_eq!(layout.trial_axis, 1);
        assert_eq!(layout.time_axis, 2);
    }

    #[test]
    fn rejects_other_ranks() {
        assert!(matches!(
            SignalTensor::from_dyn(ArrayD::zeros(IxDyn(&[64]))),
            Err(Error::InvalidShape { .. })
        ));
        assert!(matches!(
            SignalTensor::from_dyn(ArrayD::zeros(IxDyn(&[2, 3, 4, 5]))),
            Err(Error::InvalidShape { .. })
        ));
    }

    #[test]
    fn rejects_empty_axes() {
        assert!(SignalTensor::single(Array2::zeros((0, 64))).is_err());
        assert!(SignalTensor::single(Array2::zeros((8, 0))).is_err());
        assert!(SignalTensor::multi(Array3::zeros((0, 8, 64))).is_err());
    }

    #[test]
    fn channel_view_unifies_layouts() {
        let x = SignalTensor::single(Array2::from_elem((8, 64), 1.5)).unwrap();
        let v = x.as_channels_view();
        assert_eq!(v.dim(), (1, 8, 64));
        assert_eq!(v[[0, 3, 10]], 1.5);
    }

    #[test]
    fn select_trials_with_duplicates() {
        let mut data = Array2::zeros((4, 8));
        for (t, mut row) in data.outer_iter_mut().enumerate() {
            row.fill(t as f64);
        }
        let x = SignalTensor::single(data).unwrap();
        let drawn = x.select_trials(&[3, 3, 0, 1]).unwrap();
        assert_eq!(drawn.trials(), 4);
        match drawn {
            SignalTensor::SingleChannel(d) => {
                assert_eq!(d[[0, 0]], 3.0);
                assert_eq!(d[[1, 0]], 3.0);
                assert_eq!(d[[2, 0]], 0.0);
                assert_eq!(d[[3, 0]], 1.0);
            }
            SignalTensor::MultiChannel(_) => unreachable!(),
        }
    }

    #[test]
    fn select_trials_rejects_bad_indices() {
        let x = SignalTensor::single(Array2::zeros((4, 8))).unwrap();
        assert!(x.select_trials(&[]).is_err());
        assert!(x.select_trials(&[4]).is_err());
    }
}
