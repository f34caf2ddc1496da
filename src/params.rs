use crate::error::{Error, Result};

/// Multitaper configuration: time-bandwidth product and number of tapers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaperSpec {
    /// Time-bandwidth product `NW`. Larger values trade frequency
    /// resolution for lower estimator variance.
    pub time_bandwidth: f64,
    /// Number of tapers to average over. Conventionally at most `2 * NW - 1`.
    pub count: usize,
}

/// Analysis parameters shared by every estimator.
///
/// Construct with [`Params::new`], which validates all fields eagerly, then
/// adjust the flags with [`Params::with_itc`] / [`Params::with_pad`].
///
/// # Example
/// ```
/// use entrain::params::Params;
///
/// let params = Params::new(1000.0, (2.0, 3), (5.0, 100.0)).unwrap();
/// assert!(!params.itc);
///
/// // low >= high is rejected
/// assert!(Params::new(1000.0, (2.0, 3), (100.0, 5.0)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Sampling rate in Hz.
    pub fs: f64,
    /// Taper configuration.
    pub tapers: TaperSpec,
    /// Frequency band of interest as `(low, high)`. Estimates keep only
    /// bins with `low < f < high` (strict on both ends).
    pub fpass: (f64, f64),
    /// Accepted for interface compatibility. The engine always zero-pads
    /// to the next power of two regardless of this flag.
    pub pad: bool,
    /// Select the ITC formula instead of PLV (PLV/ITC estimator only).
    pub itc: bool,
}

impl Params {
    /// Create a validated parameter set.
    ///
    /// # Arguments
    /// * `fs` - Sampling rate in Hz (must be positive and finite)
    /// * `tapers` - `(time_bandwidth, count)` pair
    /// * `fpass` - Frequency band of interest `(low, high)`, `low < high`
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for a non-positive sampling rate
    /// or taper spec, and [`Error::InvalidFrequencyRange`] for a degenerate
    /// band.
    pub fn new(fs: f64, tapers: (f64, usize), fpass: (f64, f64)) -> Result<Self> {
        let params = Self {
            fs,
            tapers: TaperSpec {
                time_bandwidth: tapers.0,
                count: tapers.1,
            },
            fpass,
            pad: true,
            itc: false,
        };
        params.validate()?;
        Ok(params)
    }

    /// Select between the ITC (`true`) and PLV (`false`) formulas.
    pub fn with_itc(mut self, itc: bool) -> Self {
        self.itc = itc;
        self
    }

    /// Set the (currently inert) padding flag.
    pub fn with_pad(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }

    /// Re-check all invariants. Called by every estimator on entry so that
    /// a struct-literal-built parameter set still fails fast.
    pub fn validate(&self) -> Result<()> {
        if !self.fs.is_finite() || self.fs <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "fs",
                value: format!("{}", self.fs),
                reason: "sampling rate must be positive and finite".into(),
            });
        }
        if !self.tapers.time_bandwidth.is_finite() || self.tapers.time_bandwidth <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "tapers",
                value: format!("{}", self.tapers.time_bandwidth),
                reason: "time-bandwidth product must be positive and finite".into(),
            });
        }
        if self.tapers.count == 0 {
            return Err(Error::InvalidParameter {
                name: "tapers",
                value: "0".into(),
                reason: "at least one taper is required".into(),
            });
        }
        let (low, high) = self.fpass;
        if !low.is_finite() || !high.is_finite() {
            return Err(Error::InvalidFrequencyRange {
                low,
                high,
                reason: "band edges must be finite".into(),
            });
        }
        if low >= high {
            return Err(Error::InvalidFrequencyRange {
                low,
                high,
                reason: "low edge must be below high edge".into(),
            });
        }
        Ok(())
    }
}
