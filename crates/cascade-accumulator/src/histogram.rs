//! Fixed-range binned distributions.
//!
//! # Binning policy
//!
//! Bins are closed on the left and open on the right: a value sitting
//! exactly on an internal edge belongs to the upper bin. Values outside
//! `[low, high)`, including `high` itself and the infinities, are clamped into
//! the nearest edge bin instead of being dropped. The histogram counts how
//! many fills were clamped on each side so the clamping stays visible in the
//! persisted output. NaN values and weights are refused.

use serde::{Deserialize, Serialize};

use crate::AccumulatorError;

/// Binning request: number of bins over `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    /// Number of bins (at least 1).
    pub bins: u32,
    /// Lower edge of the first bin.
    pub low: f64,
    /// Upper edge of the last bin.
    pub high: f64,
}

impl Binning {
    /// Create a binning request.
    pub const fn new(bins: u32, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }
}

/// Side on which an out-of-range value was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clamp {
    /// The value was inside `[low, high)`.
    Inside,
    /// The value was below `low` and went into the first bin.
    Below,
    /// The value was at or above `high` and went into the last bin.
    Above,
}

/// A validated binning axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    bins: u32,
    low: f64,
    high: f64,
}

impl Axis {
    /// Validate a binning request.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::InvalidBinning`] for zero bins, non-finite
    /// edges, or `high <= low`.
    pub fn new(name: &str, binning: Binning) -> Result<Self, AccumulatorError> {
        let Binning { bins, low, high } = binning;
        if bins == 0 || !low.is_finite() || !high.is_finite() || high <= low {
            return Err(AccumulatorError::InvalidBinning {
                name: name.to_owned(),
                bins,
                low,
                high,
            });
        }
        Ok(Self { bins, low, high })
    }

    /// Number of bins.
    pub const fn bins(&self) -> u32 {
        self.bins
    }

    /// Lower edge of the axis.
    pub const fn low(&self) -> f64 {
        self.low
    }

    /// Upper edge of the axis.
    pub const fn high(&self) -> f64 {
        self.high
    }

    /// Lower edge of bin `bin`; `edge(bins())` is the upper edge of the axis.
    pub fn edge(&self, bin: u32) -> f64 {
        if bin >= self.bins {
            return self.high;
        }
        (self.high - self.low).mul_add(f64::from(bin) / f64::from(self.bins), self.low)
    }

    /// Bin that receives `value`, with the clamping side. `value` must not be NaN.
    pub fn locate(&self, value: f64) -> (u32, Clamp) {
        let last = self.bins.saturating_sub(1);
        if value < self.low {
            return (0, Clamp::Below);
        }
        if value >= self.high {
            return (last, Clamp::Above);
        }

        let fraction = (value - self.low) / (self.high - self.low);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut bin = ((fraction * f64::from(self.bins)).floor() as u32).min(last);

        // Rounding in the division can land a value one bin off its edges;
        // settle against the same edges that `edge` reports.
        if bin < last && value >= self.edge(bin.saturating_add(1)) {
            bin = bin.saturating_add(1);
        } else if bin > 0 && value < self.edge(bin) {
            bin = bin.saturating_sub(1);
        }
        (bin, Clamp::Inside)
    }
}

/// One-dimensional weighted histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram1D {
    axis: Axis,
    contents: Vec<f64>,
    entries: u64,
    sum_weights: f64,
    sum_weighted_values: f64,
    clamped_below: u64,
    clamped_above: u64,
}

impl Histogram1D {
    /// Create an empty histogram over `axis`.
    pub fn new(axis: Axis) -> Self {
        Self {
            contents: vec![0.0; axis.bins() as usize],
            axis,
            entries: 0,
            sum_weights: 0.0,
            sum_weighted_values: 0.0,
            clamped_below: 0,
            clamped_above: 0,
        }
    }

    /// Add `weight` at `value`. Returns the bin filled, or `None` if either
    /// argument is NaN (the histogram is left untouched).
    pub fn fill(&mut self, value: f64, weight: f64) -> Option<u32> {
        if value.is_nan() || weight.is_nan() {
            return None;
        }
        let (bin, clamp) = self.axis.locate(value);
        let slot = self.contents.get_mut(bin as usize)?;
        *slot += weight;
        self.entries = self.entries.saturating_add(1);
        self.sum_weights += weight;
        if value.is_finite() {
            self.sum_weighted_values = weight.mul_add(value, self.sum_weighted_values);
        }
        match clamp {
            Clamp::Inside => {}
            Clamp::Below => self.clamped_below = self.clamped_below.saturating_add(1),
            Clamp::Above => self.clamped_above = self.clamped_above.saturating_add(1),
        }
        Some(bin)
    }

    /// The binning axis.
    pub const fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Summed weight in `bin`.
    pub fn bin_content(&self, bin: u32) -> Option<f64> {
        self.contents.get(bin as usize).copied()
    }

    /// Summed weights of all bins, in bin order.
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Number of fill calls that landed in a bin.
    pub const fn entries(&self) -> u64 {
        self.entries
    }

    /// Fills clamped into the first bin.
    pub const fn clamped_below(&self) -> u64 {
        self.clamped_below
    }

    /// Fills clamped into the last bin.
    pub const fn clamped_above(&self) -> u64 {
        self.clamped_above
    }

    /// Weighted mean of the filled values, `None` while the total weight is zero.
    pub fn mean(&self) -> Option<f64> {
        if self.sum_weights.abs() < f64::EPSILON {
            return None;
        }
        Some(self.sum_weighted_values / self.sum_weights)
    }
}

/// Two-dimensional weighted histogram, stored row-major in `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram2D {
    x_axis: Axis,
    y_axis: Axis,
    contents: Vec<f64>,
    entries: u64,
    clamped: u64,
}

impl Histogram2D {
    /// Create an empty histogram over the two axes.
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        let cells = (x_axis.bins() as usize).saturating_mul(y_axis.bins() as usize);
        Self {
            contents: vec![0.0; cells],
            x_axis,
            y_axis,
            entries: 0,
            clamped: 0,
        }
    }

    /// Add `weight` at `(x, y)`. Returns the `(x, y)` bin filled, or `None`
    /// if any argument is NaN.
    pub fn fill(&mut self, x: f64, y: f64, weight: f64) -> Option<(u32, u32)> {
        if x.is_nan() || y.is_nan() || weight.is_nan() {
            return None;
        }
        let (ix, x_clamp) = self.x_axis.locate(x);
        let (iy, y_clamp) = self.y_axis.locate(y);
        let cell = self.cell(ix, iy)?;
        let slot = self.contents.get_mut(cell)?;
        *slot += weight;
        self.entries = self.entries.saturating_add(1);
        if x_clamp != Clamp::Inside || y_clamp != Clamp::Inside {
            self.clamped = self.clamped.saturating_add(1);
        }
        Some((ix, iy))
    }

    /// The x axis.
    pub const fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    /// The y axis.
    pub const fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    /// Summed weight in cell `(ix, iy)`.
    pub fn bin_content(&self, ix: u32, iy: u32) -> Option<f64> {
        self.cell(ix, iy).and_then(|cell| self.contents.get(cell).copied())
    }

    /// Number of fill calls that landed in a cell.
    pub const fn entries(&self) -> u64 {
        self.entries
    }

    /// Fills clamped on at least one axis.
    pub const fn clamped(&self) -> u64 {
        self.clamped
    }

    fn cell(&self, ix: u32, iy: u32) -> Option<usize> {
        if ix >= self.x_axis.bins() || iy >= self.y_axis.bins() {
            return None;
        }
        (ix as usize)
            .checked_mul(self.y_axis.bins() as usize)?
            .checked_add(iy as usize)
    }
}
