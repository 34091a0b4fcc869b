//! Bin layouts produced by the build strategies.
//!
//! Each variant stores its bins differently, but all of them answer the same
//! accessor contract. Minima and maxima are always materialized; counts are
//! stored, derived, or shared depending on the strategy.
#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy a histogram was built with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistogramType {
    /// Equally wide value ranges.
    EqualWidth,
    /// Roughly equal row counts per bin.
    EqualHeight,
    /// Equal number of distinct values per bin.
    EqualDistinctCount,
    /// Explicit bins, usually derived from another histogram.
    Generic,
}

impl HistogramType {
    /// Name used in exports.
    pub fn name(self) -> &'static str {
        match self {
            HistogramType::EqualWidth => "EqualWidth",
            HistogramType::EqualHeight => "EqualHeight",
            HistogramType::EqualDistinctCount => "EqualDistinctCount",
            HistogramType::Generic => "Generic",
        }
    }
}

impl fmt::Display for HistogramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Contiguous bins covering `[min, max]` with per-bin counts.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualWidthBins<V> {
    pub(crate) minima: Vec<V>,
    pub(crate) maxima: Vec<V>,
    pub(crate) heights: Vec<u64>,
    pub(crate) distinct_counts: Vec<u64>,
    pub(crate) bins_with_larger_range: usize,
}

/// Contiguous bins whose height is derived from the total row count.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualHeightBins<V> {
    pub(crate) minima: Vec<V>,
    pub(crate) maxima: Vec<V>,
    pub(crate) distinct_counts: Vec<u64>,
    pub(crate) total_count: u64,
}

/// Bins spanning exactly their assigned distinct values; gaps are allowed.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualDistinctCountBins<V> {
    pub(crate) minima: Vec<V>,
    pub(crate) maxima: Vec<V>,
    pub(crate) heights: Vec<u64>,
    pub(crate) distinct_count_per_bin: u64,
    pub(crate) bins_with_extra_value: usize,
}

/// Explicit parallel arrays, with fractional counts.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericBins<V> {
    pub(crate) minima: Vec<V>,
    pub(crate) maxima: Vec<V>,
    pub(crate) heights: Vec<f64>,
    pub(crate) distinct_counts: Vec<f64>,
}

/// Closed set of bin layouts behind one accessor interface.
#[derive(Clone, Debug, PartialEq)]
pub enum BinLayout<V> {
    /// See [`EqualWidthBins`].
    EqualWidth(EqualWidthBins<V>),
    /// See [`EqualHeightBins`].
    EqualHeight(EqualHeightBins<V>),
    /// See [`EqualDistinctCountBins`].
    EqualDistinctCount(EqualDistinctCountBins<V>),
    /// See [`GenericBins`].
    Generic(GenericBins<V>),
}

impl<V: PartialOrd> BinLayout<V> {
    /// Strategy tag.
    pub fn histogram_type(&self) -> HistogramType {
        match self {
            BinLayout::EqualWidth(_) => HistogramType::EqualWidth,
            BinLayout::EqualHeight(_) => HistogramType::EqualHeight,
            BinLayout::EqualDistinctCount(_) => HistogramType::EqualDistinctCount,
            BinLayout::Generic(_) => HistogramType::Generic,
        }
    }

    fn minima(&self) -> &[V] {
        match self {
            BinLayout::EqualWidth(bins) => &bins.minima,
            BinLayout::EqualHeight(bins) => &bins.minima,
            BinLayout::EqualDistinctCount(bins) => &bins.minima,
            BinLayout::Generic(bins) => &bins.minima,
        }
    }

    fn maxima(&self) -> &[V] {
        match self {
            BinLayout::EqualWidth(bins) => &bins.maxima,
            BinLayout::EqualHeight(bins) => &bins.maxima,
            BinLayout::EqualDistinctCount(bins) => &bins.maxima,
            BinLayout::Generic(bins) => &bins.maxima,
        }
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.minima().len()
    }

    /// Inclusive lower bound of bin `index`.
    pub fn bin_min(&self, index: usize) -> &V {
        &self.minima()[index]
    }

    /// Inclusive upper bound of bin `index`.
    pub fn bin_max(&self, index: usize) -> &V {
        &self.maxima()[index]
    }

    /// Rows attributed to bin `index`.
    pub fn bin_height(&self, index: usize) -> f64 {
        match self {
            BinLayout::EqualWidth(bins) => bins.heights[index] as f64,
            BinLayout::EqualHeight(bins) => {
                let bin_count = bins.maxima.len() as u64;
                bins.total_count.div_ceil(bin_count.max(1)) as f64
            }
            BinLayout::EqualDistinctCount(bins) => bins.heights[index] as f64,
            BinLayout::Generic(bins) => bins.heights[index],
        }
    }

    /// Distinct values attributed to bin `index`.
    pub fn bin_distinct_count(&self, index: usize) -> f64 {
        match self {
            BinLayout::EqualWidth(bins) => bins.distinct_counts[index] as f64,
            BinLayout::EqualHeight(bins) => bins.distinct_counts[index] as f64,
            BinLayout::EqualDistinctCount(bins) => {
                let extra = u64::from(index < bins.bins_with_extra_value);
                (bins.distinct_count_per_bin + extra) as f64
            }
            BinLayout::Generic(bins) => bins.distinct_counts[index],
        }
    }

    /// Rows described by the whole layout.
    ///
    /// Equal-height layouts report the true row count rather than the sum of
    /// their rounded-up bin heights.
    pub fn total_count(&self) -> f64 {
        match self {
            BinLayout::EqualWidth(bins) => bins.heights.iter().sum::<u64>() as f64,
            BinLayout::EqualHeight(bins) => bins.total_count as f64,
            BinLayout::EqualDistinctCount(bins) => bins.heights.iter().sum::<u64>() as f64,
            BinLayout::Generic(bins) => bins.heights.iter().sum(),
        }
    }

    /// Distinct values described by the whole layout.
    pub fn total_distinct_count(&self) -> f64 {
        match self {
            BinLayout::EqualWidth(bins) => bins.distinct_counts.iter().sum::<u64>() as f64,
            BinLayout::EqualHeight(bins) => bins.distinct_counts.iter().sum::<u64>() as f64,
            BinLayout::EqualDistinctCount(bins) => {
                let count = bins.minima.len() as u64;
                (bins.distinct_count_per_bin * count + bins.bins_with_extra_value as u64) as f64
            }
            BinLayout::Generic(bins) => bins.distinct_counts.iter().sum(),
        }
    }

    /// Bin containing `value`, if any.
    pub fn bin_for_value(&self, value: &V) -> Option<usize> {
        let index = self.maxima().partition_point(|max| max < value);
        if index < self.bin_count() && self.minima()[index] <= *value {
            Some(index)
        } else {
            None
        }
    }

    /// First bin whose lower bound lies above `value`, if any.
    pub fn next_bin_for_value(&self, value: &V) -> Option<usize> {
        let index = self.minima().partition_point(|min| min <= value);
        (index < self.bin_count()).then_some(index)
    }

    /// Number of leading equal-width bins that are one unit wider.
    pub fn bins_with_larger_range(&self) -> Option<usize> {
        match self {
            BinLayout::EqualWidth(bins) => Some(bins.bins_with_larger_range),
            _ => None,
        }
    }
}
