//! Estimation algorithms shared by every bin layout.
#![forbid(unsafe_code)]

use std::cmp::Ordering;

use super::builder::{build_layout, generic_layout, BinStrategy};
use super::domain::{LikePattern, OrderedDomain};
use super::layout::{BinLayout, HistogramType};
use crate::types::{PredicateCondition, Result, StatsError};

/// Approximate value distribution of one column.
///
/// A histogram is immutable once built and can be shared between threads;
/// every estimation method takes `&self`.
#[derive(Clone, Debug)]
pub struct Histogram<D: OrderedDomain> {
    domain: D,
    layout: BinLayout<D::Value>,
}

impl<D: OrderedDomain> Histogram<D> {
    /// Builds a histogram from `(value, count)` pairs sorted ascending by value.
    ///
    /// At most `max_bin_count` bins are produced.
    pub fn from_value_counts(
        domain: D,
        value_counts: &[(D::Value, u64)],
        strategy: BinStrategy,
        max_bin_count: usize,
    ) -> Result<Self> {
        let layout = build_layout(&domain, value_counts, strategy, max_bin_count)?;
        Ok(Self { domain, layout })
    }

    /// Equal-width histogram, see [`BinStrategy::EqualWidth`].
    pub fn equal_width(
        domain: D,
        value_counts: &[(D::Value, u64)],
        max_bin_count: usize,
    ) -> Result<Self> {
        Self::from_value_counts(domain, value_counts, BinStrategy::EqualWidth, max_bin_count)
    }

    /// Equal-height histogram, see [`BinStrategy::EqualHeight`].
    pub fn equal_height(
        domain: D,
        value_counts: &[(D::Value, u64)],
        max_bin_count: usize,
    ) -> Result<Self> {
        Self::from_value_counts(domain, value_counts, BinStrategy::EqualHeight, max_bin_count)
    }

    /// Equal-distinct-count histogram, see [`BinStrategy::EqualDistinctCount`].
    pub fn equal_distinct_count(
        domain: D,
        value_counts: &[(D::Value, u64)],
        max_bin_count: usize,
    ) -> Result<Self> {
        Self::from_value_counts(
            domain,
            value_counts,
            BinStrategy::EqualDistinctCount,
            max_bin_count,
        )
    }

    /// Generic histogram from explicit parallel bin arrays.
    pub fn generic(
        domain: D,
        minima: Vec<D::Value>,
        maxima: Vec<D::Value>,
        heights: Vec<f64>,
        distinct_counts: Vec<f64>,
    ) -> Result<Self> {
        let layout = generic_layout(&domain, minima, maxima, heights, distinct_counts)?;
        Ok(Self { domain, layout })
    }

    pub(crate) fn from_layout(domain: D, layout: BinLayout<D::Value>) -> Self {
        Self { domain, layout }
    }

    /// Domain the bins are expressed in.
    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Underlying bin layout.
    pub fn layout(&self) -> &BinLayout<D::Value> {
        &self.layout
    }

    /// Strategy that produced the bins.
    pub fn histogram_type(&self) -> HistogramType {
        self.layout.histogram_type()
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.layout.bin_count()
    }

    /// Inclusive lower bound of bin `index`.
    pub fn bin_min(&self, index: usize) -> &D::Value {
        self.layout.bin_min(index)
    }

    /// Inclusive upper bound of bin `index`.
    pub fn bin_max(&self, index: usize) -> &D::Value {
        self.layout.bin_max(index)
    }

    /// Rows attributed to bin `index`.
    pub fn bin_height(&self, index: usize) -> f32 {
        self.layout.bin_height(index) as f32
    }

    /// Distinct values attributed to bin `index`.
    pub fn bin_distinct_count(&self, index: usize) -> f32 {
        self.layout.bin_distinct_count(index) as f32
    }

    /// Bin containing `value` after canonicalization, if any.
    pub fn bin_for_value(&self, value: &D::Value) -> Option<usize> {
        self.layout.bin_for_value(&self.domain.canonicalize(value))
    }

    /// First bin starting above `value` after canonicalization, if any.
    pub fn next_bin_for_value(&self, value: &D::Value) -> Option<usize> {
        self.layout.next_bin_for_value(&self.domain.canonicalize(value))
    }

    /// Rows described by the histogram.
    pub fn total_count(&self) -> f32 {
        self.layout.total_count() as f32
    }

    /// Distinct values described by the histogram.
    pub fn total_distinct_count(&self) -> f32 {
        self.layout.total_distinct_count() as f32
    }

    /// Lower bound of the first bin.
    pub fn min(&self) -> &D::Value {
        self.layout.bin_min(0)
    }

    /// Upper bound of the last bin.
    pub fn max(&self) -> &D::Value {
        self.layout.bin_max(self.layout.bin_count() - 1)
    }

    /// Whether the predicate provably matches no row.
    ///
    /// Unlike the estimates this never guesses: `true` is only returned when
    /// the bins rule out every row.
    pub fn can_prune(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<bool> {
        let value2 = self.check_arguments(condition, value, value2)?;
        self.prunes(condition, value, value2)
    }

    /// Estimated number of rows matching the predicate.
    pub fn estimate_cardinality(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<f32> {
        let value2 = self.check_arguments(condition, value, value2)?;
        if self.prunes(condition, value, value2)? {
            return Ok(0.0);
        }
        let estimate = self.estimate(condition, value, value2, Measure::Rows)?;
        Ok(estimate.max(0.0) as f32)
    }

    /// Estimated fraction of rows matching the predicate.
    pub fn estimate_selectivity(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<f32> {
        let cardinality = self.estimate_cardinality(condition, value, value2)?;
        let total = self.total_count();
        if total > 0.0 {
            Ok(cardinality / total)
        } else {
            Ok(0.0)
        }
    }

    /// Estimated number of distinct values among the matching rows.
    pub fn estimate_distinct_count(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<f32> {
        let value2 = self.check_arguments(condition, value, value2)?;
        if self.prunes(condition, value, value2)? {
            return Ok(0.0);
        }
        let estimate = self.estimate(condition, value, value2, Measure::DistinctValues)?;
        Ok(estimate.max(0.0) as f32)
    }

    pub(crate) fn check_arguments<'a>(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&'a D::Value>,
    ) -> Result<Option<&'a D::Value>> {
        if condition.is_pattern() && !self.domain.supports_patterns() {
            return Err(StatsError::unsupported(
                condition,
                "pattern predicates require a string column",
            ));
        }
        self.domain.check_value(value, condition.is_pattern())?;
        if condition.is_ternary() {
            let Some(upper) = value2 else {
                return Err(StatsError::InvalidArgument("BETWEEN requires a second value"));
            };
            self.domain.check_value(upper, false)?;
            Ok(Some(upper))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn pattern(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
    ) -> Result<LikePattern<D::Value>> {
        self.domain.like_pattern(value).ok_or_else(|| {
            StatsError::unsupported(condition, "pattern predicates require a string column")
        })
    }

    fn second(value2: Option<&D::Value>) -> Result<&D::Value> {
        value2.ok_or(StatsError::InvalidArgument("BETWEEN requires a second value"))
    }

    pub(crate) fn prunes(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<bool> {
        let canonical = self.domain.canonicalize(value);
        let prunable = match condition {
            PredicateCondition::Equals => self.range_is_empty(&canonical, Some(&canonical)),
            PredicateCondition::NotEquals => {
                !self.domain.is_truncated(value)
                    && canonical == *self.min()
                    && canonical == *self.max()
            }
            PredicateCondition::LessThan => *value <= *self.min(),
            PredicateCondition::LessThanEquals => *value < *self.min(),
            PredicateCondition::GreaterThanEquals => self.exceeds_all_rows(value, false),
            PredicateCondition::GreaterThan => self.exceeds_all_rows(value, true),
            PredicateCondition::Between => {
                let upper = Self::second(value2)?;
                if self.exceeds_all_rows(value, false)
                    || *upper < *self.min()
                    || *upper < *value
                {
                    true
                } else {
                    self.range_is_empty(&canonical, Some(&self.domain.canonicalize(upper)))
                }
            }
            PredicateCondition::Like => match self.pattern(condition, value)? {
                LikePattern::MatchAll => false,
                LikePattern::Exact(exact) => {
                    return self.prunes(PredicateCondition::Equals, &exact, None)
                }
                LikePattern::Prefix { prefix, upper }
                | LikePattern::Complex {
                    literal_prefix: Some((prefix, upper)),
                } => self.range_is_empty(&prefix, upper.as_ref()),
                LikePattern::Complex {
                    literal_prefix: None,
                } => false,
            },
            PredicateCondition::NotLike => match self.pattern(condition, value)? {
                LikePattern::MatchAll => true,
                LikePattern::Exact(exact) => {
                    return self.prunes(PredicateCondition::NotEquals, &exact, None)
                }
                LikePattern::Prefix { prefix, .. } => {
                    self.domain.has_prefix(self.min(), &prefix)
                        && self.domain.has_prefix(self.max(), &prefix)
                }
                LikePattern::Complex { .. } => false,
            },
        };
        Ok(prunable)
    }

    /// Whether no row is `>= value` (or `> value` when `inclusive`).
    fn exceeds_all_rows(&self, value: &D::Value, inclusive: bool) -> bool {
        let max = self.max();
        if self.domain.is_truncated(max) {
            // rows stored as `max` may continue past it
            *value > *max && !self.domain.has_prefix(value, max)
        } else if inclusive {
            *value >= *max
        } else {
            *value > *max
        }
    }

    /// Whether every bin overlapping `[lower, upper]` is empty. An absent
    /// `upper` extends the range to the end of the domain.
    fn range_is_empty(&self, lower: &D::Value, upper: Option<&D::Value>) -> bool {
        let bin_count = self.layout.bin_count();
        let Some(first) = self
            .layout
            .bin_for_value(lower)
            .or_else(|| self.layout.next_bin_for_value(lower))
        else {
            return true;
        };
        let last = match upper {
            None => Some(bin_count - 1),
            Some(upper) => match self.layout.bin_for_value(upper) {
                Some(bin) => Some(bin),
                None => match self.layout.next_bin_for_value(upper) {
                    Some(next) => next.checked_sub(1),
                    None => Some(bin_count - 1),
                },
            },
        };
        match last {
            Some(last) if last >= first => {
                (first..=last).all(|bin| self.layout.bin_height(bin) <= 0.0)
            }
            _ => true,
        }
    }

    fn estimate(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
        measure: Measure,
    ) -> Result<f64> {
        let total = self.measure_total(measure);
        let raw = value;
        let value = self.domain.canonicalize(raw);
        let estimate = match condition {
            PredicateCondition::Equals => self.point_estimate(&value, measure),
            PredicateCondition::NotEquals => total - self.point_estimate(&value, measure),
            PredicateCondition::LessThan => self.cumulative_below(&value, measure),
            PredicateCondition::LessThanEquals => self.cumulative_through(&value, measure),
            PredicateCondition::GreaterThanEquals => total - self.cumulative_below(&value, measure),
            PredicateCondition::GreaterThan => total - self.cumulative_through(&value, measure),
            PredicateCondition::Between => {
                let upper = self.domain.canonicalize(Self::second(value2)?);
                if upper < value {
                    0.0
                } else {
                    self.cumulative_through(&upper, measure)
                        - self.cumulative_below(&value, measure)
                }
            }
            PredicateCondition::Like => {
                let pattern = self.pattern(condition, raw)?;
                self.like_estimate(&pattern, measure)
            }
            PredicateCondition::NotLike => match self.pattern(condition, raw)? {
                LikePattern::MatchAll => 0.0,
                LikePattern::Exact(exact) => total - self.point_estimate(&exact, measure),
                pattern @ LikePattern::Prefix { .. } => total - self.like_estimate(&pattern, measure),
                LikePattern::Complex { .. } => total,
            },
        };
        Ok(estimate)
    }

    pub(crate) fn like_estimate(&self, pattern: &LikePattern<D::Value>, measure: Measure) -> f64 {
        let total = self.measure_total(measure);
        match pattern {
            LikePattern::MatchAll | LikePattern::Complex { .. } => total,
            LikePattern::Exact(exact) => self.point_estimate(exact, measure),
            LikePattern::Prefix {
                prefix,
                upper: Some(upper),
            } => {
                let estimate =
                    self.cumulative_below(upper, measure) - self.cumulative_below(prefix, measure);
                estimate.max(0.0)
            }
            LikePattern::Prefix {
                prefix,
                upper: None,
            } => total - self.cumulative_below(prefix, measure),
        }
    }

    fn measure_total(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Rows => self.layout.total_count(),
            Measure::DistinctValues => self.layout.total_distinct_count(),
        }
    }

    fn measure_bin(&self, bin: usize, measure: Measure) -> f64 {
        match measure {
            Measure::Rows => self.layout.bin_height(bin),
            Measure::DistinctValues => self.layout.bin_distinct_count(bin),
        }
    }

    /// Rows (or distinct values) equal to a canonical `value`, assuming every
    /// distinct value of a bin occurs equally often.
    fn point_estimate(&self, value: &D::Value, measure: Measure) -> f64 {
        let Some(bin) = self.layout.bin_for_value(value) else {
            return 0.0;
        };
        let distinct = self.layout.bin_distinct_count(bin);
        if distinct <= 0.0 {
            return 0.0;
        }
        match measure {
            Measure::Rows => self.layout.bin_height(bin) / distinct,
            Measure::DistinctValues => 1.0,
        }
    }

    /// Rows (or distinct values) strictly below a canonical `value`.
    pub(crate) fn cumulative_below(&self, value: &D::Value, measure: Measure) -> f64 {
        let total = self.measure_total(measure);
        if *value <= *self.min() {
            return 0.0;
        }
        if *value > *self.max() {
            return total;
        }
        let (index, partial) = match self.layout.bin_for_value(value) {
            Some(bin) => (bin, self.bin_share(bin, value) * self.measure_bin(bin, measure)),
            None => match self.layout.next_bin_for_value(value) {
                Some(next) => (next, 0.0),
                None => return total,
            },
        };
        let below: f64 = (0..index).map(|bin| self.measure_bin(bin, measure)).sum();
        (below + partial).min(total)
    }

    /// Rows (or distinct values) at or below a canonical `value`.
    pub(crate) fn cumulative_through(&self, value: &D::Value, measure: Measure) -> f64 {
        let next = self.domain.successor(value);
        if next.partial_cmp(value) == Some(Ordering::Greater) {
            self.cumulative_below(&next, measure)
        } else {
            // the domain saturated; nothing lies above `value`
            self.measure_total(measure)
        }
    }

    /// Fraction of bin `bin` that lies strictly below `value`.
    pub(crate) fn bin_share(&self, bin: usize, value: &D::Value) -> f64 {
        let min = self.layout.bin_min(bin);
        let max = self.layout.bin_max(bin);
        let width = self.domain.bin_width(min, max);
        if width <= 0.0 {
            return 0.0;
        }
        (self.domain.distance(min, value) / width).clamp(0.0, 1.0)
    }
}

/// Quantity an estimate is computed for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Measure {
    Rows,
    DistinctValues,
}
