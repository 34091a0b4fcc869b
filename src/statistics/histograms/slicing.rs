//! Narrowing a histogram to the rows a predicate keeps.
//!
//! Sliced histograms are always generic: their bins are clipped copies of the
//! source bins with proportionally reduced counts.
#![forbid(unsafe_code)]

use std::cmp::Ordering;

use tracing::trace;

use super::domain::{LikePattern, OrderedDomain};
use super::histogram::Histogram;
use super::layout::{BinLayout, GenericBins};
use crate::types::{PredicateCondition, Result};

impl<D: OrderedDomain> Histogram<D> {
    /// Histogram of the rows that satisfy the predicate.
    ///
    /// Returns `None` when the predicate provably removes every row.
    pub fn slice_with_predicate(
        &self,
        condition: PredicateCondition,
        value: &D::Value,
        value2: Option<&D::Value>,
    ) -> Result<Option<Histogram<D>>> {
        let value2 = self.check_arguments(condition, value, value2)?;
        if self.prunes(condition, value, value2)? {
            trace!(%condition, "histogram.slice.pruned");
            return Ok(None);
        }
        let domain = self.domain();
        let canonical = domain.canonicalize(value);
        let sliced = match condition {
            PredicateCondition::Equals => self.slice_point(&canonical),
            PredicateCondition::NotEquals => self.slice_without(&canonical),
            PredicateCondition::LessThan => {
                self.slice_range(None, Some(&domain.predecessor(&canonical)))
            }
            PredicateCondition::LessThanEquals => self.slice_range(None, Some(&canonical)),
            PredicateCondition::GreaterThan => {
                let lower = domain.successor(&canonical);
                if lower.partial_cmp(&canonical) == Some(Ordering::Greater) {
                    self.slice_range(Some(&lower), None)
                } else {
                    None
                }
            }
            PredicateCondition::GreaterThanEquals => self.slice_range(Some(&canonical), None),
            PredicateCondition::Between => match value2 {
                Some(upper) => {
                    let upper = domain.canonicalize(upper);
                    self.slice_range(Some(&canonical), Some(&upper))
                }
                None => None,
            },
            PredicateCondition::Like => match self.pattern(condition, value)? {
                LikePattern::MatchAll => Some(self.to_generic()),
                LikePattern::Exact(exact) => self.slice_point(&domain.canonicalize(&exact)),
                LikePattern::Prefix {
                    prefix,
                    upper: Some(upper),
                } => self.slice_range(Some(&prefix), Some(&domain.predecessor(&upper))),
                LikePattern::Prefix {
                    prefix,
                    upper: None,
                } => self.slice_range(Some(&prefix), None),
                LikePattern::Complex { .. } => Some(self.to_generic()),
            },
            PredicateCondition::NotLike => {
                let selectivity = self.estimate_selectivity(condition, value, value2)?;
                Some(self.scale_with_selectivity(selectivity))
            }
        };
        Ok(sliced)
    }

    /// Copy with every bin height scaled by `selectivity`.
    ///
    /// Distinct counts never exceed the scaled heights.
    pub fn scale_with_selectivity(&self, selectivity: f32) -> Histogram<D> {
        let selectivity = f64::from(selectivity).clamp(0.0, 1.0);
        let layout = self.layout();
        let mut bins = empty_bins(layout.bin_count());
        for bin in 0..layout.bin_count() {
            let height = layout.bin_height(bin) * selectivity;
            push_bin(
                &mut bins,
                layout.bin_min(bin).clone(),
                layout.bin_max(bin).clone(),
                height,
                layout.bin_distinct_count(bin).min(height),
            );
        }
        Histogram::from_layout(self.domain().clone(), BinLayout::Generic(bins))
    }

    /// Same bins, stored explicitly.
    pub fn to_generic(&self) -> Histogram<D> {
        let layout = self.layout();
        let bins = GenericBins {
            minima: (0..layout.bin_count())
                .map(|bin| layout.bin_min(bin).clone())
                .collect(),
            maxima: (0..layout.bin_count())
                .map(|bin| layout.bin_max(bin).clone())
                .collect(),
            heights: (0..layout.bin_count())
                .map(|bin| layout.bin_height(bin))
                .collect(),
            distinct_counts: (0..layout.bin_count())
                .map(|bin| layout.bin_distinct_count(bin))
                .collect(),
        };
        Histogram::from_layout(self.domain().clone(), BinLayout::Generic(bins))
    }

    fn slice_point(&self, value: &D::Value) -> Option<Histogram<D>> {
        let bin = self.layout().bin_for_value(value)?;
        let distinct = self.layout().bin_distinct_count(bin);
        if distinct <= 0.0 {
            return None;
        }
        let height = self.layout().bin_height(bin) / distinct;
        let bins = GenericBins {
            minima: vec![value.clone()],
            maxima: vec![value.clone()],
            heights: vec![height],
            distinct_counts: vec![1.0],
        };
        Some(Histogram::from_layout(
            self.domain().clone(),
            BinLayout::Generic(bins),
        ))
    }

    fn slice_without(&self, value: &D::Value) -> Option<Histogram<D>> {
        let layout = self.layout();
        let excluded = layout.bin_for_value(value);
        let mut bins = empty_bins(layout.bin_count());
        for bin in 0..layout.bin_count() {
            let mut height = layout.bin_height(bin);
            let mut distinct = layout.bin_distinct_count(bin);
            if excluded == Some(bin) && distinct > 0.0 {
                height -= height / distinct;
                distinct -= 1.0;
                let collapsed = *layout.bin_min(bin) == *value && *layout.bin_max(bin) == *value;
                if collapsed || distinct <= 0.0 || height <= 0.0 {
                    continue;
                }
            }
            push_bin(
                &mut bins,
                layout.bin_min(bin).clone(),
                layout.bin_max(bin).clone(),
                height,
                distinct,
            );
        }
        self.finish(bins)
    }

    /// Clips the bins to the inclusive range `[lower, upper]`; a missing
    /// bound leaves that side open.
    fn slice_range(
        &self,
        lower: Option<&D::Value>,
        upper: Option<&D::Value>,
    ) -> Option<Histogram<D>> {
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if upper < lower {
                return None;
            }
        }
        let layout = self.layout();
        let domain = self.domain();
        let mut bins = empty_bins(layout.bin_count());
        for bin in 0..layout.bin_count() {
            let bin_min = layout.bin_min(bin);
            let bin_max = layout.bin_max(bin);
            if upper.is_some_and(|upper| upper < bin_min)
                || lower.is_some_and(|lower| lower > bin_max)
            {
                continue;
            }
            let new_min = match lower {
                Some(lower) if lower > bin_min => lower.clone(),
                _ => bin_min.clone(),
            };
            let new_max = match upper {
                Some(upper) if upper < bin_max => upper.clone(),
                _ => bin_max.clone(),
            };
            let below_max = if new_max == *bin_max {
                1.0
            } else {
                self.bin_share(bin, &domain.successor(&new_max))
            };
            let below_min = if new_min == *bin_min {
                0.0
            } else {
                self.bin_share(bin, &new_min)
            };
            let fraction = (below_max - below_min).clamp(0.0, 1.0);
            let height = layout.bin_height(bin) * fraction;
            if height <= 0.0 {
                continue;
            }
            let distinct = (layout.bin_distinct_count(bin) * fraction).min(height);
            push_bin(&mut bins, new_min, new_max, height, distinct);
        }
        self.finish(bins)
    }

    fn finish(&self, bins: GenericBins<D::Value>) -> Option<Histogram<D>> {
        if bins.minima.is_empty() {
            return None;
        }
        Some(Histogram::from_layout(
            self.domain().clone(),
            BinLayout::Generic(bins),
        ))
    }
}

fn empty_bins<V>(capacity: usize) -> GenericBins<V> {
    GenericBins {
        minima: Vec::with_capacity(capacity),
        maxima: Vec::with_capacity(capacity),
        heights: Vec::with_capacity(capacity),
        distinct_counts: Vec::with_capacity(capacity),
    }
}

fn push_bin<V>(bins: &mut GenericBins<V>, min: V, max: V, height: f64, distinct: f64) {
    bins.minima.push(min);
    bins.maxima.push(max);
    bins.heights.push(height);
    bins.distinct_counts.push(distinct);
}
