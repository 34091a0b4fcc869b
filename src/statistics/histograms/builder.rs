//! Partitioning sorted value counts into bins.
#![forbid(unsafe_code)]

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::OrderedDomain;
use super::layout::{
    BinLayout, EqualDistinctCountBins, EqualHeightBins, EqualWidthBins, GenericBins,
};
use crate::types::{Result, StatsError};

/// Data-driven partitioning strategies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStrategy {
    /// Split the value span into equally wide ranges.
    EqualWidth,
    /// Close a bin once it holds `ceil(total / bins)` rows.
    EqualHeight,
    /// Give every bin the same number of distinct values.
    EqualDistinctCount,
}

impl BinStrategy {
    /// All strategies.
    pub const ALL: [BinStrategy; 3] = [
        BinStrategy::EqualWidth,
        BinStrategy::EqualHeight,
        BinStrategy::EqualDistinctCount,
    ];
}

/// Builds the layout for `strategy` from `(value, count)` pairs sorted by value.
pub(crate) fn build_layout<D: OrderedDomain>(
    domain: &D,
    value_counts: &[(D::Value, u64)],
    strategy: BinStrategy,
    max_bin_count: usize,
) -> Result<BinLayout<D::Value>> {
    if max_bin_count == 0 {
        return Err(StatsError::InvalidArgument("bin count must be positive"));
    }
    let counts = canonical_value_counts(domain, value_counts)?;
    let layout = match strategy {
        BinStrategy::EqualWidth => equal_width(domain, &counts, max_bin_count),
        BinStrategy::EqualHeight => equal_height(domain, &counts, max_bin_count),
        BinStrategy::EqualDistinctCount => equal_distinct_count(&counts, max_bin_count),
    };
    debug!(
        ?strategy,
        requested = max_bin_count,
        actual = layout.bin_count(),
        distinct = counts.len(),
        "histogram.build"
    );
    Ok(layout)
}

/// Validates the input order and folds values that share a canonical form.
fn canonical_value_counts<D: OrderedDomain>(
    domain: &D,
    value_counts: &[(D::Value, u64)],
) -> Result<Vec<(D::Value, u64)>> {
    let mut folded: Vec<(D::Value, u64)> = Vec::with_capacity(value_counts.len());
    let mut previous: Option<&D::Value> = None;
    for (value, count) in value_counts {
        domain.check_value(value, false)?;
        if let Some(previous) = previous {
            if previous.partial_cmp(value) != Some(Ordering::Less) {
                return Err(StatsError::InvalidArgument(
                    "value counts must be sorted ascending without duplicates",
                ));
            }
        }
        previous = Some(value);
        if *count == 0 {
            continue;
        }
        let canonical = domain.canonicalize(value);
        match folded.last_mut() {
            Some((last, total)) if *last == canonical => *total += count,
            _ => folded.push((canonical, *count)),
        }
    }
    if folded.is_empty() {
        return Err(StatsError::EmptyDistribution);
    }
    Ok(folded)
}

fn equal_width<D: OrderedDomain>(
    domain: &D,
    counts: &[(D::Value, u64)],
    max_bin_count: usize,
) -> BinLayout<D::Value> {
    let min = &counts[0].0;
    let max = &counts[counts.len() - 1].0;
    let (minima, bins_with_larger_range) = domain.equal_width_minima(min, max, max_bin_count);
    let bin_count = minima.len();
    let maxima: Vec<D::Value> = (0..bin_count)
        .map(|bin| match minima.get(bin + 1) {
            Some(next_min) => domain.predecessor(next_min),
            None => max.clone(),
        })
        .collect();

    let mut heights = vec![0u64; bin_count];
    let mut distinct_counts = vec![0u64; bin_count];
    let mut bin = 0;
    for (value, count) in counts {
        while bin + 1 < bin_count && *value >= minima[bin + 1] {
            bin += 1;
        }
        heights[bin] += count;
        distinct_counts[bin] += 1;
    }

    BinLayout::EqualWidth(EqualWidthBins {
        minima,
        maxima,
        heights,
        distinct_counts,
        bins_with_larger_range,
    })
}

fn equal_height<D: OrderedDomain>(
    domain: &D,
    counts: &[(D::Value, u64)],
    max_bin_count: usize,
) -> BinLayout<D::Value> {
    let total_count: u64 = counts.iter().map(|(_, count)| count).sum();
    let bin_count = max_bin_count.min(counts.len()) as u64;
    let count_per_bin = total_count.div_ceil(bin_count);

    let mut maxima = Vec::with_capacity(bin_count as usize);
    let mut distinct_counts = Vec::with_capacity(bin_count as usize);
    let mut running_height = 0u64;
    let mut running_distinct = 0u64;
    for (value, count) in counts {
        running_height += count;
        running_distinct += 1;
        if running_height >= count_per_bin {
            maxima.push(value.clone());
            distinct_counts.push(running_distinct);
            running_height = 0;
            running_distinct = 0;
        }
    }
    if running_distinct > 0 {
        maxima.push(counts[counts.len() - 1].0.clone());
        distinct_counts.push(running_distinct);
    }

    let mut minima = Vec::with_capacity(maxima.len());
    minima.push(counts[0].0.clone());
    for previous_max in &maxima[..maxima.len() - 1] {
        minima.push(domain.successor(previous_max));
    }

    BinLayout::EqualHeight(EqualHeightBins {
        minima,
        maxima,
        distinct_counts,
        total_count,
    })
}

fn equal_distinct_count<V: Clone>(counts: &[(V, u64)], max_bin_count: usize) -> BinLayout<V> {
    let distinct = counts.len();
    let bin_count = max_bin_count.min(distinct);
    let per_bin = distinct / bin_count;
    let bins_with_extra_value = distinct % bin_count;

    let mut minima = Vec::with_capacity(bin_count);
    let mut maxima = Vec::with_capacity(bin_count);
    let mut heights = Vec::with_capacity(bin_count);
    let mut start = 0;
    for bin in 0..bin_count {
        let size = per_bin + usize::from(bin < bins_with_extra_value);
        let members = &counts[start..start + size];
        minima.push(members[0].0.clone());
        maxima.push(members[size - 1].0.clone());
        heights.push(members.iter().map(|(_, count)| count).sum());
        start += size;
    }

    BinLayout::EqualDistinctCount(EqualDistinctCountBins {
        minima,
        maxima,
        heights,
        distinct_count_per_bin: per_bin as u64,
        bins_with_extra_value,
    })
}

/// Validates explicit bins for a generic layout.
pub(crate) fn generic_layout<D: OrderedDomain>(
    domain: &D,
    minima: Vec<D::Value>,
    maxima: Vec<D::Value>,
    heights: Vec<f64>,
    distinct_counts: Vec<f64>,
) -> Result<BinLayout<D::Value>> {
    let bin_count = minima.len();
    if bin_count == 0 {
        return Err(StatsError::EmptyDistribution);
    }
    if maxima.len() != bin_count || heights.len() != bin_count || distinct_counts.len() != bin_count
    {
        return Err(StatsError::InvalidArgument(
            "generic bins need equally long minima, maxima, heights and distinct counts",
        ));
    }
    for bin in 0..bin_count {
        domain.check_value(&minima[bin], false)?;
        domain.check_value(&maxima[bin], false)?;
        if minima[bin].partial_cmp(&maxima[bin]).map_or(true, Ordering::is_gt) {
            return Err(StatsError::InvalidArgument("bin minimum exceeds its maximum"));
        }
        if bin > 0 && maxima[bin - 1].partial_cmp(&minima[bin]) != Some(Ordering::Less) {
            return Err(StatsError::InvalidArgument(
                "bins must be ascending and non-overlapping",
            ));
        }
        if heights[bin].is_nan()
            || distinct_counts[bin].is_nan()
            || heights[bin] < 0.0
            || distinct_counts[bin] < 0.0
        {
            return Err(StatsError::InvalidArgument("bin counts must be non-negative"));
        }
    }
    Ok(BinLayout::Generic(GenericBins {
        minima,
        maxima,
        heights,
        distinct_counts,
    }))
}
