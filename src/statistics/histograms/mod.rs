//! Column histograms.
//!
//! A histogram partitions the sorted distinct values of a column into bins and
//! records per-bin row and distinct-value counts. The bins are produced by one
//! of the [`BinStrategy`] builders; every resulting [`Histogram`] answers the
//! same pruning and estimation queries.
#![forbid(unsafe_code)]

/// Bin construction strategies.
pub mod builder;
/// Ordered value domains and `LIKE` pattern shapes.
pub mod domain;
/// Human readable and CSV renderings of bins.
pub mod export;
/// Pruning and estimation over bins.
pub mod histogram;
/// Per-strategy bin storage.
pub mod layout;
/// Deriving narrower histograms from predicates.
pub mod slicing;
/// Bounded-prefix string encoding.
pub mod string_domain;

pub use builder::BinStrategy;
pub use domain::{LikePattern, NumericDomain, OrderedDomain};
pub use histogram::Histogram;
pub use layout::{
    BinLayout, EqualDistinctCountBins, EqualHeightBins, EqualWidthBins, GenericBins,
    HistogramType,
};
pub use string_domain::StringDomain;
