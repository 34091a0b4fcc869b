//! Column statistics and cardinality estimation.
#![forbid(unsafe_code)]

/// Type-erased column histograms and table statistics.
pub mod column;
/// Statistics propagation through plan nodes.
pub mod estimator;
/// Histogram construction and estimation.
pub mod histograms;
/// Histogram and cache configuration.
pub mod options;

pub use column::{ColumnHistogram, ColumnId, ColumnStatistics, FromLiteral, Literal, TableStatistics};
pub use estimator::{CardinalityEstimator, InMemoryStatistics, PlanNode, StatisticsProvider};
pub use histograms::{
    BinLayout, BinStrategy, Histogram, HistogramType, LikePattern, NumericDomain, OrderedDomain,
    StringDomain,
};
pub use options::{default_config_path, CacheOptions, HistogramOptions, StatisticsConfig};
