//! Command-line support: loading value distributions from CSV and shaping
//! the reports the `cardest` binary prints.
#![forbid(unsafe_code)]

/// Reports printed by the `estimate` and `cache stats` commands.
pub mod report;

/// Value/count table loading.
///
/// Reads `value,count` CSV tables (or bare value lists) into the sorted,
/// duplicate-free distributions histogram construction expects.
pub mod value_counts;

pub use report::{CacheReport, EstimateReport};
pub use value_counts::{read_value_counts, read_value_counts_from_path, ColumnType, ParseLiteralError};
