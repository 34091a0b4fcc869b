//! Histogram-based cardinality estimation for query optimizers.
//!
//! [`statistics`] builds per-column histograms over numeric and string
//! domains and answers selectivity, cardinality, distinct-count and pruning
//! questions for single-column predicates. [`cache`] memoizes cardinalities of
//! join graphs under a normalized key and shares them between processes
//! through a locked JSON file.

#![warn(missing_docs)]

pub mod cache;
pub mod cli;
pub mod primitives;
pub mod statistics;
pub mod types;
