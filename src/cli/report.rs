use serde::Serialize;

use crate::cache::CardinalityEstimationCache;
use crate::statistics::{ColumnHistogram, Literal};
use crate::types::{PredicateCondition, Result};

/// Estimates for one predicate against one column histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateReport {
    /// Column type name, e.g. `int32`.
    pub column_type: &'static str,
    /// Predicate condition.
    pub condition: PredicateCondition,
    /// Predicate value or LIKE pattern.
    pub value: Literal,
    /// Upper bound for BETWEEN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<Literal>,
    /// Rows in the histogram.
    pub total_count: f32,
    /// Estimated matching rows.
    pub cardinality: f32,
    /// Estimated matching fraction.
    pub selectivity: f32,
    /// Estimated distinct values among matching rows.
    pub distinct_count: f32,
    /// Whether the predicate provably matches nothing.
    pub prunable: bool,
}

impl EstimateReport {
    /// Runs every estimate for the predicate.
    pub fn compute(
        histogram: &ColumnHistogram,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<Self> {
        Ok(Self {
            column_type: histogram.type_name(),
            condition,
            value: value.clone(),
            value2: value2.cloned(),
            total_count: histogram.total_count(),
            cardinality: histogram.estimate_cardinality(condition, value, value2)?,
            selectivity: histogram.estimate_selectivity(condition, value, value2)?,
            distinct_count: histogram.estimate_distinct_count(condition, value, value2)?,
            prunable: histogram.can_prune(condition, value, value2)?,
        })
    }

    /// Predicate in SQL-like notation, e.g. `x BETWEEN 1 AND 5`.
    pub fn predicate(&self) -> String {
        match &self.value2 {
            Some(upper) => format!("x {} {} AND {}", self.condition, self.value, upper),
            None => format!("x {} {}", self.condition, self.value),
        }
    }
}

/// Summary of a persisted cardinality cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    /// Distinct join graphs in the cache.
    pub entries: usize,
    /// Entries with a recorded cardinality.
    pub with_cardinality: usize,
    /// Entries that were requested but never resolved.
    pub without_cardinality: usize,
    /// Entries whose estimation hit a timeout.
    pub with_timeout: usize,
}

impl CacheReport {
    /// Counts the entries of `cache`.
    pub fn from_cache(cache: &CardinalityEstimationCache) -> Self {
        let mut report = CacheReport {
            entries: cache.size(),
            ..CacheReport::default()
        };
        for (_, entry) in cache.iter() {
            if entry.cardinality.is_some() {
                report.with_cardinality += 1;
            } else {
                report.without_cardinality += 1;
            }
            if entry.timeout.is_some() {
                report.with_timeout += 1;
            }
        }
        report
    }
}
