//! Propagating table statistics through a small plan vocabulary.
//!
//! The estimator walks a [`PlanNode`] tree bottom-up. Leaves resolve to
//! [`TableStatistics`], either directly or through a [`StatisticsProvider`];
//! predicate nodes slice the filtered column's histogram and scale every
//! other column by the resulting selectivity.
#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::column::{ColumnId, ColumnStatistics, Literal, TableStatistics};
use crate::types::{PredicateCondition, Result, StatsError};

/// Source of statistics for stored tables.
pub trait StatisticsProvider {
    /// Statistics for table `name`, or `None` when the table is unknown.
    fn table_statistics(&self, name: &str) -> Result<Option<Arc<TableStatistics>>>;
}

/// Provider holding statistics in memory, keyed by table name.
#[derive(Default)]
pub struct InMemoryStatistics {
    tables: RwLock<FxHashMap<String, Arc<TableStatistics>>>,
}

impl InMemoryStatistics {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the statistics of `name`.
    pub fn insert(&self, name: impl Into<String>, statistics: TableStatistics) {
        self.tables.write().insert(name.into(), Arc::new(statistics));
    }

    /// Drops the statistics of `name`, returning whether they existed.
    pub fn remove(&self, name: &str) -> bool {
        self.tables.write().remove(name).is_some()
    }
}

impl StatisticsProvider for InMemoryStatistics {
    fn table_statistics(&self, name: &str) -> Result<Option<Arc<TableStatistics>>> {
        Ok(self.tables.read().get(name).cloned())
    }
}

/// Plan operators the estimator understands.
#[derive(Clone, Debug)]
pub enum PlanNode {
    /// Precomputed statistics, e.g. of a mock table.
    Statistics(Arc<TableStatistics>),
    /// Table resolved through the [`StatisticsProvider`].
    StoredTable {
        /// Table name.
        name: String,
    },
    /// Filter on one column.
    Predicate {
        /// Filtered input.
        input: Box<PlanNode>,
        /// Column the predicate reads.
        column: ColumnId,
        /// Comparison.
        condition: PredicateCondition,
        /// First operand.
        value: Literal,
        /// Upper bound for `BETWEEN`.
        value2: Option<Literal>,
    },
    /// Column subset in the listed order.
    Projection {
        /// Projected input.
        input: Box<PlanNode>,
        /// Kept columns.
        columns: Vec<ColumnId>,
    },
}

impl PlanNode {
    /// Wraps `self` in a predicate node.
    pub fn filter(
        self,
        column: ColumnId,
        condition: PredicateCondition,
        value: impl Into<Literal>,
    ) -> PlanNode {
        PlanNode::Predicate {
            input: Box::new(self),
            column,
            condition,
            value: value.into(),
            value2: None,
        }
    }

    /// Wraps `self` in a `BETWEEN` predicate node.
    pub fn between(
        self,
        column: ColumnId,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> PlanNode {
        PlanNode::Predicate {
            input: Box::new(self),
            column,
            condition: PredicateCondition::Between,
            value: lower.into(),
            value2: Some(upper.into()),
        }
    }

    /// Wraps `self` in a projection.
    pub fn project(self, columns: Vec<ColumnId>) -> PlanNode {
        PlanNode::Projection {
            input: Box::new(self),
            columns,
        }
    }
}

/// Derives output statistics and row counts of plan nodes.
pub struct CardinalityEstimator {
    provider: Arc<dyn StatisticsProvider + Send + Sync>,
}

impl CardinalityEstimator {
    /// Creates an estimator resolving stored tables through `provider`.
    pub fn new(provider: Arc<dyn StatisticsProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Estimated number of output rows of `node`.
    pub fn estimate_cardinality(&self, node: &PlanNode) -> Result<f32> {
        Ok(self.estimate_statistics(node)?.row_count)
    }

    /// Estimated output statistics of `node`.
    pub fn estimate_statistics(&self, node: &PlanNode) -> Result<Arc<TableStatistics>> {
        match node {
            PlanNode::Statistics(statistics) => Ok(Arc::clone(statistics)),
            PlanNode::StoredTable { name } => self
                .provider
                .table_statistics(name)?
                .ok_or_else(|| StatsError::NotFound(format!("table '{name}'"))),
            PlanNode::Predicate {
                input,
                column,
                condition,
                value,
                value2,
            } => {
                let input = self.estimate_statistics(input)?;
                self.apply_predicate(input, *column, *condition, value, value2.as_ref())
            }
            PlanNode::Projection { input, columns } => {
                let input = self.estimate_statistics(input)?;
                let projected = columns
                    .iter()
                    .map(|column| column_statistics(&input, *column).cloned())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(TableStatistics::new(input.row_count, projected)))
            }
        }
    }

    fn apply_predicate(
        &self,
        input: Arc<TableStatistics>,
        column: ColumnId,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<Arc<TableStatistics>> {
        let Some(histogram) = &column_statistics(&input, column)?.histogram else {
            trace!(column = column.0, "estimator.predicate.no_histogram");
            return Ok(input);
        };
        let sliced = histogram.slice_with_predicate(condition, value, value2)?;
        let matching = sliced.as_ref().map_or(0.0, |hist| hist.total_count());
        let selectivity = if input.row_count > 0.0 {
            (matching / input.row_count).clamp(0.0, 1.0)
        } else {
            0.0
        };
        debug!(
            column = column.0,
            %condition,
            %value,
            selectivity,
            "estimator.predicate"
        );

        let mut sliced = Some(sliced);
        let columns = input
            .columns
            .iter()
            .enumerate()
            .map(|(index, statistics)| {
                if index == usize::from(column.0) {
                    ColumnStatistics {
                        histogram: sliced.take().flatten(),
                    }
                } else {
                    ColumnStatistics {
                        histogram: statistics
                            .histogram
                            .as_ref()
                            .map(|hist| hist.scale_with_selectivity(selectivity)),
                    }
                }
            })
            .collect();
        Ok(Arc::new(TableStatistics::new(
            input.row_count * selectivity,
            columns,
        )))
    }
}

fn column_statistics(table: &TableStatistics, column: ColumnId) -> Result<&ColumnStatistics> {
    table
        .column(column)
        .ok_or_else(|| StatsError::NotFound(format!("column {}", column.0)))
}
