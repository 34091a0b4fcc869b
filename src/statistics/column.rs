//! Column-level statistics over type-erased histograms.
#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use super::histograms::{BinStrategy, Histogram, HistogramType, NumericDomain, StringDomain};
use super::options::HistogramOptions;
use crate::types::{PredicateCondition, Result, StatsError};

/// Predicate operand for any supported column type.
#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Text.
    String(String),
}

impl Literal {
    /// Name of the literal's type, matching the domain type names.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Int32(_) => "int32",
            Literal::Int64(_) => "int64",
            Literal::Float32(_) => "float32",
            Literal::Float64(_) => "float64",
            Literal::String(_) => "string",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int32(value) => write!(f, "{value}"),
            Literal::Int64(value) => write!(f, "{value}"),
            Literal::Float32(value) => write!(f, "{value}"),
            Literal::Float64(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "'{value}'"),
        }
    }
}

macro_rules! literal_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Literal::$variant(value)
                }
            }

            impl FromLiteral for $ty {
                fn from_literal(literal: &Literal) -> Option<&Self> {
                    match literal {
                        Literal::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Extraction of a typed value from a [`Literal`].
pub trait FromLiteral: Sized {
    /// Borrow the value when the literal has this type.
    fn from_literal(literal: &Literal) -> Option<&Self>;
}

literal_conversions! {
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_owned())
    }
}

/// Histogram of a column of any supported type.
#[derive(Clone, Debug)]
pub enum ColumnHistogram {
    /// `i32` column.
    Int32(Histogram<NumericDomain<i32>>),
    /// `i64` column.
    Int64(Histogram<NumericDomain<i64>>),
    /// `f32` column.
    Float32(Histogram<NumericDomain<f32>>),
    /// `f64` column.
    Float64(Histogram<NumericDomain<f64>>),
    /// String column.
    String(Histogram<StringDomain>),
}

macro_rules! dispatch {
    ($self:expr, $hist:ident => $body:expr) => {
        match $self {
            ColumnHistogram::Int32($hist) => $body,
            ColumnHistogram::Int64($hist) => $body,
            ColumnHistogram::Float32($hist) => $body,
            ColumnHistogram::Float64($hist) => $body,
            ColumnHistogram::String($hist) => $body,
        }
    };
}

macro_rules! dispatch_map {
    ($self:expr, $hist:ident => $body:expr) => {
        match $self {
            ColumnHistogram::Int32($hist) => ColumnHistogram::Int32($body),
            ColumnHistogram::Int64($hist) => ColumnHistogram::Int64($body),
            ColumnHistogram::Float32($hist) => ColumnHistogram::Float32($body),
            ColumnHistogram::Float64($hist) => ColumnHistogram::Float64($body),
            ColumnHistogram::String($hist) => ColumnHistogram::String($body),
        }
    };
}

fn typed<'a, T: FromLiteral>(expected: &'static str, literal: &'a Literal) -> Result<&'a T> {
    T::from_literal(literal).ok_or(StatsError::TypeMismatch {
        expected,
        found: literal.type_name(),
    })
}

fn typed_pair<'a, T: FromLiteral>(
    expected: &'static str,
    value: &'a Literal,
    value2: Option<&'a Literal>,
) -> Result<(&'a T, Option<&'a T>)> {
    let value = typed(expected, value)?;
    let value2 = value2.map(|literal| typed(expected, literal)).transpose()?;
    Ok((value, value2))
}

fn typed_counts<T: FromLiteral + Clone>(
    expected: &'static str,
    value_counts: &[(Literal, u64)],
) -> Result<Vec<(T, u64)>> {
    value_counts
        .iter()
        .map(|(literal, count)| Ok((typed::<T>(expected, literal)?.clone(), *count)))
        .collect()
}

impl ColumnHistogram {
    /// Builds a histogram for a column whose values are all of one literal
    /// type. String columns use the domain described by `options`.
    pub fn build(
        strategy: BinStrategy,
        value_counts: &[(Literal, u64)],
        max_bin_count: usize,
        options: &HistogramOptions,
    ) -> Result<Self> {
        let Some((first, _)) = value_counts.first() else {
            return Err(StatsError::EmptyDistribution);
        };
        let expected = first.type_name();
        let histogram = match first {
            Literal::Int32(_) => ColumnHistogram::Int32(Histogram::from_value_counts(
                NumericDomain::new(),
                &typed_counts(expected, value_counts)?,
                strategy,
                max_bin_count,
            )?),
            Literal::Int64(_) => ColumnHistogram::Int64(Histogram::from_value_counts(
                NumericDomain::new(),
                &typed_counts(expected, value_counts)?,
                strategy,
                max_bin_count,
            )?),
            Literal::Float32(_) => ColumnHistogram::Float32(Histogram::from_value_counts(
                NumericDomain::new(),
                &typed_counts(expected, value_counts)?,
                strategy,
                max_bin_count,
            )?),
            Literal::Float64(_) => ColumnHistogram::Float64(Histogram::from_value_counts(
                NumericDomain::new(),
                &typed_counts(expected, value_counts)?,
                strategy,
                max_bin_count,
            )?),
            Literal::String(_) => ColumnHistogram::String(Histogram::from_value_counts(
                StringDomain::from_options(options)?,
                &typed_counts(expected, value_counts)?,
                strategy,
                max_bin_count,
            )?),
        };
        Ok(histogram)
    }

    /// Name of the column type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnHistogram::Int32(_) => "int32",
            ColumnHistogram::Int64(_) => "int64",
            ColumnHistogram::Float32(_) => "float32",
            ColumnHistogram::Float64(_) => "float64",
            ColumnHistogram::String(_) => "string",
        }
    }

    /// Strategy of the wrapped histogram.
    pub fn histogram_type(&self) -> HistogramType {
        dispatch!(self, hist => hist.histogram_type())
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        dispatch!(self, hist => hist.bin_count())
    }

    /// Rows described by the histogram.
    pub fn total_count(&self) -> f32 {
        dispatch!(self, hist => hist.total_count())
    }

    /// Distinct values described by the histogram.
    pub fn total_distinct_count(&self) -> f32 {
        dispatch!(self, hist => hist.total_distinct_count())
    }

    /// See [`Histogram::can_prune`].
    pub fn can_prune(
        &self,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<bool> {
        let expected = self.type_name();
        dispatch!(self, hist => {
            let (value, value2) = typed_pair(expected, value, value2)?;
            hist.can_prune(condition, value, value2)
        })
    }

    /// See [`Histogram::estimate_cardinality`].
    pub fn estimate_cardinality(
        &self,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<f32> {
        let expected = self.type_name();
        dispatch!(self, hist => {
            let (value, value2) = typed_pair(expected, value, value2)?;
            hist.estimate_cardinality(condition, value, value2)
        })
    }

    /// See [`Histogram::estimate_selectivity`].
    pub fn estimate_selectivity(
        &self,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<f32> {
        let expected = self.type_name();
        dispatch!(self, hist => {
            let (value, value2) = typed_pair(expected, value, value2)?;
            hist.estimate_selectivity(condition, value, value2)
        })
    }

    /// See [`Histogram::estimate_distinct_count`].
    pub fn estimate_distinct_count(
        &self,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<f32> {
        let expected = self.type_name();
        dispatch!(self, hist => {
            let (value, value2) = typed_pair(expected, value, value2)?;
            hist.estimate_distinct_count(condition, value, value2)
        })
    }

    /// See [`Histogram::slice_with_predicate`].
    pub fn slice_with_predicate(
        &self,
        condition: PredicateCondition,
        value: &Literal,
        value2: Option<&Literal>,
    ) -> Result<Option<ColumnHistogram>> {
        let expected = self.type_name();
        let sliced = match self {
            ColumnHistogram::Int32(hist) => {
                let (value, value2) = typed_pair(expected, value, value2)?;
                hist.slice_with_predicate(condition, value, value2)?
                    .map(ColumnHistogram::Int32)
            }
            ColumnHistogram::Int64(hist) => {
                let (value, value2) = typed_pair(expected, value, value2)?;
                hist.slice_with_predicate(condition, value, value2)?
                    .map(ColumnHistogram::Int64)
            }
            ColumnHistogram::Float32(hist) => {
                let (value, value2) = typed_pair(expected, value, value2)?;
                hist.slice_with_predicate(condition, value, value2)?
                    .map(ColumnHistogram::Float32)
            }
            ColumnHistogram::Float64(hist) => {
                let (value, value2) = typed_pair(expected, value, value2)?;
                hist.slice_with_predicate(condition, value, value2)?
                    .map(ColumnHistogram::Float64)
            }
            ColumnHistogram::String(hist) => {
                let (value, value2) = typed_pair(expected, value, value2)?;
                hist.slice_with_predicate(condition, value, value2)?
                    .map(ColumnHistogram::String)
            }
        };
        Ok(sliced)
    }

    /// See [`Histogram::scale_with_selectivity`].
    pub fn scale_with_selectivity(&self, selectivity: f32) -> ColumnHistogram {
        dispatch_map!(self, hist => hist.scale_with_selectivity(selectivity))
    }

    /// See [`Histogram::description`].
    pub fn description(&self) -> String {
        dispatch!(self, hist => hist.description())
    }

    /// See [`Histogram::bins_to_csv`].
    pub fn bins_to_csv<W: std::io::Write>(
        &self,
        writer: W,
        column_name: Option<&str>,
        requested_num_bins: Option<usize>,
    ) -> Result<()> {
        dispatch!(self, hist => hist.bins_to_csv(writer, column_name, requested_num_bins))
    }
}

/// Position of a column within its table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u16);

/// Statistics of one column.
#[derive(Clone, Debug, Default)]
pub struct ColumnStatistics {
    /// Histogram over the column's values, when one was collected.
    pub histogram: Option<ColumnHistogram>,
}

impl ColumnStatistics {
    /// Column statistics backed by `histogram`.
    pub fn with_histogram(histogram: ColumnHistogram) -> Self {
        Self {
            histogram: Some(histogram),
        }
    }
}

/// Statistics of a table or of an intermediate plan result.
#[derive(Clone, Debug, Default)]
pub struct TableStatistics {
    /// Estimated number of rows.
    pub row_count: f32,
    /// Per-column statistics, indexed by [`ColumnId`].
    pub columns: Vec<ColumnStatistics>,
}

impl TableStatistics {
    /// Creates table statistics.
    pub fn new(row_count: f32, columns: Vec<ColumnStatistics>) -> Self {
        Self { row_count, columns }
    }

    /// Statistics of `column`, if the table has that many columns.
    pub fn column(&self, column: ColumnId) -> Option<&ColumnStatistics> {
        self.columns.get(usize::from(column.0))
    }
}
