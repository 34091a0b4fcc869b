use std::cmp::Ordering;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::statistics::Literal;
use crate::types::{Result, StatsError};

/// Column type named on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit integers.
    Int32,
    /// 64-bit integers.
    Int64,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
    /// Text.
    String,
}

/// A raw value that does not parse as the requested column type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{raw}' is not a valid {expected} value")]
pub struct ParseLiteralError {
    raw: String,
    expected: &'static str,
}

impl ColumnType {
    /// Name matching [`Literal::type_name`].
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::String => "string",
        }
    }

    /// Parses `raw` as a literal of this type.
    ///
    /// Numbers tolerate surrounding whitespace; strings are taken verbatim.
    /// NaN is rejected since it has no place in a value ordering.
    pub fn parse_literal(self, raw: &str) -> std::result::Result<Literal, ParseLiteralError> {
        let trimmed = raw.trim();
        let parsed = match self {
            ColumnType::Int32 => trimmed.parse().ok().map(Literal::Int32),
            ColumnType::Int64 => trimmed.parse().ok().map(Literal::Int64),
            ColumnType::Float32 => trimmed
                .parse::<f32>()
                .ok()
                .filter(|value| !value.is_nan())
                .map(Literal::Float32),
            ColumnType::Float64 => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| !value.is_nan())
                .map(Literal::Float64),
            ColumnType::String => Some(Literal::String(raw.to_string())),
        };
        parsed.ok_or_else(|| ParseLiteralError {
            raw: raw.to_string(),
            expected: self.name(),
        })
    }
}

/// Reads a value distribution from the CSV file at `path`.
pub fn read_value_counts_from_path(
    path: &Path,
    column_type: ColumnType,
    value_column: Option<&str>,
) -> Result<Vec<(Literal, u64)>> {
    let file = File::open(path)?;
    read_value_counts(file, column_type, value_column)
}

/// Reads a value distribution from CSV.
///
/// The first row is a header. Values come from `value_column`, else from a
/// column named `value`, else from the first column. Counts come from a
/// column named `count` when present; otherwise every row counts once.
/// The result is sorted ascending with repeated values merged and zero counts
/// dropped.
pub fn read_value_counts<R: Read>(
    reader: R,
    column_type: ColumnType,
    value_column: Option<&str>,
) -> Result<Vec<(Literal, u64)>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let value_index = match value_column {
        Some(name) => find_column(&headers, name).ok_or_else(|| StatsError::InvalidInput {
            line: 1,
            message: format!("column '{name}' not found"),
        })?,
        None => find_column(&headers, "value").unwrap_or(0),
    };
    let count_index = find_column(&headers, "count").filter(|index| *index != value_index);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let raw = record.get(value_index).ok_or_else(|| StatsError::InvalidInput {
            line,
            message: "missing value".into(),
        })?;
        let value = column_type
            .parse_literal(raw)
            .map_err(|err| StatsError::InvalidInput {
                line,
                message: err.to_string(),
            })?;
        let count = match count_index {
            Some(index) => parse_count(record.get(index)).ok_or_else(|| StatsError::InvalidInput {
                line,
                message: "count must be a non-negative integer".into(),
            })?,
            None => 1,
        };
        rows.push((value, count));
    }

    let read = rows.len();
    let merged = merge_sorted(rows);
    debug!(rows = read, distinct = merged.len(), column_type = column_type.name(), "value_counts.read");
    Ok(merged)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw.map(str::trim).and_then(|raw| raw.parse().ok())
}

fn merge_sorted(mut rows: Vec<(Literal, u64)>) -> Vec<(Literal, u64)> {
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut merged: Vec<(Literal, u64)> = Vec::with_capacity(rows.len());
    for (value, count) in rows {
        if count == 0 {
            continue;
        }
        match merged.last_mut() {
            Some((last, total)) if *last == value => *total += count,
            _ => merged.push((value, count)),
        }
    }
    merged
}
