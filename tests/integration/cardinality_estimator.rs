#![allow(missing_docs)]

use std::fs;
use std::sync::Arc;

use cardest::statistics::{
    BinStrategy, CardinalityEstimator, ColumnHistogram, ColumnId, ColumnStatistics,
    HistogramOptions, HistogramType, InMemoryStatistics, Literal, PlanNode, StatisticsConfig,
    TableStatistics,
};
use cardest::types::{PredicateCondition, StatsError};
use tempfile::TempDir;

fn int_counts(rows: &[(i32, u64)]) -> Vec<(Literal, u64)> {
    rows.iter().map(|&(value, count)| (Literal::Int32(value), count)).collect()
}

fn string_counts(rows: &[(&str, u64)]) -> Vec<(Literal, u64)> {
    rows.iter()
        .map(|&(value, count)| (Literal::from(value), count))
        .collect()
}

/// 100 rows: `a` uniform over 1..=10, `b` over four floats, `name` over
/// four strings, `note` without statistics.
fn orders() -> TableStatistics {
    let options = HistogramOptions::default();
    let a: Vec<(i32, u64)> = (1..=10).map(|value| (value, 10)).collect();
    let b: Vec<(Literal, u64)> = [0.5f64, 1.5, 2.5, 3.5]
        .iter()
        .map(|&value| (Literal::Float64(value), 25))
        .collect();
    let name = string_counts(&[("anna", 40), ("bert", 20), ("carl", 20), ("dora", 20)]);
    TableStatistics::new(
        100.0,
        vec![
            ColumnStatistics::with_histogram(
                ColumnHistogram::build(BinStrategy::EqualWidth, &int_counts(&a), 10, &options)
                    .unwrap(),
            ),
            ColumnStatistics::with_histogram(
                ColumnHistogram::build(BinStrategy::EqualDistinctCount, &b, 2, &options).unwrap(),
            ),
            ColumnStatistics::with_histogram(
                ColumnHistogram::build(BinStrategy::EqualDistinctCount, &name, 4, &options)
                    .unwrap(),
            ),
            ColumnStatistics::default(),
        ],
    )
}

fn estimator() -> CardinalityEstimator {
    let provider = InMemoryStatistics::new();
    provider.insert("orders", orders());
    CardinalityEstimator::new(Arc::new(provider))
}

fn orders_scan() -> PlanNode {
    PlanNode::StoredTable {
        name: "orders".into(),
    }
}

#[test]
fn chained_predicates_multiply_selectivities() {
    let estimator = estimator();
    let plan = orders_scan()
        .filter(ColumnId(0), PredicateCondition::LessThanEquals, 5i32)
        .filter(ColumnId(2), PredicateCondition::Equals, "anna");
    // half of the rows survive the first filter, and 'anna' keeps its 40% share
    let cardinality = estimator.estimate_cardinality(&plan).unwrap();
    assert!((cardinality - 20.0).abs() < 1e-3, "{cardinality}");
}

#[test]
fn between_on_float_column() {
    let estimator = estimator();
    let plan = orders_scan().between(ColumnId(1), 0.5f64, 1.5f64);
    let statistics = estimator.estimate_statistics(&plan).unwrap();
    assert!((statistics.row_count - 50.0).abs() < 1e-3);
    let sliced = statistics.columns[1].histogram.as_ref().unwrap();
    assert_eq!(sliced.histogram_type(), HistogramType::Generic);
    let scaled = statistics.columns[0].histogram.as_ref().unwrap();
    assert!((scaled.total_count() - 50.0).abs() < 1e-3);
}

#[test]
fn like_filter_on_string_column() {
    let estimator = estimator();
    let plan = orders_scan().filter(ColumnId(2), PredicateCondition::Like, "b%");
    assert!((estimator.estimate_cardinality(&plan).unwrap() - 20.0).abs() < 1e-3);
    let not_like = orders_scan().filter(ColumnId(2), PredicateCondition::NotLike, "b%");
    assert!((estimator.estimate_cardinality(&not_like).unwrap() - 80.0).abs() < 1e-3);
}

#[test]
fn literal_type_must_match_column() {
    let estimator = estimator();
    let plan = orders_scan().filter(ColumnId(0), PredicateCondition::Equals, "five");
    match estimator.estimate_cardinality(&plan) {
        Err(StatsError::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "int32");
            assert_eq!(found, "string");
        }
        other => panic!("unexpected {other:?}"),
    }
    let like_on_ints = orders_scan().filter(ColumnId(0), PredicateCondition::Like, 1i32);
    assert_eq!(
        estimator.estimate_cardinality(&like_on_ints).unwrap_err().code(),
        "UnsupportedPredicate"
    );
}

#[test]
fn inline_statistics_and_provider_updates() {
    let provider = Arc::new(InMemoryStatistics::new());
    let estimator = CardinalityEstimator::new(provider.clone());
    let inline = PlanNode::Statistics(Arc::new(orders()))
        .filter(ColumnId(3), PredicateCondition::Equals, 1i32);
    assert_eq!(estimator.estimate_cardinality(&inline).unwrap(), 100.0);

    assert!(estimator.estimate_cardinality(&orders_scan()).is_err());
    provider.insert("orders", orders());
    assert_eq!(estimator.estimate_cardinality(&orders_scan()).unwrap(), 100.0);
    assert!(provider.remove("orders"));
    assert!(!provider.remove("orders"));
}

#[test]
fn histogram_options_come_from_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[histograms]\nstrategy = \"equal_width\"\nbin_count = 3\nalphabet = \"abcdefghijklmnopqrstuvwxyz\"\nprefix_length = 4\n",
    )
    .unwrap();
    let config = StatisticsConfig::load_or_default(Some(&path)).unwrap();
    let options = &config.histograms;
    let hist = ColumnHistogram::build(
        options.strategy,
        &string_counts(&[("apple", 1), ("melon", 1), ("zebra", 1)]),
        options.bin_count,
        options,
    )
    .unwrap();
    assert_eq!(hist.histogram_type(), HistogramType::EqualWidth);
    assert_eq!(hist.bin_count(), 3);
    assert!(hist
        .estimate_cardinality(PredicateCondition::Equals, &Literal::from("Apple"), None)
        .is_err());

    let missing = StatisticsConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(missing.code(), "Config");
}

#[test]
fn empty_and_mixed_distributions_are_rejected() {
    let options = HistogramOptions::default();
    let empty = ColumnHistogram::build(BinStrategy::EqualHeight, &[], 4, &options).unwrap_err();
    assert!(matches!(empty, StatsError::EmptyDistribution));
    let mixed = vec![(Literal::Int32(1), 1), (Literal::Int64(2), 1)];
    let err = ColumnHistogram::build(BinStrategy::EqualHeight, &mixed, 4, &options).unwrap_err();
    assert_eq!(err.code(), "TypeMismatch");
}
