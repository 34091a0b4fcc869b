#![allow(missing_docs)]

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use cardest::cache::{
    CardinalityEstimationCache, ColumnRef, JoinGraph, JoinPredicate, LogicalOperator, Operand,
    ScalarValue,
};
use cardest::statistics::CacheOptions;
use cardest::types::PredicateCondition;
use parking_lot::Mutex;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn col(relation: &str, column: &str) -> ColumnRef {
    ColumnRef::new(relation, column)
}

fn two_way(forward: bool) -> JoinGraph {
    let predicate = if forward {
        JoinPredicate::equi(col("A", "x"), col("B", "y"))
    } else {
        JoinPredicate::equi(col("B", "y"), col("A", "x"))
    };
    let vertices = if forward {
        vec!["A".to_string(), "B".to_string()]
    } else {
        vec!["B".to_string(), "A".to_string()]
    };
    JoinGraph::new(vertices, vec![predicate])
}

fn three_way(order: &[usize]) -> JoinGraph {
    let predicates = vec![
        JoinPredicate::equi(col("A", "x"), col("B", "y")),
        JoinPredicate::atomic(
            col("C", "z"),
            PredicateCondition::LessThan,
            Operand::Column(col("B", "w")),
        ),
        JoinPredicate::between(
            col("C", "v"),
            Operand::Value(ScalarValue::Int(1)),
            Operand::Value(ScalarValue::Int(9)),
        ),
    ];
    JoinGraph::new(
        vec!["C".to_string(), "A".to_string(), "B".to_string()],
        order.iter().map(|index| predicates[*index].clone()).collect(),
    )
}

#[test]
fn swapped_join_sides_share_one_entry() {
    let mut cache = CardinalityEstimationCache::new();
    assert_eq!(cache.get(&two_way(true)), None);
    cache.put(&two_way(false), 42.0);
    assert_eq!(cache.get(&two_way(true)), Some(42.0));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get_entry(&two_way(false)).request_count, 2);
}

#[test]
fn predicate_order_does_not_matter() {
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&three_way(&[0, 1, 2]), 7.0);
    for order in [[2, 1, 0], [1, 0, 2], [0, 2, 1]] {
        assert_eq!(cache.get(&three_way(&order)), Some(7.0));
    }
    assert_eq!(cache.size(), 1);
    assert_eq!(
        three_way(&[2, 0, 1]).normalized().description(),
        three_way(&[0, 1, 2]).normalized().description()
    );
}

#[test]
fn mirrored_inequalities_collapse() {
    let less = JoinGraph::new(
        vec!["A".into(), "B".into()],
        vec![JoinPredicate::atomic(
            col("A", "x"),
            PredicateCondition::LessThan,
            Operand::Column(col("B", "y")),
        )],
    );
    let greater = JoinGraph::new(
        vec!["A".into(), "B".into()],
        vec![JoinPredicate::atomic(
            col("B", "y"),
            PredicateCondition::GreaterThan,
            Operand::Column(col("A", "x")),
        )],
    );
    let flipped_wrong = JoinGraph::new(
        vec!["A".into(), "B".into()],
        vec![JoinPredicate::atomic(
            col("B", "y"),
            PredicateCondition::LessThan,
            Operand::Column(col("A", "x")),
        )],
    );
    assert_eq!(less.normalized(), greater.normalized());
    assert_ne!(less.normalized(), flipped_wrong.normalized());
}

#[test]
fn logical_operands_commute() {
    let left = JoinPredicate::equi(col("A", "x"), col("B", "y"));
    let right = JoinPredicate::equi(col("A", "k"), col("B", "k"));
    let graph = |predicate: JoinPredicate| JoinGraph::new(vec!["A".into(), "B".into()], vec![predicate]);
    let forward = graph(JoinPredicate::logical(
        LogicalOperator::Or,
        left.clone(),
        right.clone(),
    ));
    let backward = graph(JoinPredicate::logical(LogicalOperator::Or, right, left));
    assert_eq!(forward.normalized(), backward.normalized());
}

#[test]
fn telemetry_tracks_requests_per_key() {
    let mut cache = CardinalityEstimationCache::new();
    let a = two_way(true);
    let c = three_way(&[0, 1, 2]);

    cache.get(&a);
    cache.get(&a);
    cache.get(&c);
    cache.put(&a, 10.0);
    cache.get(&a);

    assert_eq!(cache.cache_hit_count(), 1);
    assert_eq!(cache.cache_miss_count(), 3);
    assert_eq!(cache.distinct_request_count(), 2);
    assert_eq!(cache.distinct_hit_count(), 1);
    assert_eq!(cache.distinct_miss_count(), 1);

    cache.reset_distinct_hit_miss_counts();
    assert_eq!(cache.distinct_hit_count(), 0);
    assert_eq!(cache.distinct_miss_count(), 0);
    assert_eq!(cache.cache_hit_count(), 1);
    assert_eq!(cache.size(), 2);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.cache_miss_count(), 0);
}

#[test]
fn untracked_misses_leave_no_entry() {
    let options = CacheOptions {
        track_requests: false,
        ..CacheOptions::default()
    };
    let mut cache = CardinalityEstimationCache::with_options(&options);
    assert_eq!(cache.get(&two_way(true)), None);
    assert!(cache.is_empty());
    assert_eq!(cache.cache_miss_count(), 1);
    cache.put(&two_way(true), 3.0);
    assert_eq!(cache.get(&two_way(false)), Some(3.0));
}

#[test]
fn request_log_uses_normalized_keys() {
    let log = CapturedLog::default();
    let mut cache = CardinalityEstimationCache::new();
    cache.set_log(Box::new(log.clone()));

    cache.get(&two_way(false));
    cache.get(&two_way(true));
    cache.put(&two_way(true), 2.5);
    cache.get(&two_way(false));
    cache.put(&three_way(&[1, 0, 2]), 8.0);

    let key = two_way(false).normalized().description();
    let other = three_way(&[0, 1, 2]).normalized().description();
    assert!(key.starts_with("[A, B] "), "{key}");
    assert_eq!(
        log.lines(),
        vec![
            format!("CardinalityEstimationCache [I][MISS]: {key}"),
            format!("CardinalityEstimationCache [S][MISS]: {key}"),
            format!("CardinalityEstimationCache [S][PUT ]: {key}: 2.5"),
            format!("CardinalityEstimationCache [S][HIT ]: {key}: 2.5"),
            format!("CardinalityEstimationCache [I][PUT ]: {other}: 8"),
        ]
    );

    assert!(cache.take_log().is_some());
    cache.get(&two_way(true));
    assert_eq!(log.lines().len(), 5);
}

#[test]
fn print_separates_engaged_entries() {
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&two_way(true), 4.0);
    cache.get(&three_way(&[0, 1, 2]));
    let mut out = Vec::new();
    cache.print(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let joined = two_way(true).normalized().description();
    let other = three_way(&[0, 1, 2]).normalized().description();
    assert_eq!(
        lines,
        vec![
            "-------------------- ENGAGED ENTRIES ------------------------",
            &format!("{joined}: 4"),
            "",
            "------------------- DISENGAGED ENTRIES ------------------------",
            &format!("{other}: -"),
        ]
    );
}

#[test]
fn store_and_load_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");

    let mut cache = CardinalityEstimationCache::new();
    cache.put(&two_way(true), 120.0);
    cache.get(&three_way(&[2, 1, 0]));
    cache.set_timeout(&three_way(&[0, 1, 2]), Some(Duration::from_secs(30)));
    cache.store(&path).unwrap();

    let mut loaded = CardinalityEstimationCache::load(&path).unwrap();
    assert_eq!(loaded.size(), 2);
    assert_eq!(loaded.cache_hit_count(), 0);
    assert_eq!(loaded.get_entry(&two_way(false)).cardinality, Some(120.0));
    let pending = loaded.get_entry(&three_way(&[1, 2, 0]));
    assert_eq!(pending.cardinality, None);
    assert_eq!(pending.timeout, Some(Duration::from_secs(30)));
    assert_eq!(pending.request_count, 0);

    let stored = fs::read_to_string(&path).unwrap();
    loaded.store(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), stored);
}

#[test]
fn stored_file_is_a_json_array_of_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&two_way(true), 5.0);
    cache.get(&three_way(&[0, 1, 2]));
    cache.store(&path).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let records = parsed.as_array().expect("array");
    assert_eq!(records.len(), 2);
    let filled = records
        .iter()
        .find(|record| record.get("value").is_some())
        .expect("filled record");
    assert_eq!(filled["value"], serde_json::json!(5.0));
    assert!(filled.get("timeout").is_none());
    assert!(filled["key"].is_object());
    assert_eq!(
        records
            .iter()
            .filter(|record| record.get("value").is_none())
            .count(),
        1
    );
}

#[test]
fn update_keeps_entries_from_every_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.json");

    let mut first = CardinalityEstimationCache::new();
    first.put(&two_way(true), 1.0);
    first.get(&three_way(&[0, 1, 2]));
    first.update(&path).unwrap();

    let mut second = CardinalityEstimationCache::new();
    second.put(&three_way(&[2, 0, 1]), 9.0);
    second.set_timeout(&two_way(false), Some(Duration::from_secs(5)));
    second.update(&path).unwrap();

    let mut merged = CardinalityEstimationCache::load(&path).unwrap();
    assert_eq!(merged.size(), 2);
    let joined = merged.get_entry(&two_way(true)).clone();
    assert_eq!(joined.cardinality, Some(1.0));
    assert_eq!(joined.timeout, Some(Duration::from_secs(5)));
    assert_eq!(merged.get(&three_way(&[1, 0, 2])), Some(9.0));
}

#[test]
fn blank_and_missing_files() {
    let dir = TempDir::new().unwrap();
    let blank = dir.path().join("blank.json");
    fs::write(&blank, "  \n").unwrap();
    assert!(CardinalityEstimationCache::load(&blank).unwrap().is_empty());

    let err = CardinalityEstimationCache::load(dir.path().join("missing.json")).unwrap_err();
    assert_eq!(err.code(), "CacheUnavailable");

    let fresh = dir.path().join("fresh.json");
    CardinalityEstimationCache::new().update(&fresh).unwrap();
    assert!(fresh.exists());
    assert!(CardinalityEstimationCache::load(&fresh).unwrap().is_empty());
}

#[test]
fn corrupt_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.json");
    fs::write(&path, "{ not json").unwrap();
    let err = CardinalityEstimationCache::load(&path).unwrap_err();
    assert_eq!(err.code(), "Json");
}
