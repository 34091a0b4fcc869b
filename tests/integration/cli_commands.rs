#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use assert_cmd::cargo::cargo_bin_cmd;
use cardest::cache::{CardinalityEstimationCache, ColumnRef, JoinGraph, JoinPredicate};
use cardest::primitives::concurrency::FileLock;
use csv::ReaderBuilder;
use serde_json::Value;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = dir.path().join("config.toml");
        fs::write(
            &config,
            "[histograms]\nstrategy = \"equal_distinct_count\"\nbin_count = 5\n",
        )
        .expect("write config");
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn ints(&self) -> PathBuf {
        let path = self.path("ints.csv");
        let mut csv = String::from("value,count\n");
        for value in (1..=10).rev() {
            csv.push_str(&format!("{value},2\n"));
        }
        fs::write(&path, csv).expect("write ints");
        path
    }

    fn names(&self) -> PathBuf {
        let path = self.path("names.csv");
        fs::write(
            &path,
            "name\nbob\nalice\nanna\nbob\nalice\ncarl\nbob\nanna\nalice\nbob\n",
        )
        .expect("write names");
        path
    }
}

fn run_json(config: &Path, args: &[&str], extra: &[&Path]) -> Value {
    let mut cmd = cargo_bin_cmd!("cardest");
    cmd.arg("--config").arg(config).args(["--format", "json"]);
    cmd.args(args);
    for path in extra {
        cmd.arg(path);
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("valid json")
}

fn graph(relation: &str) -> JoinGraph {
    JoinGraph::new(
        vec![relation.to_string(), "R".into()],
        vec![JoinPredicate::equi(
            ColumnRef::new(relation, "id"),
            ColumnRef::new("R", "id"),
        )],
    )
}

#[test]
fn histogram_summary_as_json() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let json = run_json(
        &fixture.config,
        &["histogram", "--type", "int32", "--input"],
        &[&input],
    );
    assert_eq!(json["column_type"], "int32");
    assert_eq!(json["histogram_type"], "EqualDistinctCount");
    assert_eq!(json["bins"], 5);
    assert_eq!(json["requested_bins"], 5);
    assert_eq!(json["total_count"].as_f64(), Some(20.0));
    assert_eq!(json["total_distinct_count"].as_f64(), Some(10.0));
}

#[test]
fn histogram_strategy_and_bins_override_config() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let json = run_json(
        &fixture.config,
        &[
            "histogram",
            "--type",
            "int64",
            "--strategy",
            "equal-width",
            "--bins",
            "2",
            "--input",
        ],
        &[&input],
    );
    assert_eq!(json["histogram_type"], "EqualWidth");
    assert_eq!(json["bins"], 2);
}

#[test]
fn histogram_text_lists_bins() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["histogram", "--type", "int32", "--input"])
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.starts_with("EqualDistinctCount"), "{text}");
    assert!(text.contains("[1, 2]: 4 (2 distinct)"), "{text}");
    assert!(text.contains("[9, 10]: 4 (2 distinct)"), "{text}");
}

#[test]
fn histogram_csv_has_one_record_per_bin() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["histogram", "--type", "int32", "--csv", "--input"])
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let mut reader = ReaderBuilder::new().from_reader(output.as_slice());
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(&headers[0], "histogram_type");
    assert_eq!(&headers[1], "actual_num_bins");
    assert_eq!(&headers[2], "requested_num_bins");
    let rows: Vec<_> = reader.records().collect::<Result<_, _>>().expect("rows");
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[4][3], "4");
    assert_eq!(&rows[4][5], "10");
}

#[test]
fn estimate_reports_every_measure() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let json = run_json(
        &fixture.config,
        &[
            "estimate",
            "--type",
            "int32",
            "--predicate",
            "eq",
            "--value",
            "3",
            "--input",
        ],
        &[&input],
    );
    assert_eq!(json["condition"], "Equals");
    assert_eq!(json["value"]["type"], "int32");
    assert_eq!(json["value"]["value"], 3);
    assert_eq!(json["total_count"].as_f64(), Some(20.0));
    assert_eq!(json["cardinality"].as_f64(), Some(2.0));
    assert_eq!(json["distinct_count"].as_f64(), Some(1.0));
    assert_eq!(json["prunable"], false);
    assert!(json.get("value2").is_none());
}

#[test]
fn estimate_out_of_range_is_prunable() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let json = run_json(
        &fixture.config,
        &[
            "estimate",
            "--type",
            "int32",
            "--predicate",
            "lt",
            "--value",
            "-4",
            "--input",
        ],
        &[&input],
    );
    assert_eq!(json["cardinality"].as_f64(), Some(0.0));
    assert_eq!(json["selectivity"].as_f64(), Some(0.0));
    assert_eq!(json["prunable"], true);
}

#[test]
fn estimate_between_in_text() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args([
            "estimate",
            "--type",
            "int32",
            "--predicate",
            "between",
            "--value",
            "1",
            "--value2",
            "10",
            "--input",
        ])
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("(int32 column, 20 rows)"), "{text}");
    assert!(text.contains("cardinality=20 "), "{text}");
    assert!(text.contains("prunable=false"), "{text}");
}

#[test]
fn estimate_like_on_strings() {
    let fixture = Fixture::new();
    let input = fixture.names();
    let json = run_json(
        &fixture.config,
        &[
            "estimate",
            "--type",
            "string",
            "--bins",
            "4",
            "--predicate",
            "like",
            "--value",
            "a%",
            "--input",
        ],
        &[&input],
    );
    assert_eq!(json["total_count"].as_f64(), Some(10.0));
    let cardinality = json["cardinality"].as_f64().expect("number");
    assert!((cardinality - 5.0).abs() < 1e-3, "{cardinality}");
}

#[test]
fn bad_input_fails_with_message() {
    let fixture = Fixture::new();
    let input = fixture.path("bad.csv");
    fs::write(&input, "value\n1\nseven\n").expect("write");
    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["histogram", "--type", "int32", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error:"), "{stderr}");
    assert!(stderr.contains("line 3"), "{stderr}");
}

#[test]
fn like_on_numbers_is_rejected() {
    let fixture = Fixture::new();
    let input = fixture.ints();
    cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args([
            "estimate",
            "--type",
            "int32",
            "--predicate",
            "like",
            "--value",
            "1",
            "--input",
        ])
        .arg(&input)
        .assert()
        .failure();
}

#[test]
fn cache_stats_and_show() {
    let fixture = Fixture::new();
    let path = fixture.path("cache.json");
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&graph("A"), 11.0);
    cache.get(&graph("B"));
    cache.store(&path).expect("store");

    let json = run_json(&fixture.config, &["cache", "stats"], &[&path]);
    assert_eq!(json["entries"], 2);
    assert_eq!(json["with_cardinality"], 1);
    assert_eq!(json["without_cardinality"], 1);
    assert_eq!(json["with_timeout"], 0);

    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["cache", "show"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    let filled = format!("{}: 11", graph("A").normalized().description());
    let pending = format!("{}: -", graph("B").normalized().description());
    assert!(text.contains("ENGAGED ENTRIES"), "{text}");
    assert!(text.contains(&filled), "{text}");
    assert!(text.contains(&pending), "{text}");
}

#[test]
fn cache_path_comes_from_config() {
    let fixture = Fixture::new();
    let path = fixture.path("configured.json");
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&graph("A"), 1.0);
    cache.store(&path).expect("store");

    let config = fixture.path("with-cache.toml");
    fs::write(
        &config,
        format!("[cache]\npath = {:?}\n", path.display().to_string()),
    )
    .expect("write config");
    let json = run_json(&config, &["cache", "stats"], &[]);
    assert_eq!(json["entries"], 1);

    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["cache", "stats"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("no cache file"), "{stderr}");
}

#[test]
fn missing_cache_file_is_reported() {
    let fixture = Fixture::new();
    let missing = fixture.path("nowhere.json");
    cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["cache", "stats"])
        .arg(&missing)
        .assert()
        .failure();
}

#[test]
fn cache_merge_combines_files() {
    let fixture = Fixture::new();
    let source = fixture.path("source.json");
    let target = fixture.path("target.json");

    let mut incoming = CardinalityEstimationCache::new();
    incoming.put(&graph("A"), 5.0);
    incoming.put(&graph("B"), 6.0);
    incoming.store(&source).expect("store source");
    let mut existing = CardinalityEstimationCache::new();
    existing.put(&graph("B"), 60.0);
    existing.get(&graph("C"));
    existing.store(&target).expect("store target");

    let json = run_json(&fixture.config, &["cache", "merge"], &[&source, &target]);
    assert_eq!(json["entries"], 3);
    assert_eq!(json["with_cardinality"], 2);

    let mut merged = CardinalityEstimationCache::load(&target).expect("load");
    assert_eq!(merged.get(&graph("B")), Some(6.0));
    assert_eq!(merged.get(&graph("C")), None);
}

#[test]
fn concurrent_merges_lose_nothing() {
    let fixture = Fixture::new();
    let target = fixture.path("shared.json");
    let relations: Vec<String> = (0..12).map(|index| format!("T{index}")).collect();
    let sources: Vec<PathBuf> = relations
        .iter()
        .map(|relation| {
            let path = fixture.path(&format!("{relation}.json"));
            let mut cache = CardinalityEstimationCache::new();
            cache.put(&graph(relation), 1.0);
            cache.store(&path).expect("store");
            path
        })
        .collect();

    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let config = fixture.config.clone();
            let target = target.clone();
            thread::spawn(move || {
                cargo_bin_cmd!("cardest")
                    .arg("--config")
                    .arg(&config)
                    .args(["cache", "merge"])
                    .arg(&source)
                    .arg(&target)
                    .assert()
                    .success();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("merge thread");
    }

    let mut merged = CardinalityEstimationCache::load(&target).expect("load");
    assert_eq!(merged.size(), relations.len());
    for relation in &relations {
        assert_eq!(merged.get(&graph(relation)), Some(1.0));
    }
}

#[test]
fn merge_without_waiting_fails_while_target_is_locked() {
    let fixture = Fixture::new();
    let target = fixture.path("held.json");
    let source = fixture.path("incoming.json");
    let mut cache = CardinalityEstimationCache::new();
    cache.put(&graph("T0"), 7.0);
    cache.store(&source).expect("store");

    let held = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&target)
        .expect("open target");
    let lock = FileLock::acquire(&held).expect("lock");
    let output = cargo_bin_cmd!("cardest")
        .arg("--config")
        .arg(&fixture.config)
        .args(["cache", "merge", "--no-wait"])
        .arg(&source)
        .arg(&target)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("locked by another process"), "{stderr}");
    assert_eq!(fs::read_to_string(&target).expect("read"), "");
    lock.unlock().expect("unlock");

    let report = run_json(
        &fixture.config,
        &["cache", "merge", "--no-wait"],
        &[&source, &target],
    );
    assert_eq!(report["entries"], 1);
    let mut merged = CardinalityEstimationCache::load(&target).expect("load");
    assert_eq!(merged.get(&graph("T0")), Some(7.0));
}
