//! Memoized cardinalities of join subproblems.
//!
//! The cache maps normalized [`JoinGraph`]s to an optional cardinality, an
//! optional timeout hint, and a request counter. Entries are created on the
//! first lookup and filled later by [`CardinalityEstimationCache::put`]; they
//! are never evicted. The map itself is not synchronized: share it behind a
//! lock within a process and through [`CardinalityEstimationCache::update`]
//! across processes.
#![forbid(unsafe_code)]

use std::fmt;
use std::io::Write;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::statistics::CacheOptions;
use crate::types::Result;

/// Join graph keys and their normalization.
pub mod join_graph;
/// JSON encoding and locked file sharing.
pub mod persistence;

pub use join_graph::{ColumnRef, JoinGraph, JoinPredicate, LogicalOperator, Operand, ScalarValue};

/// Value stored per normalized join graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheEntry {
    /// Cardinality, once known.
    pub cardinality: Option<f32>,
    /// Caller-defined timeout hint; never enforced by the cache.
    pub timeout: Option<Duration>,
    /// Lookups since creation or the last counter reset.
    pub request_count: usize,
}

/// In-memory cardinality cache keyed by normalized join graphs.
pub struct CardinalityEstimationCache {
    entries: FxHashMap<JoinGraph, CacheEntry>,
    hit_count: usize,
    miss_count: usize,
    track_requests: bool,
    log: Option<Box<dyn Write + Send>>,
}

impl Default for CardinalityEstimationCache {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            hit_count: 0,
            miss_count: 0,
            track_requests: true,
            log: None,
        }
    }
}

impl fmt::Debug for CardinalityEstimationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardinalityEstimationCache")
            .field("entries", &self.entries.len())
            .field("hit_count", &self.hit_count)
            .field("miss_count", &self.miss_count)
            .field("track_requests", &self.track_requests)
            .field("log", &self.log.is_some())
            .finish()
    }
}

impl CardinalityEstimationCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache configured by `options`.
    ///
    /// With `log_requests` set, request lines go to stderr.
    pub fn with_options(options: &CacheOptions) -> Self {
        let mut cache = Self {
            track_requests: options.track_requests,
            ..Self::default()
        };
        if options.log_requests {
            cache.set_log(Box::new(std::io::stderr()));
        }
        cache
    }

    /// Cached cardinality of `join_graph`.
    ///
    /// Every call counts as a request of the normalized key and as either a
    /// hit or a miss.
    pub fn get(&mut self, join_graph: &JoinGraph) -> Option<f32> {
        let key = join_graph.normalized();
        let (first_request, cardinality) = match self.entries.get_mut(&key) {
            Some(entry) => {
                let first = entry.request_count == 0;
                entry.request_count += 1;
                (first, entry.cardinality)
            }
            None if self.track_requests => {
                let entry = CacheEntry {
                    request_count: 1,
                    ..CacheEntry::default()
                };
                self.entries.insert(key.clone(), entry);
                (true, None)
            }
            None => (true, None),
        };

        match cardinality {
            Some(_) => self.hit_count += 1,
            None => self.miss_count += 1,
        }
        trace!(hit = cardinality.is_some(), first_request, "cache.get");

        let outcome = if cardinality.is_some() { "HIT " } else { "MISS" };
        let line = match cardinality {
            Some(value) => format!(
                "CardinalityEstimationCache [{}][{outcome}]: {}: {value}",
                request_marker(first_request),
                key.description()
            ),
            None => format!(
                "CardinalityEstimationCache [{}][{outcome}]: {}",
                request_marker(first_request),
                key.description()
            ),
        };
        self.write_log(&line);
        cardinality
    }

    /// Stores the cardinality of `join_graph`, replacing any previous value.
    pub fn put(&mut self, join_graph: &JoinGraph, cardinality: f32) {
        let key = join_graph.normalized();
        let description = key.description();
        let entry = self.entries.entry(key).or_default();
        let first_fill = entry.cardinality.is_none();
        let first_request = entry.request_count == 0;
        entry.cardinality = Some(cardinality);
        trace!(cardinality, first_fill, "cache.put");
        if first_fill {
            let line = format!(
                "CardinalityEstimationCache [{}][PUT ]: {description}: {cardinality}",
                request_marker(first_request)
            );
            self.write_log(&line);
        }
    }

    /// Entry of `join_graph`, created empty when the key is new.
    ///
    /// Does not count as a request.
    pub fn get_entry(&mut self, join_graph: &JoinGraph) -> &mut CacheEntry {
        self.entries.entry(join_graph.normalized()).or_default()
    }

    /// Timeout hint of `join_graph`.
    pub fn get_timeout(&mut self, join_graph: &JoinGraph) -> Option<Duration> {
        self.get_entry(join_graph).timeout
    }

    /// Sets or clears the timeout hint of `join_graph`.
    pub fn set_timeout(&mut self, join_graph: &JoinGraph, timeout: Option<Duration>) {
        self.get_entry(join_graph).timeout = timeout;
    }

    /// Number of entries, filled or not.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups that found a cardinality.
    pub fn cache_hit_count(&self) -> usize {
        self.hit_count
    }

    /// Lookups that found no cardinality.
    pub fn cache_miss_count(&self) -> usize {
        self.miss_count
    }

    /// Distinct keys known to the cache.
    pub fn distinct_request_count(&self) -> usize {
        self.entries.len()
    }

    /// Requested keys that have a cardinality.
    pub fn distinct_hit_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.cardinality.is_some() && entry.request_count > 0)
            .count()
    }

    /// Requested keys that have no cardinality.
    pub fn distinct_miss_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.cardinality.is_none() && entry.request_count > 0)
            .count()
    }

    /// Zeroes every entry's request counter; values and totals stay.
    pub fn reset_distinct_hit_miss_counts(&mut self) {
        for entry in self.entries.values_mut() {
            entry.request_count = 0;
        }
    }

    /// Drops every entry, the totals, and the log sink.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hit_count = 0;
        self.miss_count = 0;
        self.log = None;
    }

    /// Attaches a sink receiving one line per request and first fill.
    pub fn set_log(&mut self, log: Box<dyn Write + Send>) {
        self.log = Some(log);
    }

    /// Detaches and returns the log sink.
    pub fn take_log(&mut self) -> Option<Box<dyn Write + Send>> {
        self.log.take()
    }

    /// Iterates over `(key, entry)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&JoinGraph, &CacheEntry)> {
        self.entries.iter()
    }

    /// Lists filled entries, then unfilled ones, one per line.
    pub fn print<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut filled: Vec<(String, f32)> = Vec::new();
        let mut unfilled: Vec<String> = Vec::new();
        for (key, entry) in &self.entries {
            match entry.cardinality {
                Some(value) => filled.push((key.description(), value)),
                None => unfilled.push(key.description()),
            }
        }
        filled.sort_by(|a, b| a.0.cmp(&b.0));
        unfilled.sort();

        writeln!(writer, "-------------------- ENGAGED ENTRIES ------------------------")?;
        for (description, value) in filled {
            writeln!(writer, "{description}: {value}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "------------------- DISENGAGED ENTRIES ------------------------")?;
        for description in unfilled {
            writeln!(writer, "{description}: -")?;
        }
        Ok(())
    }

    /// Copies every entry of `other` over this cache.
    ///
    /// Fields present in `other` win; absent ones keep the current value.
    pub fn merge_from(&mut self, other: &CardinalityEstimationCache) {
        for (key, incoming) in &other.entries {
            let entry = self.entries.entry(key.clone()).or_default();
            if incoming.cardinality.is_some() {
                entry.cardinality = incoming.cardinality;
            }
            if incoming.timeout.is_some() {
                entry.timeout = incoming.timeout;
            }
            entry.request_count = entry.request_count.max(incoming.request_count);
        }
    }

    fn write_log(&mut self, line: &str) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(log, "{line}") {
            warn!(error = %err, "cache.log_failed");
        }
    }
}

fn request_marker(first_request: bool) -> &'static str {
    if first_request {
        "I"
    } else {
        "S"
    }
}
