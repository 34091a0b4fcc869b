//! JSON encoding of the cache and locked sharing through a file.
//!
//! The file holds a JSON array of `{"key": <join graph>, "value"?: number,
//! "timeout"?: seconds}` records. Entries without a value are kept, so a key
//! that was requested but never computed survives a round trip. An empty file
//! is an empty cache.
#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CardinalityEstimationCache, JoinGraph};
use crate::primitives::concurrency::FileLock;
use crate::types::{Result, StatsError};

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: JoinGraph,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

impl CardinalityEstimationCache {
    /// Serializes every entry as a JSON array.
    ///
    /// Records are ordered by key description so repeated stores of the
    /// same cache produce identical files.
    pub fn to_json(&self) -> Result<String> {
        let mut records: Vec<(String, PersistedEntry)> = self
            .iter()
            .map(|(key, entry)| {
                (
                    key.description(),
                    PersistedEntry {
                        key: key.clone(),
                        value: entry.cardinality,
                        timeout: entry.timeout.map(|timeout| timeout.as_secs()),
                    },
                )
            })
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        let records: Vec<PersistedEntry> = records.into_iter().map(|(_, record)| record).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Parses a JSON array produced by [`to_json`](Self::to_json).
    ///
    /// Keys are normalized on the way in; request counters start at zero.
    pub fn from_json(text: &str) -> Result<Self> {
        let records: Vec<PersistedEntry> = serde_json::from_str(text)?;
        let mut cache = CardinalityEstimationCache::new();
        for record in records {
            let entry = cache.get_entry(&record.key);
            if let Some(timeout) = record.timeout {
                entry.timeout = Some(Duration::from_secs(timeout));
            }
            if let Some(value) = record.value {
                entry.cardinality = Some(value);
            }
        }
        Ok(cache)
    }

    /// Reads a cache from `reader`; blank input yields an empty cache.
    pub fn load_from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        if text.trim().is_empty() {
            return Ok(CardinalityEstimationCache::new());
        }
        Self::from_json(&text)
    }

    /// Loads the cache stored at `path` while holding the file lock.
    ///
    /// Fails with [`StatsError::CacheUnavailable`] when the file cannot be
    /// opened.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| StatsError::CacheUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        let lock = FileLock::acquire(&file)?;
        let cache = Self::load_from_reader(&file)?;
        lock.unlock()?;
        info!(entries = cache.size(), path = %path.display(), "cache.load");
        Ok(cache)
    }

    /// Overwrites the file at `path` with this cache.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let lock = FileLock::acquire(&file)?;
        rewrite(&file, &self.to_json()?)?;
        lock.unlock()?;
        info!(entries = self.size(), path = %path.display(), "cache.store");
        Ok(())
    }

    /// Merges this cache into the file at `path`.
    ///
    /// Creates the file when missing, then under the file lock reads the
    /// stored cache, lays every in-memory entry over it, and writes the result
    /// back before releasing the lock. Several processes may update one file
    /// concurrently without losing each other's entries.
    pub fn update(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = open_for_update(path)?;
        let lock = FileLock::acquire(&file)?;
        self.merge_locked(path, &file, lock)
    }

    /// Like [`update`](Self::update), but returns `false` without touching
    /// the stored entries when another process holds the file lock.
    pub fn try_update(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let file = open_for_update(path)?;
        let Some(lock) = FileLock::try_acquire(&file)? else {
            info!(path = %path.display(), "cache.update.busy");
            return Ok(false);
        };
        self.merge_locked(path, &file, lock)?;
        Ok(true)
    }

    fn merge_locked(&self, path: &Path, file: &File, lock: FileLock<'_>) -> Result<()> {
        let mut persistent = Self::load_from_reader(file)?;
        let stored = persistent.size();
        persistent.merge_from(self);
        rewrite(file, &persistent.to_json()?)?;
        lock.unlock()?;
        info!(
            stored,
            merged = self.size(),
            entries = persistent.size(),
            path = %path.display(),
            "cache.update"
        );
        Ok(())
    }
}

fn open_for_update(path: &Path) -> Result<File> {
    if !path.exists() {
        info!(path = %path.display(), "cache.touch");
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

fn rewrite(mut file: &File, contents: &str) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}
