//! Histogram and cache options, loadable from a TOML config file.
#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::histograms::string_domain::{DEFAULT_FIRST_CHAR, DEFAULT_LAST_CHAR, DEFAULT_PREFIX_LENGTH};
use super::histograms::{BinStrategy, StringDomain};
use crate::types::{Result, StatsError};

/// Options used when building column histograms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    /// Strategy used when none is requested explicitly.
    pub strategy: BinStrategy,
    /// Maximum number of bins per histogram.
    pub bin_count: usize,
    /// Contiguous character range supported by string histograms.
    pub alphabet: String,
    /// Characters of a string that take part in ordering and estimation.
    pub prefix_length: usize,
}

impl HistogramOptions {
    /// Few wide bins; cheap to build and store.
    pub fn coarse() -> Self {
        Self {
            bin_count: 10,
            ..Self::default()
        }
    }

    /// Many narrow bins for skewed columns.
    pub fn fine() -> Self {
        Self {
            bin_count: 500,
            ..Self::default()
        }
    }
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            strategy: BinStrategy::EqualDistinctCount,
            bin_count: 100,
            alphabet: (DEFAULT_FIRST_CHAR..=DEFAULT_LAST_CHAR).collect(),
            prefix_length: DEFAULT_PREFIX_LENGTH,
        }
    }
}

impl StringDomain {
    /// Domain described by the alphabet and prefix length in `options`.
    pub fn from_options(options: &HistogramOptions) -> Result<Self> {
        StringDomain::new(&options.alphabet, options.prefix_length)
    }
}

/// Options for the cardinality estimation cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// File the cache is loaded from and stored to.
    pub path: Option<PathBuf>,
    /// Attach a log sink writing one line per request to stderr.
    pub log_requests: bool,
    /// Remember keys that were requested but never filled.
    pub track_requests: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            path: None,
            log_requests: false,
            track_requests: true,
        }
    }
}

/// Top-level configuration file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// `[histograms]` table.
    pub histograms: HistogramOptions,
    /// `[cache]` table.
    pub cache: CacheOptions,
}

impl StatisticsConfig {
    /// Parses TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| StatsError::config(format!("parse error: {err}")))
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            StatsError::config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            StatsError::Config(message) => {
                StatsError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Loads `explicit`, or the default location when it exists, or defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `<config dir>/cardest/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cardest").join("config.toml"))
}
