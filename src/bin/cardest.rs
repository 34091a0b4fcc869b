//! Binary entry point for the cardest command-line tool.
#![forbid(unsafe_code)]

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use cardest::{
    cache::CardinalityEstimationCache,
    cli::{read_value_counts_from_path, CacheReport, ColumnType, EstimateReport},
    statistics::{BinStrategy, ColumnHistogram, StatisticsConfig},
    types::PredicateCondition,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cardest",
    version,
    about = "Histogram statistics and cardinality cache tooling",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "CARDEST_CONFIG",
        value_name = "FILE",
        help = "Configuration file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Build a histogram from a value/count CSV and print it")]
    Histogram {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, help = "Print the bins as CSV instead of a description")]
        csv: bool,
    },
    #[command(about = "Estimate one predicate against a histogram built from CSV")]
    Estimate {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, help = "Predicate condition")]
        predicate: PredicateArg,
        #[arg(long, allow_hyphen_values = true, help = "Predicate value or LIKE pattern")]
        value: String,
        #[arg(
            long,
            allow_hyphen_values = true,
            help = "Upper bound for BETWEEN"
        )]
        value2: Option<String>,
    },
    #[command(subcommand, about = "Inspect and combine cardinality cache files")]
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
struct SourceArgs {
    #[arg(long, value_name = "FILE", help = "CSV with a header row and value[,count] columns")]
    input: PathBuf,
    #[arg(long = "type", value_enum, help = "Column type of the values")]
    column_type: ColumnTypeArg,
    #[arg(long, value_enum, help = "Binning strategy (defaults to the configured one)")]
    strategy: Option<StrategyArg>,
    #[arg(long, help = "Maximum number of bins (defaults to the configured count)")]
    bins: Option<usize>,
    #[arg(long, help = "Name of the value column in the input")]
    column: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    #[command(about = "Summarize a cache file")]
    Stats {
        #[arg(value_name = "CACHE", help = "Cache file (defaults to the configured path)")]
        path: Option<PathBuf>,
    },
    #[command(about = "Print every entry of a cache file")]
    Show {
        #[arg(value_name = "CACHE", help = "Cache file (defaults to the configured path)")]
        path: Option<PathBuf>,
    },
    #[command(about = "Merge one cache file into another under the file lock")]
    Merge {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        #[arg(
            value_name = "TARGET",
            help = "Cache file receiving the entries (defaults to the configured path)"
        )]
        target: Option<PathBuf>,
        #[arg(long, help = "Fail instead of waiting when the target is locked")]
        no_wait: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColumnTypeArg {
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl From<ColumnTypeArg> for ColumnType {
    fn from(value: ColumnTypeArg) -> Self {
        match value {
            ColumnTypeArg::Int32 => ColumnType::Int32,
            ColumnTypeArg::Int64 => ColumnType::Int64,
            ColumnTypeArg::Float32 => ColumnType::Float32,
            ColumnTypeArg::Float64 => ColumnType::Float64,
            ColumnTypeArg::String => ColumnType::String,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum StrategyArg {
    EqualWidth,
    EqualHeight,
    EqualDistinctCount,
}

impl From<StrategyArg> for BinStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::EqualWidth => BinStrategy::EqualWidth,
            StrategyArg::EqualHeight => BinStrategy::EqualHeight,
            StrategyArg::EqualDistinctCount => BinStrategy::EqualDistinctCount,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PredicateArg {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    Like,
    NotLike,
}

impl From<PredicateArg> for PredicateCondition {
    fn from(value: PredicateArg) -> Self {
        match value {
            PredicateArg::Eq => PredicateCondition::Equals,
            PredicateArg::Ne => PredicateCondition::NotEquals,
            PredicateArg::Lt => PredicateCondition::LessThan,
            PredicateArg::Le => PredicateCondition::LessThanEquals,
            PredicateArg::Gt => PredicateCondition::GreaterThan,
            PredicateArg::Ge => PredicateCondition::GreaterThanEquals,
            PredicateArg::Between => PredicateCondition::Between,
            PredicateArg::Like => PredicateCondition::Like,
            PredicateArg::NotLike => PredicateCondition::NotLike,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CARDEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = StatisticsConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Histogram { source, csv } => {
            let (histogram, requested) = build_histogram(&source, &config)?;
            if csv {
                histogram.bins_to_csv(io::stdout().lock(), source.column.as_deref(), Some(requested))?;
            } else {
                let summary = serde_json::json!({
                    "column_type": histogram.type_name(),
                    "histogram_type": histogram.histogram_type(),
                    "bins": histogram.bin_count(),
                    "requested_bins": requested,
                    "total_count": histogram.total_count(),
                    "total_distinct_count": histogram.total_distinct_count(),
                });
                emit(&cli.format, &summary, |_| print!("{}", histogram.description()))?;
            }
        }
        Command::Estimate {
            source,
            predicate,
            value,
            value2,
        } => {
            let (histogram, _) = build_histogram(&source, &config)?;
            let column_type = ColumnType::from(source.column_type);
            let value = column_type.parse_literal(&value)?;
            let value2 = value2
                .map(|raw| column_type.parse_literal(&raw))
                .transpose()?;
            let report =
                EstimateReport::compute(&histogram, predicate.into(), &value, value2.as_ref())?;
            emit(&cli.format, &report, |_| print_estimate_text(&report))?;
        }
        Command::Cache(command) => run_cache(command, &cli.format, &config)?,
    }
    Ok(())
}

fn build_histogram(
    source: &SourceArgs,
    config: &StatisticsConfig,
) -> Result<(ColumnHistogram, usize), Box<dyn Error>> {
    let options = &config.histograms;
    let strategy = source.strategy.map(BinStrategy::from).unwrap_or(options.strategy);
    let bins = source.bins.unwrap_or(options.bin_count);
    let value_counts = read_value_counts_from_path(
        &source.input,
        source.column_type.into(),
        source.column.as_deref(),
    )?;
    let histogram = ColumnHistogram::build(strategy, &value_counts, bins, options)?;
    Ok((histogram, bins))
}

fn run_cache(
    command: CacheCommand,
    format: &OutputFormat,
    config: &StatisticsConfig,
) -> Result<(), Box<dyn Error>> {
    match command {
        CacheCommand::Stats { path } => {
            let path = cache_path(path, config)?;
            let cache = CardinalityEstimationCache::load(&path)?;
            let report = CacheReport::from_cache(&cache);
            emit(format, &report, |_| print_cache_text(&path, &report))?;
        }
        CacheCommand::Show { path } => {
            let path = cache_path(path, config)?;
            let cache = CardinalityEstimationCache::load(&path)?;
            match format {
                OutputFormat::Json => println!("{}", cache.to_json()?),
                OutputFormat::Text => cache.print(io::stdout().lock())?,
            }
        }
        CacheCommand::Merge {
            source,
            target,
            no_wait,
        } => {
            let target = cache_path(target, config)?;
            let incoming = CardinalityEstimationCache::load(&source)?;
            if no_wait {
                if !incoming.try_update(&target)? {
                    return Err(format!("{} is locked by another process", target.display()).into());
                }
            } else {
                incoming.update(&target)?;
            }
            let merged = CardinalityEstimationCache::load(&target)?;
            let report = CacheReport::from_cache(&merged);
            emit(format, &report, |_| print_cache_text(&target, &report))?;
        }
    }
    Ok(())
}

fn cache_path(explicit: Option<PathBuf>, config: &StatisticsConfig) -> Result<PathBuf, Box<dyn Error>> {
    explicit
        .or_else(|| config.cache.path.clone())
        .ok_or_else(|| "no cache file given and none configured".into())
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_estimate_text(report: &EstimateReport) {
    println!("{} ({} column, {} rows)", report.predicate(), report.column_type, report.total_count);
    println!(
        "  cardinality={} selectivity={} distinct={} prunable={}",
        report.cardinality, report.selectivity, report.distinct_count, report.prunable
    );
}

fn print_cache_text(path: &Path, report: &CacheReport) {
    println!("Cache {}:", path.display());
    println!(
        "  entries={} with_cardinality={} without_cardinality={} with_timeout={}",
        report.entries, report.with_cardinality, report.without_cardinality, report.with_timeout
    );
}
