use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Verbosity of the shelfmark crates on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    /// Aborts and failed batch jobs
    Error,
    /// Adds hallucinated mappings, stale taxonomy fallbacks and empty rewrites
    Warn,
    /// Adds per-product progress, pacing pauses and the run summary (default)
    Info,
    /// Adds cache decisions and token usage per call
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shelf")]
#[command(about = "shelf - enrich product catalogs with categories, weights and descriptions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/shelfmark/config.toml)
    #[arg(short = 'C', long, global = true, env = "SHELFMARK_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// `--log-level` wins over `-v`; neither means info
    pub fn level_filter(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::INFO,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enhance a JSON array of products
    Enrich(EnrichArgs),
}

#[derive(Debug, Clone, Args)]
pub struct EnrichArgs {
    /// Products JSON file (an array of product records)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the enriched products
    #[arg(short, long)]
    pub output: PathBuf,

    /// Submit through the provider's batch API instead of sequential calls
    #[arg(long)]
    pub batch: bool,

    /// Ignore cached enhancements and call the model for every product
    #[arg(long)]
    pub force_refresh_cache: bool,

    /// Rebuild the taxonomy embedding index
    #[arg(long)]
    pub force_refresh_embeddings: bool,

    /// Re-map every category seen in this run, even if a mapping is cached
    #[arg(long)]
    pub force_refresh_mapping: bool,
}
