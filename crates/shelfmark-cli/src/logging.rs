//! Tracing subscriber setup for the binary

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const SHELFMARK_TARGETS: &[&str] = &[
    "shelf",
    "shelfmark_cli",
    "shelfmark_core",
    "shelfmark_config",
    "shelfmark_llm",
    "shelfmark_taxonomy",
    "shelfmark_enrichment",
];

/// Filter directives for `level`: our crates at `level`, everything else no
/// louder than warn
pub fn directives(level: LevelFilter) -> String {
    let ours = SHELFMARK_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{},{ours}", level.min(LevelFilter::WARN)).to_lowercase()
}

/// `RUST_LOG` when set and valid, otherwise [`directives`]
pub fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

/// Installs the global fmt subscriber, logging to stderr
pub fn init(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
