//! # Shelfmark Configuration
//!
//! Typed configuration for the enrichment engine, loaded from TOML.
//!
//! ## Features
//!
//! - Every field has a default, so an empty file is a valid configuration
//! - Provider-specific endpoint and model defaults
//! - API keys resolved from the environment first, then the config file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shelfmark_config::ShelfmarkConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShelfmarkConfig::load("shelf.toml")?;
//!     println!("mapping top-k: {}", config.mapping.top_k);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod components;
mod config;
pub mod credentials;
mod loader;

pub use components::{
    BatchConfig, EmbeddingConfig, MappingConfig, PacingConfig, PathsConfig, ProviderConfig,
    ProviderKind,
};
pub use config::ShelfmarkConfig;
pub use credentials::{resolve_api_key, CredentialSource};
pub use loader::{default_config_path, ConfigError, ConfigResult};
