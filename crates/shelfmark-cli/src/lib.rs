//! Shelfmark CLI library
//!
//! Argument parsing, logging setup and the `enrich` command behind the
//! `shelf` binary.

pub mod cli;
pub mod commands;
pub mod logging;
