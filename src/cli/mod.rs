//! CLI support for spl-toolkit
//!
//! The subcommands of the `spl-toolkit` binary as plain functions over
//! strings, so they can be embedded and tested without a terminal.

mod discover;
mod map;
mod validate;

pub use discover::{DiscoverOptions, execute_discover, execute_input_fields};
pub use map::{MapOptions, execute_map};
pub use validate::execute_validate;

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Mapper(#[from] crate::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid context entry '{0}', expected KEY=VALUE")]
    InvalidContext(String),
    #[error("No query provided. Pass it as an argument or pipe it to stdin.")]
    NoQuery,
}
