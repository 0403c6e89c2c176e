//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the command-line client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine error.
    #[error(transparent)]
    Core(#[from] modelry_core::Error),

    /// The schema file could not be read or parsed.
    #[error("schema {path}: {message}")]
    Schema {
        /// Schema file path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A command argument is malformed.
    #[error("{0}")]
    Argument(String),

    /// Terminal error.
    #[error("terminal error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// Output error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
