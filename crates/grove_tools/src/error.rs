//! Error types for the command-line tools.

use std::path::PathBuf;

use grove_core::error::GameError;
use thiserror::Error;

/// Tool errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A directory held no catalog files.
    #[error("no .ron catalog files in {0}")]
    NoCatalogs(PathBuf),

    /// Engine error (invalid catalog, corrupt checkpoint).
    #[error(transparent)]
    Game(#[from] GameError),

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// A catch-up was already running on the loaded game.
    #[error("catch-up already in progress")]
    CatchUpBusy,

    /// The async runtime could not start.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Read a file to a string, keeping the path in the error.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a string to a file, keeping the path in the error.
pub(crate) fn write_file(path: &std::path::Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}
