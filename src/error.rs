/*!
 * Error types for the completion library
 *
 * Completion itself never fails; these errors only surface while loading
 * vocabularies, metadata snapshots and history files.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, CompletionError>;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The embedded literals table could not be parsed
    #[error("invalid literals table: {0}")]
    Literals(#[source] serde_json::Error),

    /// A snapshot or history file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A metadata snapshot was not valid JSON of the expected shape
    #[error("malformed metadata snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
