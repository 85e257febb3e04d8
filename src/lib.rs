/*!
 * sql-completer
 *
 * Context-sensitive completion for SQL, usable as a library or through the
 * bundled interactive shell.
 */

pub mod completion;
pub mod error;

pub use completion::{
    Candidate, CompleterSettings, ContextAnalyzer, MetadataSnapshot, SqlCompleter, SqlHelper,
    SuggestionRequest,
};
pub use error::{CompletionError, Result};
