/*!
 * Context-sensitive SQL completion
 *
 * Given the text of a buffer and a cursor position, works out which kinds
 * of objects may legally appear there and offers ranked candidates:
 * - Keywords (narrowed to likely successors), built-in functions, procedures
 *   and datatypes
 * - Tables, views, columns and aliases from the session metadata, resolved
 *   against the tables the statement actually references
 * - Join and join-condition suggestions
 * - Fuzzy or strict matching, ranked by match quality, category, context
 *   and how often a name was used before
 */

pub mod analyzer;
pub mod cte;
pub mod engine;
pub mod helper;
pub mod lexer;
pub mod literals;
pub mod matcher;
pub mod metadata;
pub mod parse;
pub mod prevalence;
pub mod settings;
pub mod statement;
pub mod suggestion;
pub mod tables;

#[cfg(test)]
mod analyzer_tests;

// Re-export main interfaces
pub use analyzer::ContextAnalyzer;
pub use engine::SqlCompleter;
pub use helper::SqlHelper;
pub use literals::Literals;
pub use metadata::{MetadataSnapshot, MetadataStore};
pub use settings::{CompleterSettings, KeywordCasing, QualifyColumns};
pub use suggestion::{Candidate, SuggestionCategory, SuggestionRequest};
pub use tables::TableReference;
