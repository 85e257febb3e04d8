/*!
 * Static SQL vocabularies
 *
 * Keywords (with their likely successors), built-in functions, system
 * procedures, datatypes and reserved words. Loaded once from the embedded
 * literals table and shared read-only between the analyzer and the ranker.
 */

use crate::error::{CompletionError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

const BUILTIN_LITERALS: &str = include_str!("literals.json");

#[derive(Debug, Deserialize)]
struct LiteralsTable {
    keywords: BTreeMap<String, Vec<String>>,
    functions: Vec<String>,
    procedures: Vec<String>,
    datatypes: Vec<String>,
    reserved: Vec<String>,
}

/// Immutable vocabulary shared by the whole completer
#[derive(Debug, Clone)]
pub struct Literals {
    keyword_tree: BTreeMap<String, Vec<String>>,
    keywords: Vec<String>,
    functions: Vec<String>,
    function_set: HashSet<String>,
    procedures: Vec<String>,
    datatypes: Vec<String>,
    reserved: HashSet<String>,
}

impl Literals {
    /// Vocabulary embedded in the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LITERALS)
    }

    /// Build a vocabulary from a literals table in JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let table: LiteralsTable = serde_json::from_str(json).map_err(CompletionError::Literals)?;

        let keyword_tree: BTreeMap<String, Vec<String>> = table
            .keywords
            .into_iter()
            .map(|(k, next)| {
                (
                    k.to_uppercase(),
                    next.into_iter().map(|n| n.to_uppercase()).collect(),
                )
            })
            .collect();
        let keywords = keyword_tree.keys().cloned().collect();
        let functions: Vec<String> = table.functions.iter().map(|f| f.to_uppercase()).collect();
        let function_set = functions.iter().cloned().collect();

        Ok(Self {
            keyword_tree,
            keywords,
            functions,
            function_set,
            procedures: table.procedures,
            datatypes: table.datatypes.iter().map(|d| d.to_uppercase()).collect(),
            reserved: table.reserved.iter().map(|r| r.to_uppercase()).collect(),
        })
    }

    /// All keywords, sorted
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.keyword_tree.contains_key(&word.to_uppercase())
    }

    /// Keywords likely to follow `keyword`, if the table lists any
    pub fn keyword_successors(&self, keyword: &str) -> Option<&[String]> {
        self.keyword_tree
            .get(&keyword.to_uppercase())
            .map(Vec::as_slice)
            .filter(|next| !next.is_empty())
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.function_set.contains(&name.to_uppercase())
    }

    pub fn procedures(&self) -> &[String] {
        &self.procedures
    }

    pub fn datatypes(&self) -> &[String] {
        &self.datatypes
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved.contains(&word.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_literals_load() {
        let literals = Literals::builtin().unwrap();
        assert!(literals.is_keyword("select"));
        assert!(literals.is_keyword("EXEC"));
        assert!(!literals.is_keyword("orders"));
        assert!(literals.is_function("count"));
        assert!(literals.is_reserved("user"));
        assert!(literals.datatypes().iter().any(|d| d == "VARCHAR"));
        assert!(literals.procedures().iter().any(|p| p == "@AdHoc"));
    }

    #[test]
    fn test_keyword_successors() {
        let literals = Literals::builtin().unwrap();
        let next = literals.keyword_successors("create").unwrap();
        assert!(next.iter().any(|k| k == "TABLE"));
        // Keywords with an empty successor list fall back to the full vocabulary
        assert!(literals.keyword_successors("SELECT").is_none());
        assert!(literals.keyword_successors("NOPE").is_none());
    }

    #[test]
    fn test_invalid_table_is_an_error() {
        assert!(matches!(
            Literals::from_json("{\"keywords\": 3}"),
            Err(CompletionError::Literals(_))
        ));
    }
}
