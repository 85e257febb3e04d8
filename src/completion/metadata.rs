/*!
 * Catalog metadata
 *
 * Session-scoped tables, views, functions and procedures known to the
 * completer. Every update replaces one collection wholesale. Names are
 * looked up case-insensitively; the spelling supplied by the host is kept
 * for display.
 */

use super::matcher::unescape_name;
use crate::error::{CompletionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// A table or view and its columns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub columns: Vec<String>,
}

/// Catalog metadata cache
#[derive(Debug, Default)]
pub struct MetadataStore {
    /// Upper-cased name -> table
    tables: BTreeMap<String, Relation>,
    /// Upper-cased name -> view
    views: BTreeMap<String, Relation>,
    functions: Vec<String>,
    procedures: Vec<String>,
    last_update: Option<Instant>,
}

fn lookup_key(name: &str) -> String {
    unescape_name(name).to_uppercase()
}

fn relations<I>(entries: I) -> BTreeMap<String, Relation>
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    entries
        .into_iter()
        .map(|(name, columns)| (lookup_key(&name), Relation { name, columns }))
        .collect()
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_tables<I>(&mut self, tables: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.tables = relations(tables);
        self.touch();
    }

    pub fn update_views<I>(&mut self, views: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.views = relations(views);
        self.touch();
    }

    pub fn update_functions(&mut self, functions: Vec<String>) {
        self.functions = functions;
        self.touch();
    }

    pub fn update_procedures(&mut self, procedures: Vec<String>) {
        self.procedures = procedures;
        self.touch();
    }

    /// Replace every collection with the contents of `snapshot`
    pub fn apply(&mut self, snapshot: MetadataSnapshot) {
        self.update_tables(snapshot.tables);
        self.update_views(snapshot.views);
        self.update_functions(snapshot.functions);
        self.update_procedures(snapshot.procedures);
    }

    fn touch(&mut self) {
        self.last_update = Some(Instant::now());
    }

    /// When metadata was last updated, if ever
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn tables(&self) -> impl Iterator<Item = &Relation> {
        self.tables.values()
    }

    pub fn views(&self) -> impl Iterator<Item = &Relation> {
        self.views.values()
    }

    pub fn table(&self, name: &str) -> Option<&Relation> {
        self.tables.get(&lookup_key(name))
    }

    /// Columns of the table or view called `name`
    pub fn columns(&self, name: &str) -> Option<&[String]> {
        self.table(name)
            .or_else(|| self.views.get(&lookup_key(name)))
            .map(|r| r.columns.as_slice())
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn procedures(&self) -> &[String] {
        &self.procedures
    }
}

/// Serialized catalog, as loaded by the command-line tool
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetadataSnapshot {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub views: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub procedures: Vec<String>,
}

impl MetadataSnapshot {
    pub fn from_json(json: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| CompletionError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| CompletionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, path)
    }
}
