/*!
 * Completion engine
 *
 * Ties the pieces together:
 * - Analyzing the statement under the cursor
 * - Generating candidates for every suggestion request
 * - Ranking them with the composite sort key
 */

use super::analyzer::ContextAnalyzer;
use super::cte::LocalTable;
use super::literals::Literals;
use super::matcher::{escape_name, unescape_name, LexicalKey, MatchMode, Matcher};
use super::metadata::MetadataStore;
use super::prevalence::PrevalenceTracker;
use super::settings::{CompleterSettings, QualifyColumns};
use super::suggestion::{
    truncate_meta, Candidate, ColumnContext, FunctionUsage, SortKey, SuggestionCategory,
    SuggestionRequest,
};
use super::tables::TableReference;
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Tertiary priority of name-join conditions on identifier-like columns
const ID_JOIN_PRIORITY: i64 = 1;

/// Something that may be offered, before it is matched
#[derive(Debug)]
struct Item {
    text: String,
    /// Alternative text to match against, e.g. the bare column of `t.col`
    synonym: Option<String>,
    meta: Option<String>,
    tertiary: i64,
}

impl Item {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            synonym: None,
            meta: None,
            tertiary: 0,
        }
    }

    fn synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonym = Some(synonym.into());
        self
    }

    fn meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }
}

/// Columns visible through one table reference
struct ScopedColumns {
    reference: String,
    columns: Vec<String>,
}

/// The word the completion replaces: identifier characters (including
/// quotes and the `@` of system procedures) immediately before the cursor
pub fn word_before_cursor(text_before_cursor: &str) -> &str {
    let start = text_before_cursor
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphanumeric() || "_$@#\"".contains(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(text_before_cursor.len());
    &text_before_cursor[start..]
}

/// Context-sensitive SQL completer
#[derive(Debug)]
pub struct SqlCompleter {
    literals: Arc<Literals>,
    analyzer: ContextAnalyzer,
    metadata: MetadataStore,
    prevalence: PrevalenceTracker,
    settings: CompleterSettings,
}

impl SqlCompleter {
    /// Create a completer with the built-in vocabulary
    pub fn new(settings: CompleterSettings) -> Result<Self> {
        Ok(Self::with_literals(Arc::new(Literals::builtin()?), settings))
    }

    pub fn with_literals(literals: Arc<Literals>, settings: CompleterSettings) -> Self {
        Self {
            analyzer: ContextAnalyzer::new(Arc::clone(&literals)),
            prevalence: PrevalenceTracker::new(Arc::clone(&literals)),
            metadata: MetadataStore::new(),
            literals,
            settings,
        }
    }

    pub fn literals(&self) -> &Literals {
        &self.literals
    }

    pub fn settings(&self) -> &CompleterSettings {
        &self.settings
    }

    pub fn set_smart_completion(&mut self, enabled: bool) {
        self.settings.smart_completion = enabled;
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }

    pub fn prevalence(&self) -> &PrevalenceTracker {
        &self.prevalence
    }

    /// Record query history. Initial history only seeds keyword counts;
    /// statements the user accepts also count names.
    pub fn extend_query_history(&mut self, text: &str, is_init: bool) {
        if is_init {
            self.prevalence.update_keywords(text);
        } else {
            self.prevalence.update(text);
        }
    }

    /// Seed keyword prevalence from saved history, oldest entry first
    pub fn init_from_history<S: AsRef<str>>(&mut self, history: &[S]) {
        self.prevalence
            .init_from_history(history, self.settings.history_seed_size);
    }

    /// Suggestion requests for the cursor position; see
    /// [`ContextAnalyzer::suggest_type`]
    pub fn suggest_type(&self, full_text: &str, text_before_cursor: &str) -> Vec<SuggestionRequest> {
        self.analyzer.suggest_type(full_text, text_before_cursor)
    }

    pub fn escape_name(&self, name: &str) -> String {
        escape_name(name, &self.literals)
    }

    /// Ranked candidates for the cursor at byte offset `cursor_offset` of
    /// `document_text`
    pub fn complete(&self, document_text: &str, cursor_offset: usize) -> Vec<Candidate> {
        let mut cursor = cursor_offset.min(document_text.len());
        while !document_text.is_char_boundary(cursor) {
            cursor -= 1;
        }
        let text_before_cursor = &document_text[..cursor];
        let word = word_before_cursor(text_before_cursor);

        if !self.settings.smart_completion {
            return self.complete_plain(word);
        }

        let requests = self.suggest_type(document_text, text_before_cursor);
        let mut candidates: Vec<Candidate> = requests
            .iter()
            .enumerate()
            .flat_map(|(idx, request)| self.candidates_for(request, word, idx))
            .collect();
        candidates.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.text.clone()));
        debug!(
            requests = requests.len(),
            candidates = candidates.len(),
            word,
            "completed"
        );
        candidates
    }

    /// Keywords and built-in functions, alphabetically
    fn complete_plain(&self, word: &str) -> Vec<Candidate> {
        let keywords = self
            .literals
            .keywords()
            .iter()
            .map(|k| Item::new(self.settings.keyword_casing.apply(k, word)));
        let mut candidates = self.find_matches(word, keywords, MatchMode::Strict, SuggestionCategory::Keyword, 0);
        let functions = self.literals.functions().iter().map(Item::new);
        candidates.extend(self.find_matches(word, functions, MatchMode::Strict, SuggestionCategory::Function, 0));

        candidates.sort_by_cached_key(|c| c.text.to_uppercase());
        candidates.dedup_by(|a, b| a.text.eq_ignore_ascii_case(&b.text));
        candidates
    }

    fn candidates_for(&self, request: &SuggestionRequest, word: &str, idx: usize) -> Vec<Candidate> {
        trace!(kind = request.kind(), idx, "generating candidates");
        match request {
            SuggestionRequest::Column {
                table_refs,
                require_last_table,
                local_tables,
                qualifiable,
                context,
            } => self.column_matches(
                table_refs,
                *require_last_table,
                local_tables,
                *qualifiable && *context != ColumnContext::Insert,
                word,
                idx,
            ),
            SuggestionRequest::Table {
                local_tables,
                qualifier,
                ..
            } => self.table_matches(local_tables, qualifier.as_deref(), word, idx),
            SuggestionRequest::View { qualifier, .. } => {
                self.view_matches(qualifier.as_deref(), word, idx)
            }
            SuggestionRequest::FromClauseItem { local_tables, .. } => {
                let mut out = self.table_matches(local_tables, None, word, idx);
                out.extend(self.view_matches(None, word, idx));
                out.extend(self.function_matches(FunctionUsage::Call, None, word, idx));
                out
            }
            SuggestionRequest::Function {
                usage, qualifier, ..
            } => self.function_matches(*usage, qualifier.as_deref(), word, idx),
            SuggestionRequest::Procedure => {
                let builtin = self.literals.procedures().iter().map(Item::new);
                let mut out =
                    self.find_matches(word, builtin, MatchMode::Strict, SuggestionCategory::Procedure, idx);
                let session = self.metadata.procedures().iter().map(|p| Item::new(self.escape_name(p)));
                out.extend(self.find_matches(word, session, MatchMode::Fuzzy, SuggestionCategory::Procedure, idx));
                out
            }
            SuggestionRequest::Datatype => {
                let types = self.literals.datatypes().iter().map(Item::new);
                self.find_matches(word, types, MatchMode::Strict, SuggestionCategory::Datatype, idx)
            }
            SuggestionRequest::Keyword { last_token } => {
                let vocabulary = last_token
                    .as_deref()
                    .and_then(|t| self.literals.keyword_successors(t))
                    .unwrap_or(self.literals.keywords());
                let casing = self.settings.keyword_casing;
                let keywords = vocabulary.iter().map(|k| Item::new(casing.apply(k, word)));
                self.find_matches(word, keywords, MatchMode::Strict, SuggestionCategory::Keyword, idx)
            }
            SuggestionRequest::Alias { aliases } => {
                let items = aliases.iter().map(Item::new);
                self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::TableAlias, idx)
            }
            SuggestionRequest::Join { .. } => {
                let items = self
                    .metadata
                    .tables()
                    .map(|t| Item::new(self.escape_name(&t.name)));
                self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::Join, idx)
            }
            SuggestionRequest::JoinCondition { table_refs, parent } => {
                let mut out = self.column_matches(table_refs, false, &[], false, word, idx);
                out.extend(self.name_join_matches(table_refs, parent.as_ref(), word, idx));
                out
            }
        }
    }

    /// Columns visible through `table_refs`; all known columns when no
    /// table is in scope
    fn scoped_columns(&self, table_refs: &[TableReference], local_tables: &[LocalTable]) -> Vec<ScopedColumns> {
        let local = |name: &str| {
            local_tables
                .iter()
                .find(|l| unescape_name(&l.name).eq_ignore_ascii_case(unescape_name(name)))
                .map(|l| l.columns.clone())
        };

        if table_refs.is_empty() {
            let mut all: Vec<ScopedColumns> = self
                .metadata
                .tables()
                .map(|t| ScopedColumns {
                    reference: t.name.clone(),
                    columns: t.columns.clone(),
                })
                .collect();
            all.extend(local_tables.iter().map(|l| ScopedColumns {
                reference: l.name.clone(),
                columns: l.columns.clone(),
            }));
            return all;
        }

        table_refs
            .iter()
            .filter_map(|t| {
                let columns = local(&t.name)
                    .or_else(|| self.metadata.columns(&t.name).map(<[String]>::to_vec))?;
                Some(ScopedColumns {
                    reference: t.reference().to_string(),
                    columns,
                })
            })
            .collect()
    }

    fn column_matches(
        &self,
        table_refs: &[TableReference],
        require_last_table: bool,
        local_tables: &[LocalTable],
        qualifiable: bool,
        word: &str,
        idx: usize,
    ) -> Vec<Candidate> {
        let mut scoped = self.scoped_columns(table_refs, local_tables);

        if require_last_table && scoped.len() > 1 {
            // USING (...) only makes sense for columns the last table shares
            // with an earlier one
            if let Some(last) = scoped.pop() {
                let shared: HashSet<String> = scoped
                    .iter()
                    .flat_map(|s| s.columns.iter().map(|c| c.to_uppercase()))
                    .collect();
                let columns = last
                    .columns
                    .into_iter()
                    .filter(|c| shared.contains(&c.to_uppercase()))
                    .collect();
                scoped = vec![ScopedColumns {
                    reference: last.reference,
                    columns,
                }];
            }
        }

        let qualify = qualifiable
            && match self.settings.qualify_columns {
                QualifyColumns::Always => true,
                QualifyColumns::Never => false,
                QualifyColumns::IfMoreThanOneTable => !table_refs.is_empty() && scoped.len() > 1,
            };

        let mut seen = HashSet::new();
        let items: Vec<Item> = scoped
            .iter()
            .flat_map(|s| {
                s.columns.iter().map(move |c| {
                    let column = escape_name(c, &self.literals);
                    if qualify {
                        let text = format!("{}.{}", self.escape_name(&s.reference), column);
                        Item::new(text).synonym(column).meta(format!("column of {}", s.reference))
                    } else {
                        Item::new(column).meta("column")
                    }
                })
            })
            .filter(|item| seen.insert(item.text.to_uppercase()))
            .collect();
        self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::Column, idx)
    }

    /// Relation names, or with `qualifier` only those written as
    /// `QUALIFIER.NAME`, offered without the qualifier
    fn qualified_names<'n>(
        &self,
        names: impl Iterator<Item = &'n str>,
        qualifier: Option<&str>,
    ) -> Vec<String> {
        match qualifier {
            None => names.map(|n| self.escape_name(n)).collect(),
            Some(q) => {
                let prefix = format!("{}.", unescape_name(q).to_uppercase());
                names
                    .filter(|n| n.to_uppercase().starts_with(&prefix))
                    .filter_map(|n| n.get(prefix.len()..))
                    .map(|rest| self.escape_name(rest))
                    .collect()
            }
        }
    }

    fn table_matches(
        &self,
        local_tables: &[LocalTable],
        qualifier: Option<&str>,
        word: &str,
        idx: usize,
    ) -> Vec<Candidate> {
        let mut names = self.qualified_names(self.metadata.tables().map(|t| t.name.as_str()), qualifier);
        if qualifier.is_none() {
            names.extend(local_tables.iter().map(|l| self.escape_name(&l.name)));
        }
        let items = names.into_iter().map(Item::new);
        self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::Table, idx)
    }

    fn view_matches(&self, qualifier: Option<&str>, word: &str, idx: usize) -> Vec<Candidate> {
        let names = self.qualified_names(self.metadata.views().map(|v| v.name.as_str()), qualifier);
        let items = names.into_iter().map(Item::new);
        self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::View, idx)
    }

    fn function_matches(
        &self,
        usage: FunctionUsage,
        qualifier: Option<&str>,
        word: &str,
        idx: usize,
    ) -> Vec<Candidate> {
        let session = self.qualified_names(
            self.metadata.functions().iter().map(String::as_str),
            qualifier,
        );
        let mut out = self.find_matches(
            word,
            session.into_iter().map(Item::new),
            MatchMode::Fuzzy,
            SuggestionCategory::Function,
            idx,
        );
        if qualifier.is_none() && usage == FunctionUsage::Call {
            let builtin = self.literals.functions().iter().map(Item::new);
            out.extend(self.find_matches(word, builtin, MatchMode::Strict, SuggestionCategory::Function, idx));
        }
        out
    }

    /// `L.COL = R.COL` for every column name two joined tables share
    fn name_join_matches(
        &self,
        table_refs: &[TableReference],
        parent: Option<&TableReference>,
        word: &str,
        idx: usize,
    ) -> Vec<Candidate> {
        let (left, others): (&TableReference, Vec<&TableReference>) = match parent {
            Some(p) => (
                p,
                table_refs
                    .iter()
                    .filter(|t| !t.reference().eq_ignore_ascii_case(p.reference()))
                    .collect(),
            ),
            None => match table_refs.split_last() {
                Some((last, rest)) => (last, rest.iter().collect()),
                None => return Vec::new(),
            },
        };
        let Some(left_columns) = self.metadata.columns(&left.name) else {
            return Vec::new();
        };
        let left_ref = self.escape_name(left.reference());

        let mut items = Vec::new();
        for other in others {
            let Some(other_columns) = self.metadata.columns(&other.name) else {
                continue;
            };
            let other_ref = self.escape_name(other.reference());
            for column in left_columns {
                if !other_columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                    continue;
                }
                let column = self.escape_name(column);
                let condition = if parent.is_some() {
                    format!("{column} = {other_ref}.{column}")
                } else {
                    format!("{left_ref}.{column} = {other_ref}.{column}")
                };
                let upper = column.to_uppercase();
                let mut item = Item::new(condition).synonym(column.clone());
                if upper == "ID" || upper.ends_with("_ID") {
                    item.tertiary = ID_JOIN_PRIORITY;
                }
                items.push(item);
            }
        }
        self.find_matches(word, items, MatchMode::Fuzzy, SuggestionCategory::NameJoin, idx)
    }

    /// Score `items` against `word` and build candidates for the matches
    fn find_matches(
        &self,
        word: &str,
        items: impl IntoIterator<Item = Item>,
        mode: MatchMode,
        category: SuggestionCategory,
        request_idx: usize,
    ) -> Vec<Candidate> {
        let matcher = Matcher::new(word);
        let start_position = -(word.chars().count() as isize);

        items
            .into_iter()
            .filter_map(|item| {
                let names = std::iter::once(item.text.as_str()).chain(item.synonym.as_deref());
                let match_score = matcher.score_any(names, mode)?;
                let prevalence = match mode {
                    MatchMode::Fuzzy => self
                        .prevalence
                        .name_count(item.synonym.as_deref().unwrap_or(&item.text)),
                    MatchMode::Strict => self.prevalence.keyword_count(&item.text),
                };
                let sort_key = SortKey {
                    match_score,
                    type_priority: category.priority(),
                    secondary_priority: -(request_idx as i64),
                    prevalence,
                    tertiary_priority: item.tertiary,
                    lexical: LexicalKey::new(&item.text),
                };
                let meta = item.meta.as_deref().unwrap_or(category.meta());
                Some(Candidate {
                    display_text: item.text.clone(),
                    display_meta: truncate_meta(meta),
                    text: item.text,
                    start_position,
                    category,
                    sort_key,
                })
            })
            .collect()
    }
}
