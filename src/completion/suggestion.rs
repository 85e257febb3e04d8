/*!
 * Suggestion requests and completion candidates
 *
 * The analyzer answers "what kind of thing belongs here" with a list of
 * [`SuggestionRequest`]s; the completer turns each request into ranked
 * [`Candidate`]s.
 */

use super::cte::LocalTable;
use super::matcher::{LexicalKey, MatchScore};
use super::tables::TableReference;

/// Longest `display_meta` shown before it is cut with an ellipsis
pub const MAX_META_LEN: usize = 50;

/// How columns will be used at the cursor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColumnContext {
    #[default]
    Default,
    /// Column list of an INSERT target
    Insert,
}

/// How a function will be used at the cursor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FunctionUsage {
    /// Called inside an expression
    #[default]
    Call,
    /// Named after DROP/ALTER/CREATE FUNCTION
    Signature,
}

/// One kind of object that may appear at the cursor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuggestionRequest {
    Column {
        table_refs: Vec<TableReference>,
        /// Only columns of the last table that also exist in another
        /// (`JOIN ... USING (`)
        require_last_table: bool,
        local_tables: Vec<LocalTable>,
        /// Columns may be prefixed with their table reference
        qualifiable: bool,
        context: ColumnContext,
    },
    Table {
        table_refs: Vec<TableReference>,
        local_tables: Vec<LocalTable>,
        qualifier: Option<String>,
    },
    View {
        table_refs: Vec<TableReference>,
        qualifier: Option<String>,
    },
    FromClauseItem {
        table_refs: Vec<TableReference>,
        local_tables: Vec<LocalTable>,
    },
    Function {
        table_refs: Vec<TableReference>,
        usage: FunctionUsage,
        qualifier: Option<String>,
    },
    Procedure,
    Datatype,
    Keyword {
        /// Keyword before the cursor, used to narrow to likely successors
        last_token: Option<String>,
    },
    Alias {
        aliases: Vec<String>,
    },
    Join {
        table_refs: Vec<TableReference>,
    },
    JoinCondition {
        table_refs: Vec<TableReference>,
        parent: Option<TableReference>,
    },
}

impl SuggestionRequest {
    pub fn column(table_refs: Vec<TableReference>, local_tables: Vec<LocalTable>) -> Self {
        SuggestionRequest::Column {
            table_refs,
            require_last_table: false,
            local_tables,
            qualifiable: false,
            context: ColumnContext::Default,
        }
    }

    pub fn keyword(last_token: Option<String>) -> Self {
        SuggestionRequest::Keyword { last_token }
    }

    /// Short label used when explaining the analysis
    pub fn kind(&self) -> &'static str {
        match self {
            SuggestionRequest::Column { .. } => "column",
            SuggestionRequest::Table { .. } => "table",
            SuggestionRequest::View { .. } => "view",
            SuggestionRequest::FromClauseItem { .. } => "from clause item",
            SuggestionRequest::Function { .. } => "function",
            SuggestionRequest::Procedure => "procedure",
            SuggestionRequest::Datatype => "datatype",
            SuggestionRequest::Keyword { .. } => "keyword",
            SuggestionRequest::Alias { .. } => "alias",
            SuggestionRequest::Join { .. } => "join",
            SuggestionRequest::JoinCondition { .. } => "join condition",
        }
    }
}

/// Candidate category, in descending ranking priority
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuggestionCategory {
    Keyword,
    Function,
    Procedure,
    View,
    Table,
    Datatype,
    Column,
    TableAlias,
    Join,
    NameJoin,
}

impl SuggestionCategory {
    const ORDER: [SuggestionCategory; 10] = [
        SuggestionCategory::Keyword,
        SuggestionCategory::Function,
        SuggestionCategory::Procedure,
        SuggestionCategory::View,
        SuggestionCategory::Table,
        SuggestionCategory::Datatype,
        SuggestionCategory::Column,
        SuggestionCategory::TableAlias,
        SuggestionCategory::Join,
        SuggestionCategory::NameJoin,
    ];

    /// Higher wins when match quality ties
    pub fn priority(self) -> u8 {
        let idx = Self::ORDER.iter().position(|c| *c == self).unwrap_or(0);
        (Self::ORDER.len() - idx) as u8
    }

    /// Default `display_meta`
    pub fn meta(self) -> &'static str {
        match self {
            SuggestionCategory::Keyword => "keyword",
            SuggestionCategory::Function => "function",
            SuggestionCategory::Procedure => "procedure",
            SuggestionCategory::View => "view",
            SuggestionCategory::Table => "table",
            SuggestionCategory::Datatype => "datatype",
            SuggestionCategory::Column => "column",
            SuggestionCategory::TableAlias => "table alias",
            SuggestionCategory::Join => "join",
            SuggestionCategory::NameJoin => "name join",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            SuggestionCategory::Keyword => "🔵",
            SuggestionCategory::Function => "⚡",
            SuggestionCategory::Procedure => "⚙️",
            SuggestionCategory::View => "👁️",
            SuggestionCategory::Table => "📊",
            SuggestionCategory::Datatype => "🔤",
            SuggestionCategory::Column => "📋",
            SuggestionCategory::TableAlias => "🏷️",
            SuggestionCategory::Join | SuggestionCategory::NameJoin => "🔗",
        }
    }
}

/// Ranking key; candidates sort by it in descending order
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub match_score: MatchScore,
    pub type_priority: u8,
    /// Earlier requests rank higher
    pub secondary_priority: i64,
    pub prevalence: u64,
    pub tertiary_priority: i64,
    pub lexical: LexicalKey,
}

/// One completion the user can pick
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub display_text: String,
    pub display_meta: String,
    /// Negative character count of the word the candidate replaces
    pub start_position: isize,
    pub category: SuggestionCategory,
    pub sort_key: SortKey,
}

impl Candidate {
    /// Formatted display text (with emoji icon)
    pub fn format_display(&self) -> String {
        format!(
            "{} {} - {}",
            self.category.icon(),
            self.display_text,
            self.display_meta
        )
    }
}

/// Cut `meta` to [`MAX_META_LEN`] characters, ending in `...` when cut
pub fn truncate_meta(meta: &str) -> String {
    if meta.chars().count() <= MAX_META_LEN {
        return meta.to_string();
    }
    let mut cut: String = meta.chars().take(MAX_META_LEN - 3).collect();
    cut.push_str("...");
    cut
}
